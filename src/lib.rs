//! # Lazy Assets
//!
//! Lazily materialized, reference-counted assets.
//!
//! You describe an asset with a *seed*: an inert recipe holding one of
//! several alternative sets of construction arguments. A manager turns the
//! seed into a controller and hands you a weak handle. Nothing is built yet.
//!
//! - The first **strong** reference materializes the asset: it is built from
//!   the seed's active alternative and moved into storage taken from the
//!   manager's allocator.
//! - Dropping the last strong reference destroys the asset and returns its
//!   storage right away.
//! - Dropping the last reference of **either** kind removes the controller
//!   from its manager.
//!
//! ## Quick Example
//!
//! ```rust
//! use lazy_assets::{AssetManager, FromKernel, NaiveManager, Seed};
//!
//! enum Shader {
//!     Source(&'static str),
//!     Builtin(u8),
//! }
//!
//! struct Program {
//!     text: String,
//! }
//!
//! impl FromKernel<Shader> for Program {
//!     fn from_kernel(kernel: &Shader) -> Self {
//!         match kernel {
//!             Shader::Source(src) => Program { text: src.to_string() },
//!             Shader::Builtin(id) => Program { text: format!("builtin #{id}") },
//!         }
//!     }
//! }
//!
//! let manager: NaiveManager<Seed<Program, Shader>> = NaiveManager::new();
//! let shader = manager.register(Seed::new(Shader::Builtin(2)));
//! assert!(!shader.is_materialized());
//!
//! let program = shader.upgrade().unwrap();
//! assert_eq!(program.text, "builtin #2");
//!
//! drop(program);
//! assert!(!shader.is_materialized());
//! assert_eq!(manager.len(), 1);
//!
//! drop(shader);
//! assert!(manager.is_empty());
//! ```
//!
//! ## Threading
//!
//! Everything here is single-threaded. Controllers and handles are built on
//! `Rc` and `Cell` and are neither `Send` nor `Sync`.
//!
//! ## Features
//!
//! - `tracing`: log registration, materialization, destruction and
//!   forgetting through the `tracing` crate
//! - `serde`: `Serialize`/`Deserialize` for [`ManagerStats`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod alloc;
pub mod error;
pub mod handle;
pub mod manager;
pub mod refcount;
pub mod registry;
pub mod seed;
pub mod testing;

// Re-exports
pub use alloc::{AssetAllocator, Global};
pub use error::{AcquireError, AllocError, AllocErrorKind};
pub use handle::{SharedCounter, StrongHandle, WeakHandle};
pub use manager::{AssetManager, ManagerStats, NaiveManager};
pub use refcount::{Controller, LifecycleHooks, RefCounter};
pub use registry::{EntryKey, Registry};
pub use seed::{FromKernel, Seed, SeedLike};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::alloc::{AssetAllocator, Global};
    pub use crate::error::AcquireError;
    pub use crate::handle::{StrongHandle, WeakHandle};
    pub use crate::manager::{AssetManager, NaiveManager};
    pub use crate::refcount::RefCounter;
    pub use crate::seed::{FromKernel, Seed, SeedLike};
}
