//! Asset managers.
//!
//! A manager owns the controllers for the seeds registered with it and hands
//! out [`WeakHandle`]s to them. Managers never materialize anything on their
//! own: assets are built when a handle is upgraded, torn down when the last
//! strong handle goes away, and the controller removes itself from the
//! manager when the last handle of any kind goes away.
//!
//! - [`AssetManager`] - the interface every manager provides
//! - [`NaiveManager`] - reference counting only, no caching or eviction
//! - [`ManagerStats`] - a snapshot of a manager's bookkeeping

mod naive;

pub use naive::NaiveManager;

use crate::handle::WeakHandle;
use crate::seed::SeedLike;

/// Interface shared by asset managers.
pub trait AssetManager<S: SeedLike> {
    /// Register `seed`, returning a weak handle to its new controller.
    ///
    /// Nothing is allocated or constructed. Registering an equal seed twice
    /// creates two unrelated controllers.
    fn register(&self, seed: S) -> WeakHandle<S::Asset>;

    /// Try to free memory down to `budget` bytes.
    ///
    /// Managers without a caching policy have nothing to release and treat
    /// this as a no-op.
    fn clean(&self, budget: usize);

    /// Register a seed built from a bare kernel.
    fn register_kernel(&self, kernel: S::Kernel) -> WeakHandle<S::Asset>
    where
        S: From<S::Kernel>,
    {
        self.register(S::from(kernel))
    }
}

/// Snapshot of a manager's controllers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagerStats {
    /// Controllers currently registered.
    pub registered: usize,
    /// Registered controllers whose asset is materialized.
    pub materialized: usize,
    /// Strong references across all controllers.
    pub strong_refs: usize,
    /// Weak references across all controllers.
    pub weak_refs: usize,
}
