//! Seeds: inert recipes for building one asset.
//!
//! A seed holds a *kernel*, a tagged union of the argument sets an asset can
//! be built from. In Rust the kernel is an `enum` and the asset resolves it
//! with an exhaustive `match` inside [`FromKernel::from_kernel`]. Nothing is
//! built until a controller materializes the asset.
//!
//! # Example
//!
//! ```
//! use lazy_assets::{FromKernel, Seed, SeedLike};
//!
//! enum MeshKernel {
//!     Cube { side: f32 },
//!     Sphere { radius: f32, rings: u32 },
//! }
//!
//! struct Mesh {
//!     vertices: usize,
//! }
//!
//! impl FromKernel<MeshKernel> for Mesh {
//!     fn from_kernel(kernel: &MeshKernel) -> Self {
//!         match kernel {
//!             MeshKernel::Cube { .. } => Mesh { vertices: 8 },
//!             MeshKernel::Sphere { rings, .. } => Mesh { vertices: (*rings as usize) * 16 },
//!         }
//!     }
//! }
//!
//! let seed: Seed<Mesh, MeshKernel> = Seed::new(MeshKernel::Sphere { radius: 1.0, rings: 4 });
//! assert_eq!(Mesh::from_kernel(seed.kernel()).vertices, 64);
//! ```

use std::fmt;
use std::marker::PhantomData;

/// Construction of an asset from exactly one kernel alternative.
///
/// Implementations match on the kernel and build the asset from the active
/// alternative's arguments. This is the per-alternative handler set that a
/// controller dispatches to at materialization time.
pub trait FromKernel<K>: Sized {
    /// Build the asset from the active alternative of `kernel`.
    fn from_kernel(kernel: &K) -> Self;
}

/// Everything a manager needs to know about one asset.
///
/// Seeds are immutable once registered. They are moved into the controller
/// that owns them and live exactly as long as that controller.
pub trait SeedLike: 'static {
    /// The kernel: alternatives of construction arguments.
    type Kernel;

    /// The asset this seed describes.
    type Asset: FromKernel<Self::Kernel> + 'static;

    /// The kernel holding the active construction alternative.
    fn kernel(&self) -> &Self::Kernel;

    /// Build an asset value from this seed's kernel.
    fn grow(&self) -> Self::Asset {
        <Self::Asset as FromKernel<Self::Kernel>>::from_kernel(self.kernel())
    }
}

/// Ready-made seed wrapping a kernel for asset type `A`.
pub struct Seed<A, K> {
    kernel: K,
    _asset: PhantomData<fn() -> A>,
}

impl<A, K> Seed<A, K> {
    /// Create a seed around `kernel`.
    pub fn new(kernel: K) -> Self {
        Seed {
            kernel,
            _asset: PhantomData,
        }
    }

    /// Unwrap the kernel.
    pub fn into_kernel(self) -> K {
        self.kernel
    }
}

impl<A, K> SeedLike for Seed<A, K>
where
    A: FromKernel<K> + 'static,
    K: 'static,
{
    type Kernel = K;
    type Asset = A;

    fn kernel(&self) -> &K {
        &self.kernel
    }
}

impl<A, K> From<K> for Seed<A, K> {
    fn from(kernel: K) -> Self {
        Seed::new(kernel)
    }
}

impl<A, K: Clone> Clone for Seed<A, K> {
    fn clone(&self) -> Self {
        Seed::new(self.kernel.clone())
    }
}

impl<A, K: fmt::Debug> fmt::Debug for Seed<A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("asset", &std::any::type_name::<A>())
            .field("kernel", &self.kernel)
            .finish()
    }
}
