//! Strong and weak handles to managed assets.
//!
//! Handles are thin RAII callers of the [`RefCounter`] operations. They hold
//! the type-erased controller, never the concrete manager type, so assets
//! from any manager can be passed around as `StrongHandle<A>` or
//! `WeakHandle<A>`.
//!
//! # Example
//!
//! ```
//! use lazy_assets::{AssetManager, FromKernel, NaiveManager, Seed};
//!
//! struct Greeting(String);
//!
//! impl FromKernel<&'static str> for Greeting {
//!     fn from_kernel(name: &&'static str) -> Self {
//!         Greeting(format!("hello, {name}"))
//!     }
//! }
//!
//! let manager: NaiveManager<Seed<Greeting, &'static str>> = NaiveManager::new();
//! let weak = manager.register(Seed::new("world"));
//! assert!(!weak.is_materialized());
//!
//! let strong = weak.upgrade().unwrap();
//! assert_eq!(strong.0, "hello, world");
//!
//! drop(strong);
//! assert!(!weak.is_materialized());
//! ```

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::error::AcquireError;
use crate::refcount::RefCounter;

/// Shared pointer to a type-erased controller.
pub type SharedCounter<A> = Rc<dyn RefCounter<A>>;

/// A reference that keeps the controller entry alive but not the asset.
pub struct WeakHandle<A: 'static> {
    counter: SharedCounter<A>,
}

impl<A: 'static> WeakHandle<A> {
    /// Take a new weak reference on `counter`.
    pub fn new(counter: SharedCounter<A>) -> Self {
        counter.acquire_weak();
        WeakHandle { counter }
    }

    /// Take a strong reference, materializing the asset if needed.
    pub fn upgrade(&self) -> Result<StrongHandle<A>, AcquireError> {
        StrongHandle::new(Rc::clone(&self.counter))
    }

    /// Whether the asset is currently materialized.
    pub fn is_materialized(&self) -> bool {
        self.counter.is_materialized()
    }

    /// The controller behind this handle.
    pub fn counter(&self) -> &SharedCounter<A> {
        &self.counter
    }

    /// Whether both handles point at the same controller.
    pub fn ptr_eq(&self, other: &WeakHandle<A>) -> bool {
        same_counter(&self.counter, &other.counter)
    }
}

impl<A: 'static> Clone for WeakHandle<A> {
    fn clone(&self) -> Self {
        WeakHandle::new(Rc::clone(&self.counter))
    }
}

impl<A: 'static> Drop for WeakHandle<A> {
    fn drop(&mut self) {
        // SAFETY: this handle owns the weak reference it took in `new`.
        unsafe { self.counter.release_weak() };
    }
}

impl<A: 'static> fmt::Debug for WeakHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("asset", &std::any::type_name::<A>())
            .field("strong", &self.counter.strong_count())
            .field("weak", &self.counter.weak_count())
            .finish()
    }
}

/// A reference that keeps the asset materialized.
///
/// Dereferences to the asset for as long as it lives.
pub struct StrongHandle<A: 'static> {
    counter: SharedCounter<A>,
}

impl<A: 'static> StrongHandle<A> {
    /// Take a new strong reference on `counter`, materializing if needed.
    pub fn new(counter: SharedCounter<A>) -> Result<Self, AcquireError> {
        counter.acquire_strong()?;
        Ok(StrongHandle { counter })
    }

    /// Take a weak reference to the same controller.
    pub fn downgrade(&self) -> WeakHandle<A> {
        WeakHandle::new(Rc::clone(&self.counter))
    }

    /// The controller behind this handle.
    ///
    /// Counts and materialization state can be read freely. Releasing
    /// through it is `unsafe`, because this handle still owns its reference.
    pub fn counter(&self) -> &SharedCounter<A> {
        &self.counter
    }

    /// Whether both handles point at the same controller.
    pub fn ptr_eq(&self, other: &StrongHandle<A>) -> bool {
        same_counter(&self.counter, &other.counter)
    }
}

impl<A: 'static> Clone for StrongHandle<A> {
    fn clone(&self) -> Self {
        // Already materialized, so this never reaches the materialize hook.
        if let Err(err) = self.counter.acquire_strong() {
            panic!("strong reference failed while the asset was materialized: {err}");
        }
        StrongHandle {
            counter: Rc::clone(&self.counter),
        }
    }
}

impl<A: 'static> Deref for StrongHandle<A> {
    type Target = A;

    fn deref(&self) -> &A {
        match self.counter.asset() {
            // SAFETY: this handle owns a strong reference that only `drop`
            // gives up, and `RefCounter` keeps the pointer valid until then.
            Some(asset) => unsafe { asset.as_ref() },
            None => panic!("strong handle points at an unmaterialized asset"),
        }
    }
}

impl<A: 'static> Drop for StrongHandle<A> {
    fn drop(&mut self) {
        // SAFETY: this handle owns the strong reference it took in `new` or
        // `clone`, and `&mut self` rules out outstanding borrows of the asset.
        unsafe { self.counter.release_strong() };
    }
}

impl<A: fmt::Debug + 'static> fmt::Debug for StrongHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongHandle")
            .field("asset", &**self)
            .field("strong", &self.counter.strong_count())
            .field("weak", &self.counter.weak_count())
            .finish()
    }
}

fn same_counter<A>(a: &SharedCounter<A>, b: &SharedCounter<A>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
