//! The strong/weak reference-count state machine.
//!
//! A [`Controller`] tracks two independent counts for one asset and drives
//! three transitions through its [`LifecycleHooks`]:
//!
//! | Transition | Trigger | Hook |
//! |------------|---------|------|
//! | materialize | strong count 0 → 1 | [`LifecycleHooks::materialize`] |
//! | destroy | strong count 1 → 0 | [`LifecycleHooks::destroy`] |
//! | forget | strong + weak count reach 0 | [`LifecycleHooks::forget`] |
//!
//! Handles only ever see the type-erased [`RefCounter`] interface.
//!
//! # Invariants
//!
//! - The stored asset pointer is `Some` iff the strong count is non-zero.
//! - A failed materialization leaves the strong count at zero and no
//!   pointer stored.
//! - The forget hook runs at most once, and it is the last thing the
//!   controller does. Any later use of the controller panics.
//!
//! All hooks run synchronously on the caller's thread. Controllers are built
//! on [`Cell`] and are therefore neither `Send` nor `Sync`.

use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

use crate::error::AcquireError;

/// Type-erased reference-counting interface used by handles.
///
/// Acquiring is always safe: an extra reference can at worst keep an asset
/// alive. Releasing gives up a reference that something else may be relying
/// on, so the release methods are `unsafe`. Handles are the safe way to hold
/// references.
///
/// Releasing a count that is already zero, or using a controller after it
/// has been forgotten, is a contract violation and panics.
///
/// Releasing through a borrowed counter needs an `unsafe` block:
///
/// ```compile_fail,E0133
/// use lazy_assets::{AssetManager, FromKernel, NaiveManager, Seed};
///
/// struct Answer(u32);
///
/// impl FromKernel<u32> for Answer {
///     fn from_kernel(value: &u32) -> Self {
///         Answer(*value)
///     }
/// }
///
/// let manager: NaiveManager<Seed<Answer, u32>> = NaiveManager::new();
/// let weak = manager.register(Seed::new(42));
/// let strong = weak.upgrade().unwrap();
/// let answer = &*strong;
/// strong.counter().release_strong();
/// assert_eq!(answer.0, 42);
/// ```
///
/// # Safety
///
/// Implementors must guarantee that while the strong count is non-zero,
/// [`asset`](Self::asset) returns `Some` pointer to an initialized, properly
/// aligned `A` that stays valid and unaliased by writers until the strong
/// count next drops to zero. [`StrongHandle`](crate::StrongHandle)
/// dereferences that pointer.
pub unsafe trait RefCounter<A> {
    /// Add a strong reference, materializing the asset on 0 → 1.
    ///
    /// On failure the strong count is unchanged and the error is returned.
    fn acquire_strong(&self) -> Result<(), AcquireError>;

    /// Drop a strong reference, destroying the asset on 1 → 0.
    ///
    /// May forget the controller. The caller must not use it again if both
    /// counts reached zero.
    ///
    /// # Safety
    ///
    /// The caller must own a strong reference taken with
    /// [`acquire_strong`](Self::acquire_strong) and give it up here. No
    /// borrow of the asset obtained through that reference may be used
    /// after this call.
    unsafe fn release_strong(&self);

    /// Add a weak reference.
    fn acquire_weak(&self);

    /// Drop a weak reference.
    ///
    /// May forget the controller. The caller must not use it again if both
    /// counts reached zero.
    ///
    /// # Safety
    ///
    /// The caller must own a weak reference taken with
    /// [`acquire_weak`](Self::acquire_weak) and give it up here.
    unsafe fn release_weak(&self);

    /// Current number of strong references.
    fn strong_count(&self) -> usize;

    /// Current number of weak references.
    fn weak_count(&self) -> usize;

    /// Pointer to the materialized asset, if any.
    fn asset(&self) -> Option<NonNull<A>>;

    /// Whether the forget hook has already run.
    fn is_forgotten(&self) -> bool;

    /// Whether the asset is currently materialized.
    fn is_materialized(&self) -> bool {
        self.asset().is_some()
    }
}

/// The three transitions a concrete controller implements.
///
/// Implement this to build a manager with its own storage or bookkeeping
/// on top of [`Controller`]'s counting.
///
/// A safe implementation is rejected, since [`Controller`] hands the
/// materialized pointer to handles that dereference it:
///
/// ```compile_fail,E0200
/// use std::ptr::NonNull;
/// use lazy_assets::{AcquireError, LifecycleHooks};
///
/// struct Dangling;
///
/// impl LifecycleHooks for Dangling {
///     type Asset = u64;
///
///     fn materialize(&self) -> Result<NonNull<u64>, AcquireError> {
///         Ok(NonNull::dangling())
///     }
///
///     unsafe fn destroy(&self, _asset: NonNull<u64>) {}
///
///     fn forget(&self) {}
/// }
/// ```
///
/// # Safety
///
/// A successful [`materialize`](Self::materialize) must return a pointer to
/// an initialized, properly aligned `Self::Asset` that nothing else writes
/// to and that stays valid until it is passed to
/// [`destroy`](Self::destroy).
pub unsafe trait LifecycleHooks {
    /// The asset type being managed.
    type Asset;

    /// Build the asset. Called when the strong count goes 0 → 1.
    ///
    /// On error nothing may have been left allocated or constructed.
    fn materialize(&self) -> Result<NonNull<Self::Asset>, AcquireError>;

    /// Tear the asset down. Called when the strong count goes 1 → 0.
    ///
    /// # Safety
    ///
    /// `asset` must be the pointer returned by the matching successful
    /// [`materialize`](Self::materialize) call, and must not be used again.
    unsafe fn destroy(&self, asset: NonNull<Self::Asset>);

    /// Drop all bookkeeping. Called once, when both counts reach zero.
    ///
    /// This is the last call a controller makes into its hooks. It may remove
    /// the controller from whatever collection owns it.
    fn forget(&self);
}

/// Reference-count controller for one asset.
pub struct Controller<H: LifecycleHooks> {
    strong: Cell<usize>,
    weak: Cell<usize>,
    forgotten: Cell<bool>,
    asset: Cell<Option<NonNull<H::Asset>>>,
    hooks: H,
}

impl<H: LifecycleHooks> Controller<H> {
    /// Create a controller with both counts at zero and nothing materialized.
    pub fn new(hooks: H) -> Self {
        Controller {
            strong: Cell::new(0),
            weak: Cell::new(0),
            forgotten: Cell::new(false),
            asset: Cell::new(None),
            hooks,
        }
    }

    /// The hooks this controller drives.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[track_caller]
    fn assert_live(&self) {
        if self.forgotten.get() {
            panic!("reference counter used after it was forgotten");
        }
    }

    fn forget_if_unreferenced(&self) {
        if self.strong.get() == 0 && self.weak.get() == 0 {
            self.forgotten.set(true);
            // May drop the registry's reference to `self`; nothing after this.
            self.hooks.forget();
        }
    }
}

// SAFETY: the asset pointer is set only from a successful materialize, which
// `LifecycleHooks` guarantees valid, and is taken out before destroy.
unsafe impl<H: LifecycleHooks> RefCounter<H::Asset> for Controller<H> {
    #[track_caller]
    fn acquire_strong(&self) -> Result<(), AcquireError> {
        self.assert_live();
        let prev = self.strong.get();
        if prev == 0 {
            // The count only moves once the asset exists, so a failing or
            // unwinding materialize leaves it at zero.
            let asset = self.hooks.materialize()?;
            self.asset.set(Some(asset));
        }
        self.strong.set(prev + 1);
        Ok(())
    }

    #[track_caller]
    unsafe fn release_strong(&self) {
        self.assert_live();
        let prev = self.strong.get();
        if prev == 0 {
            panic!("release_strong called with no outstanding strong references");
        }
        self.strong.set(prev - 1);
        if prev == 1 {
            if let Some(asset) = self.asset.take() {
                // SAFETY: `asset` came from the materialize call that started
                // this strong period and was just taken out of the cell.
                unsafe { self.hooks.destroy(asset) };
            }
        }
        self.forget_if_unreferenced();
    }

    #[track_caller]
    fn acquire_weak(&self) {
        self.assert_live();
        self.weak.set(self.weak.get() + 1);
    }

    #[track_caller]
    unsafe fn release_weak(&self) {
        self.assert_live();
        let prev = self.weak.get();
        if prev == 0 {
            panic!("release_weak called with no outstanding weak references");
        }
        self.weak.set(prev - 1);
        self.forget_if_unreferenced();
    }

    fn strong_count(&self) -> usize {
        self.strong.get()
    }

    fn weak_count(&self) -> usize {
        self.weak.get()
    }

    fn asset(&self) -> Option<NonNull<H::Asset>> {
        self.asset.get()
    }

    fn is_forgotten(&self) -> bool {
        self.forgotten.get()
    }
}

impl<H: LifecycleHooks + fmt::Debug> fmt::Debug for Controller<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("strong", &self.strong.get())
            .field("weak", &self.weak.get())
            .field("materialized", &self.asset.get().is_some())
            .field("forgotten", &self.forgotten.get())
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AllocError, AllocErrorKind};
    use std::cell::RefCell;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Materialize,
        Destroy,
        Forget,
    }

    /// Hooks that box a fixed value and record every transition.
    #[derive(Debug, Default)]
    struct Spy {
        events: RefCell<Vec<Event>>,
        fail: Cell<bool>,
    }

    impl Spy {
        fn events(&self) -> Vec<Event> {
            self.events.borrow().clone()
        }
    }

    // SAFETY: the asset is a leaked box, freed only in destroy.
    unsafe impl LifecycleHooks for Spy {
        type Asset = u32;

        fn materialize(&self) -> Result<NonNull<u32>, AcquireError> {
            if self.fail.get() {
                return Err(AcquireError::new::<u32>(AllocError::new::<u32>(
                    AllocErrorKind::Refused,
                    1,
                )));
            }
            self.events.borrow_mut().push(Event::Materialize);
            Ok(NonNull::from(Box::leak(Box::new(42))))
        }

        unsafe fn destroy(&self, asset: NonNull<u32>) {
            drop(Box::from_raw(asset.as_ptr()));
            self.events.borrow_mut().push(Event::Destroy);
        }

        fn forget(&self) {
            self.events.borrow_mut().push(Event::Forget);
        }
    }

    #[test]
    fn test_new_controller_is_empty() {
        let ctr = Controller::new(Spy::default());
        assert_eq!(ctr.strong_count(), 0);
        assert_eq!(ctr.weak_count(), 0);
        assert!(!ctr.is_materialized());
        assert!(!ctr.is_forgotten());
        assert!(ctr.hooks().events().is_empty());
    }

    #[test]
    fn test_strong_materializes_once() {
        let ctr = Controller::new(Spy::default());
        ctr.acquire_weak();

        ctr.acquire_strong().unwrap();
        ctr.acquire_strong().unwrap();
        assert_eq!(ctr.strong_count(), 2);
        assert_eq!(unsafe { *ctr.asset().unwrap().as_ptr() }, 42);
        assert_eq!(ctr.hooks().events(), vec![Event::Materialize]);

        unsafe { ctr.release_strong() };
        assert!(ctr.is_materialized());
        unsafe { ctr.release_strong() };
        assert!(!ctr.is_materialized());
        assert_eq!(
            ctr.hooks().events(),
            vec![Event::Materialize, Event::Destroy]
        );
        assert!(!ctr.is_forgotten());
    }

    #[test]
    fn test_last_release_forgets() {
        let ctr = Controller::new(Spy::default());
        ctr.acquire_weak();
        ctr.acquire_strong().unwrap();
        unsafe { ctr.release_weak() };
        assert!(!ctr.is_forgotten());

        unsafe { ctr.release_strong() };
        assert!(ctr.is_forgotten());
        assert_eq!(
            ctr.hooks().events(),
            vec![Event::Materialize, Event::Destroy, Event::Forget]
        );
    }

    #[test]
    fn test_failed_materialize_rolls_back() {
        let ctr = Controller::new(Spy::default());
        ctr.acquire_weak();
        ctr.hooks().fail.set(true);

        let err = ctr.acquire_strong().unwrap_err();
        assert_eq!(err.alloc_error().kind(), AllocErrorKind::Refused);
        assert_eq!(ctr.strong_count(), 0);
        assert!(!ctr.is_materialized());
        assert!(!ctr.is_forgotten());

        ctr.hooks().fail.set(false);
        ctr.acquire_strong().unwrap();
        assert!(ctr.is_materialized());
        unsafe { ctr.release_strong() };
        unsafe { ctr.release_weak() };
    }

    #[test]
    fn test_failed_materialize_without_weak_does_not_forget() {
        let ctr = Controller::new(Spy::default());
        ctr.hooks().fail.set(true);

        assert!(ctr.acquire_strong().is_err());
        assert!(!ctr.is_forgotten());
        assert!(ctr.hooks().events().is_empty());
    }

    #[test]
    #[should_panic(expected = "release_strong called with no outstanding strong references")]
    fn test_release_strong_underflow_panics() {
        let ctr = Controller::new(Spy::default());
        ctr.acquire_weak();
        unsafe { ctr.release_strong() };
    }

    #[test]
    #[should_panic(expected = "release_weak called with no outstanding weak references")]
    fn test_release_weak_underflow_panics() {
        let ctr = Controller::new(Spy::default());
        ctr.acquire_strong().unwrap();
        unsafe { ctr.release_weak() };
    }

    #[test]
    #[should_panic(expected = "used after it was forgotten")]
    fn test_use_after_forget_panics() {
        let ctr = Controller::new(Spy::default());
        ctr.acquire_weak();
        unsafe { ctr.release_weak() };
        ctr.acquire_weak();
    }

    #[test]
    fn test_debug_output() {
        let ctr = Controller::new(Spy::default());
        ctr.acquire_weak();
        let debug_str = format!("{:?}", ctr);
        assert!(debug_str.contains("Controller"));
        assert!(debug_str.contains("weak: 1"));
        assert!(debug_str.contains("materialized: false"));
    }
}
