//! Testing utilities for code built on lazy-assets
//!
//! This module provides an allocator that records every request and can be
//! told to fail, plus assertion macros for the materialization state of a
//! handle.
//!
//! # Examples
//!
//! ## TrackingAllocator
//!
//! ```rust
//! use lazy_assets::testing::TrackingAllocator;
//! use lazy_assets::{AssetManager, FromKernel, NaiveManager, Seed};
//!
//! struct Texture(u32);
//!
//! impl FromKernel<u32> for Texture {
//!     fn from_kernel(id: &u32) -> Self {
//!         Texture(*id)
//!     }
//! }
//!
//! let tracker = TrackingAllocator::new();
//! let manager: NaiveManager<Seed<Texture, u32>, _> =
//!     NaiveManager::with_allocator(tracker.clone());
//!
//! let texture = manager.register(Seed::new(3));
//! assert_eq!(tracker.allocations(), 0);
//!
//! tracker.set_failing(true);
//! assert!(texture.upgrade().is_err());
//!
//! tracker.set_failing(false);
//! drop(texture.upgrade().unwrap());
//! assert_eq!(tracker.allocations(), 1);
//! assert_eq!(tracker.deallocations(), 1);
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use lazy_assets::{assert_materialized, assert_unmaterialized};
//! use lazy_assets::{AssetManager, FromKernel, NaiveManager, Seed};
//!
//! struct Answer(u8);
//!
//! impl FromKernel<()> for Answer {
//!     fn from_kernel(_: &()) -> Self {
//!         Answer(42)
//!     }
//! }
//!
//! let manager: NaiveManager<Seed<Answer, ()>> = NaiveManager::new();
//! let weak = manager.register(Seed::new(()));
//! assert_unmaterialized!(weak);
//!
//! let strong = weak.upgrade().unwrap();
//! assert_materialized!(strong);
//! ```

use std::cell::RefCell;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::alloc::{AssetAllocator, Global};
use crate::error::{AllocError, AllocErrorKind};

#[derive(Debug, Default)]
struct Ledger {
    allocations: usize,
    deallocations: usize,
    outstanding: Vec<(usize, usize)>,
    failing: bool,
}

/// Allocator that records requests and checks allocate/deallocate pairing.
///
/// Clones share one ledger, so a test can keep a clone after handing the
/// allocator to a manager.
///
/// Deallocating storage it never handed out, or with a different count than
/// it was allocated with, panics.
#[derive(Debug, Clone, Default)]
pub struct TrackingAllocator {
    ledger: Rc<RefCell<Ledger>>,
}

impl TrackingAllocator {
    /// Create an allocator with an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following allocation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.ledger.borrow_mut().failing = failing;
    }

    /// Successful allocations so far.
    pub fn allocations(&self) -> usize {
        self.ledger.borrow().allocations
    }

    /// Deallocations so far.
    pub fn deallocations(&self) -> usize {
        self.ledger.borrow().deallocations
    }

    /// Allocations not yet returned.
    pub fn live(&self) -> usize {
        self.ledger.borrow().outstanding.len()
    }
}

// SAFETY: every allocation is delegated to `Global`.
unsafe impl<T> AssetAllocator<T> for TrackingAllocator {
    fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.failing {
            return Err(AllocError::new::<T>(AllocErrorKind::Refused, count));
        }
        let ptr = Global.allocate(count)?;
        ledger.allocations += 1;
        ledger.outstanding.push((ptr.as_ptr() as usize, count));
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        {
            let mut ledger = self.ledger.borrow_mut();
            let addr = ptr.as_ptr() as usize;
            let Some(pos) = ledger.outstanding.iter().position(|(a, _)| *a == addr) else {
                panic!("deallocating storage that was never allocated");
            };
            let (_, allocated) = ledger.outstanding.swap_remove(pos);
            if allocated != count {
                panic!("deallocated {count} value(s) from storage allocated for {allocated}");
            }
            ledger.deallocations += 1;
        }
        Global.deallocate(ptr, count);
    }
}

/// Assert that a handle's asset is materialized.
///
/// Works with both [`StrongHandle`](crate::StrongHandle) and
/// [`WeakHandle`](crate::WeakHandle).
///
/// # Example
///
/// ```rust,ignore
/// let strong = weak.upgrade().unwrap();
/// assert_materialized!(strong);
/// ```
#[macro_export]
macro_rules! assert_materialized {
    ($handle:expr) => {{
        let counter: &dyn $crate::RefCounter<_> = &**$handle.counter();
        if !counter.is_materialized() {
            panic!(
                "Expected materialized asset, got none (strong: {}, weak: {})",
                counter.strong_count(),
                counter.weak_count()
            );
        }
    }};
}

/// Assert that a handle's asset is not materialized.
///
/// # Example
///
/// ```rust,ignore
/// let weak = manager.register(seed);
/// assert_unmaterialized!(weak);
/// ```
#[macro_export]
macro_rules! assert_unmaterialized {
    ($handle:expr) => {{
        let counter: &dyn $crate::RefCounter<_> = &**$handle.counter();
        if counter.is_materialized() {
            panic!(
                "Expected unmaterialized asset (strong: {}, weak: {})",
                counter.strong_count(),
                counter.weak_count()
            );
        }
    }};
}
