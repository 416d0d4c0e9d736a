//! Integration tests for the naive manager's asset lifecycle.
//!
//! Each test drives a manager purely through its public surface: handles
//! for the usual flows, and the raw counter for protocol misuse.

use std::cell::Cell;
use std::rc::Rc;

use lazy_assets::testing::TrackingAllocator;
use lazy_assets::{assert_materialized, assert_unmaterialized};
use lazy_assets::{
    AllocErrorKind, AssetManager, FromKernel, ManagerStats, NaiveManager, Seed, StrongHandle,
};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Kernel {
    Constant(i32),
    Product(i32, i32),
    Text(String),
}

#[derive(Debug, PartialEq)]
struct Number(i32);

impl FromKernel<Kernel> for Number {
    fn from_kernel(kernel: &Kernel) -> Self {
        match kernel {
            Kernel::Constant(n) => Number(*n),
            Kernel::Product(a, b) => Number(a * b),
            Kernel::Text(s) => Number(s.len() as i32),
        }
    }
}

type NumberSeed = Seed<Number, Kernel>;

fn setup() -> (NaiveManager<NumberSeed, TrackingAllocator>, TrackingAllocator) {
    let tracker = TrackingAllocator::new();
    (NaiveManager::with_allocator(tracker.clone()), tracker)
}

// ============================================================================
// Lifecycle scenarios
// ============================================================================

#[test]
fn materializes_value_and_clears_on_release() {
    let (manager, tracker) = setup();
    let weak = manager.register(Seed::new(Kernel::Product(6, 7)));

    let strong = weak.upgrade().unwrap();
    assert_eq!(*strong, Number(42));
    assert_materialized!(strong);

    drop(strong);
    assert_unmaterialized!(weak);
    assert!(weak.counter().asset().is_none());
    assert!(manager.contains(&weak));
    assert_eq!(tracker.live(), 0);
}

#[test]
fn weak_outlives_strong_then_erases() {
    let (manager, _tracker) = setup();
    let counter = manager.register(Seed::new(Kernel::Constant(1)));

    let extra_weak = counter.clone();
    let strong = extra_weak.upgrade().unwrap();
    drop(counter);
    assert_eq!(manager.len(), 1);

    drop(strong);
    assert_unmaterialized!(extra_weak);
    assert_eq!(extra_weak.counter().weak_count(), 1);
    assert_eq!(manager.len(), 1);

    drop(extra_weak);
    assert_eq!(manager.len(), 0);
}

#[test]
fn allocation_failure_is_recoverable() {
    let (manager, tracker) = setup();
    let weak = manager.register(Seed::new(Kernel::Constant(42)));
    tracker.set_failing(true);

    let err = weak.upgrade().unwrap_err();
    assert_eq!(err.alloc_error().kind(), AllocErrorKind::Refused);
    assert_eq!(err.alloc_error().count(), 1);
    assert_eq!(weak.counter().strong_count(), 0);
    assert!(weak.counter().asset().is_none());
    assert!(manager.contains(&weak));

    tracker.set_failing(false);
    assert_eq!(*weak.upgrade().unwrap(), Number(42));
}

#[test]
#[should_panic(expected = "release_strong called with no outstanding strong references")]
fn releasing_absent_strong_reference_panics() {
    let (manager, _tracker) = setup();
    let weak = manager.register(Seed::new(Kernel::Constant(0)));
    // The weak handle owns no strong reference, so the controller traps.
    unsafe { weak.counter().release_strong() };
}

#[test]
#[should_panic(expected = "used after it was forgotten")]
fn using_forgotten_controller_panics() {
    let (manager, _tracker) = setup();
    let weak = manager.register(Seed::new(Kernel::Constant(0)));
    let raw = Rc::clone(weak.counter());

    drop(weak);
    assert!(raw.is_forgotten());
    assert!(manager.is_empty());
    raw.acquire_weak();
}

// ============================================================================
// Registry behaviour
// ============================================================================

#[test]
fn erasing_one_entry_keeps_the_others_usable() {
    let (manager, _tracker) = setup();
    let mut handles: Vec<_> = (0..8)
        .map(|i| manager.register(Seed::new(Kernel::Constant(i))))
        .collect();
    let strongs: Vec<StrongHandle<Number>> =
        handles.iter().step_by(2).map(|h| h.upgrade().unwrap()).collect();

    // Drop every odd handle; those controllers have no other references.
    let mut index = 0;
    handles.retain(|_| {
        index += 1;
        index % 2 == 1
    });
    assert_eq!(manager.len(), 4);

    for (strong, expected) in strongs.iter().zip([0, 2, 4, 6]) {
        assert_eq!(**strong, Number(expected));
    }

    // New registrations reuse freed slots without disturbing live entries.
    let fresh = manager.register(Seed::new(Kernel::Text("abc".into())));
    assert_eq!(*fresh.upgrade().unwrap(), Number(3));
    for (strong, expected) in strongs.iter().zip([0, 2, 4, 6]) {
        assert_eq!(**strong, Number(expected));
    }
    assert_eq!(manager.len(), 5);
}

#[test]
fn every_allocation_is_paired() {
    let (manager, tracker) = setup();
    let handles: Vec<_> = (0..5)
        .map(|i| manager.register(Seed::new(Kernel::Constant(i))))
        .collect();

    for _ in 0..3 {
        let strongs: Vec<_> = handles.iter().map(|h| h.upgrade().unwrap()).collect();
        assert_eq!(tracker.live(), 5);
        drop(strongs);
        assert_eq!(tracker.live(), 0);
    }

    drop(handles);
    assert!(manager.is_empty());
    assert_eq!(tracker.allocations(), 15);
    assert_eq!(tracker.deallocations(), 15);
}

#[test]
fn destructor_runs_exactly_once_per_materialization() {
    thread_local! {
        static DROPS: Cell<usize> = const { Cell::new(0) };
    }

    struct Noisy;

    impl FromKernel<()> for Noisy {
        fn from_kernel(_: &()) -> Self {
            Noisy
        }
    }

    impl Drop for Noisy {
        fn drop(&mut self) {
            DROPS.with(|d| d.set(d.get() + 1));
        }
    }

    let manager: NaiveManager<Seed<Noisy, ()>> = NaiveManager::new();
    let weak = manager.register(Seed::new(()));

    let a = weak.upgrade().unwrap();
    let b = a.clone();
    drop(a);
    assert_eq!(DROPS.with(Cell::get), 0);
    drop(b);
    assert_eq!(DROPS.with(Cell::get), 1);

    drop(weak.upgrade().unwrap());
    assert_eq!(DROPS.with(Cell::get), 2);
}

#[test]
fn stats_follow_handles() {
    let (manager, _tracker) = setup();
    let a = manager.register(Seed::new(Kernel::Constant(1)));
    let b = manager.register(Seed::new(Kernel::Constant(2)));

    let strong = a.upgrade().unwrap();
    let stats = manager.stats();
    assert_eq!(stats.registered, 2);
    assert_eq!(stats.materialized, 1);
    assert_eq!(stats.strong_refs, 1);
    assert_eq!(stats.weak_refs, 2);

    drop(a);
    drop(b);
    let stats = manager.stats();
    assert_eq!(stats.registered, 1);
    assert_eq!(stats.weak_refs, 0);

    drop(strong);
    assert_eq!(manager.stats(), ManagerStats::default());
}
