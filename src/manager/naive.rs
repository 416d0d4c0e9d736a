//! The naive manager: reference counting and nothing else.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};
use std::rc::{Rc, Weak};

use super::{AssetManager, ManagerStats};
use crate::alloc::{AssetAllocator, Global};
use crate::error::AcquireError;
use crate::handle::WeakHandle;
use crate::refcount::{Controller, LifecycleHooks, RefCounter};
use crate::registry::{EntryKey, Registry};
use crate::seed::SeedLike;

type Entry<S, A> = Rc<Controller<ProxyHooks<S, A>>>;

/// State shared between a manager and the controllers it created.
struct Shared<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> {
    allocator: A,
    registry: RefCell<Registry<Entry<S, A>>>,
}

impl<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> Shared<S, A> {
    /// Remove an unreferenced controller from the registry.
    #[track_caller]
    fn erase(&self, key: EntryKey) {
        let removed = {
            let mut registry = self.registry.borrow_mut();
            if let Some(entry) = registry.get(key) {
                if entry.strong_count() != 0 || entry.weak_count() != 0 {
                    panic!(
                        "erasing a controller with {} strong and {} weak references",
                        entry.strong_count(),
                        entry.weak_count()
                    );
                }
            }
            registry.remove(key)
        };
        if removed.is_none() {
            panic!("erasing a controller that is not registered");
        }
    }
}

/// Hooks for controllers owned by a [`NaiveManager`].
///
/// Binds one seed, the manager's allocator and the controller's own
/// registry key.
struct ProxyHooks<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> {
    seed: S,
    manager: Weak<Shared<S, A>>,
    key: Cell<Option<EntryKey>>,
}

impl<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> ProxyHooks<S, A> {
    #[track_caller]
    fn manager(&self) -> Rc<Shared<S, A>> {
        match self.manager.upgrade() {
            Some(manager) => manager,
            None => panic!("asset manager dropped before its controllers"),
        }
    }
}

/// Returns storage to the allocator if asset construction unwinds.
struct StorageGuard<'a, T, A: AssetAllocator<T>> {
    allocator: &'a A,
    storage: NonNull<T>,
}

impl<T, A: AssetAllocator<T>> Drop for StorageGuard<'_, T, A> {
    fn drop(&mut self) {
        // SAFETY: the storage was allocated with count 1 and holds no value.
        unsafe { self.allocator.deallocate(self.storage, 1) };
    }
}

// SAFETY: materialize writes a fully built asset into storage the allocator
// guarantees valid, and destroy is the only place that storage is released.
unsafe impl<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> LifecycleHooks
    for ProxyHooks<S, A>
{
    type Asset = S::Asset;

    fn materialize(&self) -> Result<NonNull<S::Asset>, AcquireError> {
        let manager = self.manager();
        let storage = match manager.allocator.allocate(1) {
            Ok(storage) => storage,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    asset = std::any::type_name::<S::Asset>(),
                    error = %err,
                    "asset storage allocation failed"
                );
                return Err(AcquireError::new::<S::Asset>(err));
            }
        };

        let guard = StorageGuard {
            allocator: &manager.allocator,
            storage,
        };
        let asset = self.seed.grow();
        mem::forget(guard);
        // SAFETY: `storage` is fresh, uninitialized room for one asset.
        unsafe { storage.as_ptr().write(asset) };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            asset = std::any::type_name::<S::Asset>(),
            index = self.key.get().map(|key| key.index()),
            "materialized asset"
        );
        Ok(storage)
    }

    unsafe fn destroy(&self, asset: NonNull<S::Asset>) {
        ptr::drop_in_place(asset.as_ptr());
        match self.manager.upgrade() {
            Some(manager) => {
                manager.allocator.deallocate(asset, 1);
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    asset = std::any::type_name::<S::Asset>(),
                    index = self.key.get().map(|key| key.index()),
                    "destroyed asset"
                );
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    asset = std::any::type_name::<S::Asset>(),
                    "asset manager gone, leaking asset storage"
                );
            }
        }
    }

    fn forget(&self) {
        let Some(key) = self.key.get() else {
            panic!("controller forgotten before it was registered");
        };
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(
            asset = std::any::type_name::<S::Asset>(),
            index = key.index(),
            "forgetting asset controller"
        );
        // Drops the registry's reference to this controller.
        manager.erase(key);
    }
}

/// Manager without caching or eviction.
///
/// Assets are built on first strong use, destroyed on last strong release,
/// and their controllers are discarded once no handle of either kind is
/// left. [`clean`](AssetManager::clean) does nothing.
///
/// The manager must outlive every handle it gave out. Dropping it while
/// controllers are still referenced panics.
///
/// # Example
///
/// ```
/// use lazy_assets::{AssetManager, FromKernel, NaiveManager, Seed};
///
/// enum Source {
///     Inline(Vec<u8>),
///     Zeroed(usize),
/// }
///
/// struct Blob(Vec<u8>);
///
/// impl FromKernel<Source> for Blob {
///     fn from_kernel(source: &Source) -> Self {
///         match source {
///             Source::Inline(bytes) => Blob(bytes.clone()),
///             Source::Zeroed(len) => Blob(vec![0; *len]),
///         }
///     }
/// }
///
/// let manager: NaiveManager<Seed<Blob, Source>> = NaiveManager::new();
/// let blob = manager.register(Seed::new(Source::Zeroed(16)));
/// assert_eq!(manager.len(), 1);
///
/// {
///     let loaded = blob.upgrade().unwrap();
///     assert_eq!(loaded.0.len(), 16);
///     assert_eq!(manager.stats().materialized, 1);
/// }
/// assert_eq!(manager.stats().materialized, 0);
///
/// drop(blob);
/// assert!(manager.is_empty());
/// ```
pub struct NaiveManager<S: SeedLike, A: AssetAllocator<S::Asset> + 'static = Global> {
    shared: Rc<Shared<S, A>>,
}

impl<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> NaiveManager<S, A> {
    /// Create a manager with a default-constructed allocator.
    pub fn new() -> Self
    where
        A: Default,
    {
        Self::with_allocator(A::default())
    }

    /// Create a manager that stores assets through `allocator`.
    pub fn with_allocator(allocator: A) -> Self {
        Self::with_capacity(allocator, 0)
    }

    /// Create a manager with room for `capacity` controllers.
    pub fn with_capacity(allocator: A, capacity: usize) -> Self {
        NaiveManager {
            shared: Rc::new(Shared {
                allocator,
                registry: RefCell::new(Registry::with_capacity(capacity)),
            }),
        }
    }

    /// The allocator assets are stored through.
    pub fn allocator(&self) -> &A {
        &self.shared.allocator
    }

    /// Number of registered controllers.
    pub fn len(&self) -> usize {
        self.shared.registry.borrow().len()
    }

    /// Whether no controllers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `handle` points at a controller registered here.
    pub fn contains(&self, handle: &WeakHandle<S::Asset>) -> bool {
        let target = Rc::as_ptr(handle.counter());
        self.shared
            .registry
            .borrow()
            .iter()
            .any(|(_, entry)| ptr::addr_eq(Rc::as_ptr(entry), target))
    }

    /// Snapshot of the registered controllers.
    pub fn stats(&self) -> ManagerStats {
        self.shared
            .registry
            .borrow()
            .iter()
            .fold(ManagerStats::default(), |mut stats, (_, entry)| {
                stats.registered += 1;
                stats.materialized += usize::from(entry.is_materialized());
                stats.strong_refs += entry.strong_count();
                stats.weak_refs += entry.weak_count();
                stats
            })
    }
}

impl<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> AssetManager<S> for NaiveManager<S, A> {
    fn register(&self, seed: S) -> WeakHandle<S::Asset> {
        let controller = Rc::new(Controller::new(ProxyHooks {
            seed,
            manager: Rc::downgrade(&self.shared),
            key: Cell::new(None),
        }));
        let key = self
            .shared
            .registry
            .borrow_mut()
            .insert(Rc::clone(&controller));
        controller.hooks().key.set(Some(key));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            asset = std::any::type_name::<S::Asset>(),
            index = key.index(),
            generation = key.generation(),
            "registered asset seed"
        );
        WeakHandle::new(controller)
    }

    fn clean(&self, budget: usize) {
        // Nothing is cached, so there is nothing to evict.
        #[cfg(feature = "tracing")]
        tracing::trace!(budget, registered = self.len(), "clean requested");
        let _ = budget;
    }
}

impl<S, A> Default for NaiveManager<S, A>
where
    S: SeedLike,
    A: AssetAllocator<S::Asset> + Default + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> Drop for NaiveManager<S, A> {
    fn drop(&mut self) {
        let outstanding = self.shared.registry.borrow().len();
        if outstanding != 0 && !std::thread::panicking() {
            panic!("NaiveManager dropped while {outstanding} controller(s) are still referenced");
        }
    }
}

impl<S: SeedLike, A: AssetAllocator<S::Asset> + 'static> fmt::Debug for NaiveManager<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NaiveManager")
            .field("asset", &std::any::type_name::<S::Asset>())
            .field("allocator", &std::any::type_name::<A>())
            .field("registry", &*self.shared.registry.borrow())
            .finish()
    }
}
