//! Raw storage for assets.
//!
//! Controllers never allocate on their own. They ask an [`AssetAllocator`]
//! for uninitialized storage, move the asset built from its seed into it,
//! and hand the storage back with the same count once the asset is
//! destroyed.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::{AllocError, AllocErrorKind};

/// Typed allocator capability used by managers to store assets.
///
/// Every successful `allocate(n)` must eventually be matched by exactly one
/// `deallocate(ptr, n)` with the same pointer and count.
///
/// Both methods take `&self`: allocators with internal bookkeeping use
/// interior mutability, the same way the manager's own state does.
///
/// # Example
///
/// ```
/// use lazy_assets::{AssetAllocator, Global};
/// use std::ptr::NonNull;
///
/// let storage: NonNull<u32> = Global.allocate(1).unwrap();
/// unsafe {
///     storage.as_ptr().write(7_u32);
///     assert_eq!(*storage.as_ptr(), 7);
///     AssetAllocator::<u32>::deallocate(&Global, storage, 1);
/// }
/// ```
///
/// Managers write assets through the returned pointer, so an implementation
/// has to be declared `unsafe`:
///
/// ```compile_fail,E0200
/// use std::ptr::NonNull;
/// use lazy_assets::{AllocError, AssetAllocator};
///
/// struct Nowhere;
///
/// impl<T> AssetAllocator<T> for Nowhere {
///     fn allocate(&self, _count: usize) -> Result<NonNull<T>, AllocError> {
///         Ok(NonNull::dangling())
///     }
///
///     unsafe fn deallocate(&self, _ptr: NonNull<T>, _count: usize) {}
/// }
/// ```
///
/// # Safety
///
/// A successful `allocate(count)` must return a pointer that is aligned for
/// `T`, valid for reads and writes of `count` values of `T`, not shared with
/// any other live allocation, and that stays valid until it is passed to
/// [`deallocate`](Self::deallocate).
pub unsafe trait AssetAllocator<T> {
    /// Allocate uninitialized storage for `count` values of `T`.
    fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError>;

    /// Return storage obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `self.allocate(count)` with this exact
    /// `count`, must not have been deallocated already, and any values in it
    /// must already have been dropped.
    unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize);
}

// SAFETY: forwards to an allocator that upholds the contract.
unsafe impl<T, A: AssetAllocator<T> + ?Sized> AssetAllocator<T> for &A {
    fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError> {
        (**self).allocate(count)
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        (**self).deallocate(ptr, count)
    }
}

/// Allocator backed by the process-wide global allocator.
///
/// Zero-sized requests never touch the global allocator and yield a dangling,
/// well-aligned pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Global;

// SAFETY: storage comes from `std::alloc` with `Layout::array::<T>(count)`,
// or is a dangling aligned pointer when that layout is zero-sized.
unsafe impl<T> AssetAllocator<T> for Global {
    fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError> {
        let layout = Layout::array::<T>(count)
            .map_err(|_| AllocError::new::<T>(AllocErrorKind::LayoutOverflow, count))?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr.cast::<T>())
            .ok_or_else(|| AllocError::new::<T>(AllocErrorKind::OutOfMemory, count))
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        // The layout was valid when this storage was allocated.
        let Ok(layout) = Layout::array::<T>(count) else {
            return;
        };
        if layout.size() != 0 {
            dealloc(ptr.as_ptr().cast::<u8>(), layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_roundtrip() {
        let ptr: NonNull<String> = Global.allocate(1).unwrap();
        unsafe {
            ptr.as_ptr().write("hello".to_string());
            assert_eq!(&*ptr.as_ptr(), "hello");
            std::ptr::drop_in_place(ptr.as_ptr());
            Global.deallocate(ptr, 1);
        }
    }

    #[test]
    fn test_global_alignment() {
        #[repr(align(64))]
        struct Aligned([u8; 3]);

        let ptr: NonNull<Aligned> = Global.allocate(2).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
        unsafe { Global.deallocate(ptr, 2) };
    }

    #[test]
    fn test_global_zero_sized() {
        let ptr: NonNull<()> = Global.allocate(1).unwrap();
        assert_eq!(ptr, NonNull::dangling());
        unsafe { Global.deallocate(ptr, 1) };
    }

    #[test]
    fn test_global_layout_overflow() {
        let err = AssetAllocator::<u64>::allocate(&Global, usize::MAX).unwrap_err();
        assert_eq!(err.kind(), AllocErrorKind::LayoutOverflow);
        assert_eq!(err.count(), usize::MAX);
    }

    #[test]
    fn test_reference_forwards() {
        fn roundtrip<A: AssetAllocator<u16>>(allocator: A) {
            let ptr = allocator.allocate(3).unwrap();
            unsafe { allocator.deallocate(ptr, 3) };
        }

        let global = Global;
        roundtrip(&global);
    }
}
