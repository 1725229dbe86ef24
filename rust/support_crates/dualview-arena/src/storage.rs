use std::{
    alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error},
    mem::ManuallyDrop,
    ptr::NonNull,
};

use dualview_common::{Result, error::Error};

/// An untyped, contiguous, zero-initialized memory region with a fixed address.
///
/// The region is either allocated by `RawStorage` itself (see [`RawStorage::zeroed`])
/// or adopted from a `Vec<T>` without copying (see [`RawStorage::adopt_vec`]).
/// In both cases `layout` records exactly what must be passed to `dealloc`.
pub(crate) struct RawStorage {
    /// Base address of the region, aligned to at least the requested alignment.
    /// Dangling (but aligned) when nothing is allocated.
    ptr: NonNull<u8>,
    /// Layout of the live allocation, `None` for zero-sized regions.
    layout: Option<Layout>,
}

// SAFETY: `RawStorage` exclusively owns its allocation, the same way `Vec<u8>` does.
unsafe impl Send for RawStorage {}
unsafe impl Sync for RawStorage {}

impl RawStorage {
    /// Creates a storage with no allocation whose base pointer is aligned
    /// to `alignment`.
    pub fn empty(alignment: usize) -> RawStorage {
        debug_assert!(alignment.is_power_of_two());
        // SAFETY: a power of two is never zero.
        let ptr = unsafe { NonNull::new_unchecked(std::ptr::without_provenance_mut(alignment)) };
        RawStorage { ptr, layout: None }
    }

    /// Allocates a zero-filled region of `size` bytes aligned to `alignment`.
    pub fn zeroed(size: usize, alignment: usize) -> Result<RawStorage> {
        if size == 0 {
            return Ok(RawStorage::empty(alignment));
        }
        let layout = Layout::from_size_align(size, alignment)
            .map_err(|e| Error::invalid_arg("size", format!("{size} bytes: {e}")))?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };
        Ok(RawStorage {
            ptr,
            layout: Some(layout),
        })
    }

    /// Takes custody of the allocation backing `vec`.
    ///
    /// Returns the vector back (untouched) when its base address does not satisfy
    /// `alignment`, so that the caller can fall back to copying.
    pub fn adopt_vec<T: Copy>(
        vec: Vec<T>,
        alignment: usize,
    ) -> std::result::Result<RawStorage, Vec<T>> {
        if std::mem::size_of::<T>() == 0 || vec.capacity() == 0 {
            return Ok(RawStorage::empty(alignment));
        }
        if !(vec.as_ptr() as usize).is_multiple_of(alignment) {
            return Err(vec);
        }
        let Ok(layout) = Layout::array::<T>(vec.capacity()) else {
            return Err(vec);
        };
        let mut vec = ManuallyDrop::new(vec);
        // SAFETY: the vector's buffer is non-null when its capacity and element
        // size are both non-zero.
        let ptr = unsafe { NonNull::new_unchecked(vec.as_mut_ptr() as *mut u8) };
        Ok(RawStorage {
            ptr,
            layout: Some(layout),
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns `true` if this storage owns a live allocation.
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.layout.is_some()
    }
}

impl Drop for RawStorage {
    fn drop(&mut self) {
        if let Some(layout) = self.layout.take() {
            // SAFETY: `ptr` was obtained from the global allocator with `layout`
            // (directly, or by the `Vec` whose buffer was adopted).
            unsafe { dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}
