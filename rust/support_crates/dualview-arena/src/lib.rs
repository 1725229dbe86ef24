//! A single contiguous memory region exposed through two element types of
//! identical size.
//!
//! [`AliasedBuffer<T, U>`] owns an untyped, zero-initialized arena and offers a
//! *primary* view typed `T` and a *secondary* view typed `U` over the very same
//! bytes. Element offsets are `index * size_of::<T>()` in both views, which is why
//! the two element types must have equal size. That requirement is verified once,
//! when the buffer is constructed.
//!
//! The buffer itself performs no access tracking: callers that hand the secondary
//! view to other threads are expected to coordinate through a guard
//! (see the `dualview-guard` crate). Such callers hold a [`RegionRef`] next to the
//! raw pointer, so the region is released by whichever of the buffer and its
//! outstanding references goes last.

use std::{fmt, marker::PhantomData, ptr::NonNull, sync::Arc};

use bytemuck::Pod;
use dualview_common::{Result, error::Error, verify_arg};

use storage::RawStorage;

mod storage;

#[cfg(test)]
mod tests;

/// One memory region, two typed views.
///
/// Both views always address the same base pointer and the same element count.
/// The base pointer changes only on [`resize`](AliasedBuffer::resize) and the
/// region is released exactly once: on [`dispose`](AliasedBuffer::dispose) or drop,
/// or later, when the last [`RegionRef`] to it is dropped.
pub struct AliasedBuffer<T, U = T> {
    storage: Arc<RawStorage>,
    len: usize,
    _marker: PhantomData<(T, U)>,
}

impl<T: Pod, U: Pod> AliasedBuffer<T, U> {
    /// Creates a zero-filled buffer of `len` elements.
    ///
    /// Fails with `SizeMismatch` if `T` and `U` differ in size, before any memory
    /// is allocated.
    pub fn new(len: usize) -> Result<Self> {
        Self::verify_layout()?;
        let storage = RawStorage::zeroed(Self::byte_len_for(len)?, Self::alignment())?;
        Ok(AliasedBuffer {
            storage: Arc::new(storage),
            len,
            _marker: PhantomData,
        })
    }

    /// Creates a buffer over the elements of `vec`, taking custody of its allocation.
    ///
    /// No element is copied as long as the vector's buffer is suitably aligned for `U`,
    /// which always holds when `align_of::<U>() <= align_of::<T>()`. Otherwise the
    /// elements are copied into a freshly aligned region.
    pub fn from_vec(vec: Vec<T>) -> Result<Self> {
        Self::verify_layout()?;
        let len = vec.len();
        match RawStorage::adopt_vec(vec, Self::alignment()) {
            Ok(storage) => {
                log::debug!("AliasedBuffer: adopted vector allocation of {len} elements");
                Ok(AliasedBuffer {
                    storage: Arc::new(storage),
                    len,
                    _marker: PhantomData,
                })
            }
            Err(vec) => {
                log::debug!(
                    "AliasedBuffer: vector allocation misaligned, copying {len} elements"
                );
                Self::from_slice(&vec)
            }
        }
    }

    /// Creates a buffer containing a copy of `values`.
    pub fn from_slice(values: &[T]) -> Result<Self> {
        let mut buffer = Self::new(values.len())?;
        buffer.primary_mut().copy_from_slice(values);
        Ok(buffer)
    }

    /// Number of elements, identical for both views.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the region in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// Alignment of the region, large enough for both element types.
    #[inline]
    pub fn alignment() -> usize {
        std::mem::align_of::<T>().max(std::mem::align_of::<U>())
    }

    /// Base address of the region.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.storage.as_ptr()
    }

    /// Base address of the region, typed for the secondary view.
    ///
    /// The pointer stays valid until the next `resize` or until the buffer is
    /// disposed, or for as long as a [`RegionRef`] obtained from
    /// [`region`](Self::region) is held. Dereferencing it concurrently with any
    /// other view is the caller's responsibility.
    #[inline]
    pub fn secondary_ptr(&self) -> NonNull<U> {
        self.storage.as_ptr().cast()
    }

    /// Returns a reference that keeps the current region allocated, even past a
    /// `resize` or `dispose` of this buffer.
    pub fn region(&self) -> RegionRef {
        RegionRef(self.storage.clone())
    }

    /// Primary view of the region.
    #[inline]
    pub fn primary(&self) -> &[T] {
        // SAFETY: the region holds `len` initialized elements of `T`'s size and
        // is aligned for `T`; every bit pattern is a valid `T`.
        unsafe {
            std::slice::from_raw_parts(self.storage.as_ptr().cast::<T>().as_ptr(), self.len)
        }
    }

    /// Mutable primary view of the region.
    #[inline]
    pub fn primary_mut(&mut self) -> &mut [T] {
        // SAFETY: see `primary`; `&mut self` guarantees exclusivity within safe code,
        // since a `RegionRef` gives no access to the elements.
        unsafe {
            std::slice::from_raw_parts_mut(self.storage.as_ptr().cast::<T>().as_ptr(), self.len)
        }
    }

    /// Secondary view of the region.
    #[inline]
    pub fn secondary(&self) -> &[U] {
        // SAFETY: `size_of::<U>() == size_of::<T>()` was verified at construction,
        // the region is aligned for `U`, and every bit pattern is a valid `U`.
        unsafe { std::slice::from_raw_parts(self.secondary_ptr().as_ptr(), self.len) }
    }

    /// Mutable secondary view of the region.
    #[inline]
    pub fn secondary_mut(&mut self) -> &mut [U] {
        // SAFETY: see `secondary`.
        unsafe { std::slice::from_raw_parts_mut(self.secondary_ptr().as_ptr(), self.len) }
    }

    /// Raw bytes of the region, as seen by both views.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the region holds `byte_len` initialized bytes; `Pod` elements
        // carry no padding.
        unsafe { std::slice::from_raw_parts(self.storage.as_ptr().as_ptr(), self.byte_len()) }
    }

    /// Resizes the buffer to `new_len` elements.
    ///
    /// The first `min(len, new_len)` elements are preserved, new elements are zeroed.
    /// Any change in length moves the region to a new address, so every pointer
    /// previously obtained from [`secondary_ptr`](Self::secondary_ptr) is invalidated.
    ///
    /// Does nothing when `new_len` equals the current length.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if new_len == self.len {
            return Ok(());
        }
        let pending = self.prepare_resize(new_len)?;
        self.commit_resize(pending);
        Ok(())
    }

    /// First half of a resize: validates `new_len` and allocates the zeroed
    /// region, without reading or modifying the current one.
    ///
    /// Dropping the returned [`PendingResize`] abandons the resize.
    pub fn prepare_resize(&self, new_len: usize) -> Result<PendingResize<T, U>> {
        let storage = RawStorage::zeroed(Self::byte_len_for(new_len)?, Self::alignment())?;
        Ok(PendingResize {
            storage,
            len: new_len,
            _marker: PhantomData,
        })
    }

    /// Second half of a resize: copies the preserved prefix into the prepared
    /// region and switches both views over to it.
    pub fn commit_resize(&mut self, pending: PendingResize<T, U>) {
        let PendingResize { storage, len, .. } = pending;
        let preserved = self.len.min(len) * std::mem::size_of::<T>();
        if preserved != 0 {
            // SAFETY: both regions are at least `preserved` bytes long and distinct.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.storage.as_ptr().as_ptr(),
                    storage.as_ptr().as_ptr(),
                    preserved,
                );
            }
        }
        log::debug!(
            "AliasedBuffer: resized from {} to {} elements ({} bytes preserved)",
            self.len,
            len,
            preserved
        );
        self.storage = Arc::new(storage);
        self.len = len;
    }

    /// Sets every element to zero.
    pub fn clear(&mut self) {
        bytemuck::fill_zeroes(self.primary_mut());
    }

    /// Releases the region, or leaves that to the last outstanding [`RegionRef`].
    pub fn dispose(self) {
        log::debug!(
            "AliasedBuffer: releasing {} elements (allocated: {}, outstanding references: {})",
            self.len,
            self.storage.is_allocated(),
            Arc::strong_count(&self.storage) - 1
        );
    }

    /// Copies the primary view into a new vector.
    pub fn to_vec(&self) -> Vec<T> {
        self.primary().to_vec()
    }

    fn verify_layout() -> Result<()> {
        let primary = std::mem::size_of::<T>();
        let secondary = std::mem::size_of::<U>();
        if primary == secondary {
            Ok(())
        } else {
            Err(Error::size_mismatch(primary, secondary))
        }
    }

    fn byte_len_for(len: usize) -> Result<usize> {
        let size = len.checked_mul(std::mem::size_of::<T>());
        verify_arg!(len, size.is_some_and(|size| size <= isize::MAX as usize));
        Ok(size.unwrap_or_default())
    }
}

impl<T: Pod, U: Pod> fmt::Debug for AliasedBuffer<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliasedBuffer")
            .field("len", &self.len)
            .field("byte_len", &self.byte_len())
            .field("alignment", &Self::alignment())
            .finish()
    }
}

/// A zeroed region allocated by [`AliasedBuffer::prepare_resize`], waiting to be
/// committed.
pub struct PendingResize<T, U = T> {
    storage: RawStorage,
    len: usize,
    _marker: PhantomData<(T, U)>,
}

impl<T, U> PendingResize<T, U> {
    /// Element count the buffer will have once the resize is committed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T, U> fmt::Debug for PendingResize<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResize")
            .field("len", &self.len)
            .finish()
    }
}

/// Shared ownership of an [`AliasedBuffer`] region.
///
/// Gives no access to the elements; it only keeps the memory behind a pointer
/// obtained from the buffer allocated. The region is released when the buffer
/// and every `RegionRef` to it are gone.
#[derive(Clone)]
pub struct RegionRef(Arc<RawStorage>);

impl RegionRef {
    /// Base address of the region.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.0.as_ptr()
    }

    /// Returns `true` if `self` and `other` refer to the same region.
    pub fn ptr_eq(&self, other: &RegionRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RegionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegionRef").field(&self.0.as_ptr()).finish()
    }
}
