//! The handle-style (secondary) view handed to scheduled workers.

use std::{
    fmt,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    sync::Arc,
};

use dualview_arena::RegionRef;
use dualview_common::Result;
use dualview_guard::{AccessGuard, ReadRegistration, WriteRegistration};

/// A detached view of a [`SharedSequence`](crate::SharedSequence) typed for
/// concurrent workers.
///
/// The view carries no lifetime and can be cloned and moved to other threads.
/// The elements can only be reached through [`read`](HandleView::read) or
/// [`write`](HandleView::write), which register the access with the guard of the
/// storage generation the view was created in. Once that generation is resized
/// away or disposed, every access attempt fails with `InvalidatedHandle`.
///
/// The view shares ownership of the region it points into. An access that is
/// still running when the sequence is dropped keeps working on valid memory, and
/// the region is released once the last view is gone.
pub struct HandleView<U> {
    ptr: NonNull<U>,
    len: usize,
    guard: Arc<AccessGuard>,
    region: RegionRef,
}

// SAFETY: the view only hands out element references while a registration is
// held, and the guard makes sure those registrations are either shared reads or
// a single write.
unsafe impl<U: Send + Sync> Send for HandleView<U> {}
unsafe impl<U: Send + Sync> Sync for HandleView<U> {}

impl<U> HandleView<U> {
    pub(crate) fn new(region: RegionRef, len: usize, guard: Arc<AccessGuard>) -> HandleView<U> {
        HandleView {
            ptr: region.as_ptr().cast(),
            len,
            guard,
            region,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Guard of the storage generation this view belongs to.
    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.guard
    }

    /// Storage generation this view belongs to.
    pub fn generation(&self) -> u64 {
        self.guard.generation()
    }

    /// Starts a read-only access.
    ///
    /// Fails with `ConcurrentAccessViolation` if a writer is outstanding or the
    /// owning thread currently holds the sequence, and with `InvalidatedHandle`
    /// if the view is stale.
    pub fn read(&self) -> Result<HandleRead<U>> {
        let registration = self.guard.read()?;
        Ok(HandleRead {
            view: self.clone(),
            _registration: registration,
        })
    }

    /// Starts a read-write access.
    ///
    /// Fails with `ConcurrentAccessViolation` if any other access is outstanding,
    /// and with `InvalidatedHandle` if the view is stale.
    pub fn write(&self) -> Result<HandleWrite<U>> {
        let registration = self.guard.write()?;
        Ok(HandleWrite {
            view: self.clone(),
            _registration: registration,
        })
    }
}

impl<U> Clone for HandleView<U> {
    fn clone(&self) -> Self {
        HandleView {
            ptr: self.ptr,
            len: self.len,
            guard: self.guard.clone(),
            region: self.region.clone(),
        }
    }
}

impl<U> fmt::Debug for HandleView<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleView")
            .field("len", &self.len)
            .field("guard", &self.guard)
            .finish()
    }
}

/// An outstanding read-only access through a [`HandleView`].
///
/// Dereferences to the elements; the reader is released when dropped.
pub struct HandleRead<U> {
    view: HandleView<U>,
    _registration: ReadRegistration,
}

impl<U> Deref for HandleRead<U> {
    type Target = [U];

    fn deref(&self) -> &[U] {
        // SAFETY: the reader registration keeps writers, the owning thread and
        // reallocation away from the region for as long as `self` lives.
        unsafe { std::slice::from_raw_parts(self.view.ptr.as_ptr(), self.view.len) }
    }
}

impl<U: fmt::Debug> fmt::Debug for HandleRead<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandleRead").field(&self.deref()).finish()
    }
}

/// An outstanding read-write access through a [`HandleView`].
///
/// Dereferences to the elements; the writer is released when dropped.
pub struct HandleWrite<U> {
    view: HandleView<U>,
    _registration: WriteRegistration,
}

impl<U> Deref for HandleWrite<U> {
    type Target = [U];

    fn deref(&self) -> &[U] {
        // SAFETY: the writer registration excludes every other access.
        unsafe { std::slice::from_raw_parts(self.view.ptr.as_ptr(), self.view.len) }
    }
}

impl<U> DerefMut for HandleWrite<U> {
    fn deref_mut(&mut self) -> &mut [U] {
        // SAFETY: the writer registration excludes every other access, and
        // `&mut self` excludes other borrows of this one.
        unsafe { std::slice::from_raw_parts_mut(self.view.ptr.as_ptr(), self.view.len) }
    }
}

impl<U: fmt::Debug> fmt::Debug for HandleWrite<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandleWrite").field(&self.deref()).finish()
    }
}
