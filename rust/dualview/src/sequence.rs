use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use bytemuck::Pod;
use dualview_arena::AliasedBuffer;
use dualview_common::{Result, error::Error};
use dualview_guard::AccessGuard;

use crate::{elements::Elements, handle::HandleView};

/// A fixed-size sequence of elements viewable as `T` by the owning thread and as
/// `U` by scheduled workers, over one shared allocation.
///
/// Every owning-thread operation consults the sequence's [`AccessGuard`] first:
///
/// | operation | check |
/// |---|---|
/// | [`to_primary_view`](Self::to_primary_view) | exclusive |
/// | [`clear`](Self::clear) | exclusive |
/// | [`resize`](Self::resize) | exclusive |
/// | [`dispose`](Self::dispose) | exclusive |
/// | [`iterate`](Self::iterate) | shared (readers tolerated) |
/// | [`to_secondary_view`](Self::to_secondary_view) | none |
///
/// A failed check reports `ConcurrentAccessViolation` and leaves both the
/// sequence and the guard untouched.
pub struct SharedSequence<T: Pod, U: Pod = T> {
    /// `None` once disposed.
    buffer: Option<AliasedBuffer<T, U>>,
    guard: Arc<AccessGuard>,
}

impl<T: Pod, U: Pod> SharedSequence<T, U> {
    /// Creates a zero-filled sequence of `len` elements.
    ///
    /// Fails with `SizeMismatch` if `T` and `U` differ in size.
    pub fn new(len: usize) -> Result<Self> {
        Ok(Self::with_buffer(AliasedBuffer::new(len)?))
    }

    /// Creates a sequence that takes custody of the elements of `vec`.
    ///
    /// Fails with `SizeMismatch` if `T` and `U` differ in size.
    pub fn from_vec(vec: Vec<T>) -> Result<Self> {
        Ok(Self::with_buffer(AliasedBuffer::from_vec(vec)?))
    }

    /// Creates a sequence holding a copy of `values`.
    pub fn from_slice(values: &[T]) -> Result<Self> {
        Ok(Self::with_buffer(AliasedBuffer::from_slice(values)?))
    }

    fn with_buffer(buffer: AliasedBuffer<T, U>) -> Self {
        SharedSequence {
            buffer: Some(buffer),
            guard: Arc::new(AccessGuard::new(0)),
        }
    }

    /// Number of elements; zero once disposed.
    pub fn len(&self) -> usize {
        self.buffer.as_ref().map_or(0, AliasedBuffer::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.buffer.is_none()
    }

    /// Guard of the current storage generation.
    ///
    /// Scheduler integrations register and release their accesses here.
    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.guard
    }

    /// Current storage generation; incremented by every effective resize.
    pub fn generation(&self) -> u64 {
        self.guard.generation()
    }

    /// Returns the owned-style view of the elements.
    ///
    /// Fails with `ConcurrentAccessViolation` while any reader or writer is
    /// outstanding. While the returned view is alive, scheduled accesses through
    /// [`HandleView`]s are rejected.
    pub fn to_primary_view(&mut self) -> Result<PrimaryView<'_, T>> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| Error::use_after_dispose("to_primary_view"))?;
        self.guard.acquire_owner("to_primary_view")?;
        Ok(PrimaryView {
            elements: buffer.primary_mut(),
            guard: &self.guard,
        })
    }

    /// Returns the handle-style view of the elements, without any guard check.
    ///
    /// The view is meant to be handed to a scheduler, which registers each access
    /// against the guard for the duration of the scheduled work.
    pub fn to_secondary_view(&self) -> Result<HandleView<U>> {
        let buffer = self.live_buffer("to_secondary_view")?;
        Ok(HandleView::new(
            buffer.region(),
            buffer.len(),
            self.guard.clone(),
        ))
    }

    /// Sets every element to zero.
    ///
    /// Fails with `ConcurrentAccessViolation` while any reader or writer is
    /// outstanding.
    pub fn clear(&mut self) -> Result<()> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| Error::use_after_dispose("clear"))?;
        self.guard.acquire_owner("clear")?;
        buffer.clear();
        self.guard.release_owner();
        Ok(())
    }

    /// Resizes the sequence to `new_len` elements, preserving the first
    /// `min(len, new_len)` of them and zeroing the rest.
    ///
    /// Does nothing when the length is unchanged. Otherwise the current guard is
    /// invalidated, which makes every previously created [`HandleView`] stale, and
    /// a guard for the next storage generation takes its place.
    ///
    /// Fails with `ConcurrentAccessViolation` while any reader or writer is
    /// outstanding.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| Error::use_after_dispose("resize"))?;
        if buffer.len() == new_len {
            return Ok(());
        }
        // Nothing observable changes unless both the allocation and the guard
        // transition succeed.
        let pending = buffer.prepare_resize(new_len)?;
        self.guard.try_invalidate("resize")?;
        buffer.commit_resize(pending);
        let generation = self.guard.generation() + 1;
        self.guard = Arc::new(AccessGuard::new(generation));
        log::debug!("SharedSequence: generation {generation}, {} elements", buffer.len());
        Ok(())
    }

    /// Releases the storage.
    ///
    /// Views created earlier become stale; the memory itself is returned once the
    /// last of them is dropped.
    ///
    /// Calling `dispose` on an already disposed sequence does nothing. Every other
    /// operation on a disposed sequence fails with `UseAfterDispose`.
    ///
    /// Fails with `ConcurrentAccessViolation` while any reader or writer is
    /// outstanding, in which case the sequence stays usable.
    pub fn dispose(&mut self) -> Result<()> {
        if self.buffer.is_none() {
            return Ok(());
        }
        self.guard.try_invalidate("dispose")?;
        if let Some(buffer) = self.buffer.take() {
            buffer.dispose();
        }
        Ok(())
    }

    /// Returns an iterator over copies of the elements, as of this call.
    ///
    /// Outstanding readers are tolerated; an outstanding writer fails the call with
    /// `ConcurrentAccessViolation`.
    pub fn iterate(&self) -> Result<Elements<T>> {
        let buffer = self.live_buffer("iterate")?;
        self.guard.try_register_reader("iterate")?;
        let snapshot: Arc<[T]> = Arc::from(buffer.primary());
        self.guard.release_reader();
        Ok(Elements::new(snapshot))
    }

    /// Copies the elements into a new vector; same check as [`iterate`](Self::iterate).
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.iterate()?.as_slice().to_vec())
    }

    fn live_buffer(&self, operation: &'static str) -> Result<&AliasedBuffer<T, U>> {
        self.buffer
            .as_ref()
            .ok_or_else(|| Error::use_after_dispose(operation))
    }
}

impl<T: Pod, U: Pod> Drop for SharedSequence<T, U> {
    fn drop(&mut self) {
        if self.buffer.is_none() {
            return;
        }
        if let Err(e) = self.guard.try_invalidate("drop") {
            // Running accesses hold their own reference to the region.
            log::warn!("SharedSequence dropped with outstanding accesses ({e})");
            self.guard.invalidate();
        }
    }
}

impl<T: Pod, U: Pod> fmt::Debug for SharedSequence<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSequence")
            .field("buffer", &self.buffer)
            .field("guard", &self.guard)
            .finish()
    }
}

/// The owned-style view returned by [`SharedSequence::to_primary_view`].
///
/// Dereferences to the elements. While the view is alive the sequence counts as
/// held by the owning thread, so workers cannot start new accesses.
pub struct PrimaryView<'a, T> {
    elements: &'a mut [T],
    guard: &'a AccessGuard,
}

impl<T> Deref for PrimaryView<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.elements
    }
}

impl<T> DerefMut for PrimaryView<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.elements
    }
}

impl<T> Drop for PrimaryView<'_, T> {
    fn drop(&mut self) {
        self.guard.release_owner();
    }
}

impl<T: fmt::Debug> fmt::Debug for PrimaryView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrimaryView").field(&self.elements).finish()
    }
}
