use std::{iter::FusedIterator, sync::Arc};

/// By-value iterator over a snapshot of a [`SharedSequence`](crate::SharedSequence).
///
/// The snapshot is taken when iteration starts, so nothing written to the sequence
/// afterwards is observed. Cloning the iterator restarts from the clone's current
/// position without copying the snapshot; [`restart`](Elements::restart) rewinds
/// to the first element.
#[derive(Clone)]
pub struct Elements<T> {
    snapshot: Arc<[T]>,
    pos: usize,
}

impl<T: Copy> Elements<T> {
    pub(crate) fn new(snapshot: Arc<[T]>) -> Elements<T> {
        Elements { snapshot, pos: 0 }
    }

    /// Returns a fresh iterator over the same snapshot, positioned at the start.
    pub fn restart(&self) -> Elements<T> {
        Elements::new(self.snapshot.clone())
    }

    /// The elements that have not been yielded yet.
    pub fn as_slice(&self) -> &[T] {
        &self.snapshot[self.pos..]
    }
}

impl<T: Copy> Iterator for Elements<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.snapshot.get(self.pos).copied()?;
        self.pos += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.snapshot.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl<T: Copy> ExactSizeIterator for Elements<T> {}

impl<T: Copy> FusedIterator for Elements<T> {}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for Elements<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Elements").field(&self.as_slice()).finish()
    }
}
