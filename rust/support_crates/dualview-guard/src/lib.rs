//! Conflict detection between an owning thread and scheduled workers that share
//! one memory region.
//!
//! An [`AccessGuard`] records the accesses that a task scheduler has handed out:
//! any number of readers, or a single writer. The owning thread asks the guard
//! before it touches the region itself. The guard never waits and never
//! serializes anything: a check either passes immediately or fails with
//! `ConcurrentAccessViolation`.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use dualview_common::{Result, error::Error};

pub mod registration;

pub use registration::{ReadRegistration, WriteRegistration};

/// Reader/writer registration tracker for one storage generation.
///
/// The reader count, the writer flag and the invalidation flag are packed into a
/// single atomic word, so a release performed on a worker thread is observed
/// by the next check on the owning thread without any additional synchronization.
pub struct AccessGuard {
    state: AtomicU64,
    generation: u64,
}

impl AccessGuard {
    const READERS_MASK: u64 = u32::MAX as u64;
    const OWNER: u64 = 1 << 61;
    const WRITER: u64 = 1 << 62;
    const INVALIDATED: u64 = 1 << 63;

    /// Creates an idle guard for the given storage generation.
    pub fn new(generation: u64) -> AccessGuard {
        AccessGuard {
            state: AtomicU64::new(0),
            generation,
        }
    }

    /// Storage generation this guard protects.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns a snapshot of the current registrations.
    ///
    /// The snapshot may be stale by the time it is observed if workers are
    /// releasing concurrently.
    pub fn state(&self) -> GuardState {
        GuardState::from_bits(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once the guard has been invalidated.
    pub fn is_invalidated(&self) -> bool {
        self.state.load(Ordering::Acquire) & Self::INVALIDATED != 0
    }

    /// Records the start of a scheduled read-only access.
    ///
    /// This is the scheduler-side entry point: the guard trusts the scheduler's
    /// convention and does not reject a reader while a writer is outstanding.
    /// Fails with `InvalidatedHandle` if the guard has been invalidated.
    pub fn register_reader(&self) -> Result<()> {
        self.update("register_reader", Self::add_reader)?;
        log::trace!("AccessGuard({}): reader registered", self.generation);
        Ok(())
    }

    /// Records the completion of a scheduled read-only access.
    ///
    /// Does nothing on an invalidated guard, since invalidation already cleared
    /// every registration.
    pub fn release_reader(&self) {
        let released = self.update("release_reader", |bits| {
            let readers = bits & Self::READERS_MASK;
            debug_assert_ne!(readers, 0, "release_reader without a matching registration");
            Some(if readers == 0 { bits } else { bits - 1 })
        });
        if released.is_ok() {
            log::trace!("AccessGuard({}): reader released", self.generation);
        }
    }

    /// Records the start of a scheduled read-write access.
    ///
    /// The guard trusts the scheduler not to hand out two writers at a time and
    /// does not arbitrate between registrations.
    ///
    /// Fails with `InvalidatedHandle` if the guard has been invalidated.
    pub fn register_writer(&self) -> Result<()> {
        self.update("register_writer", |bits| Some(bits | Self::WRITER))?;
        log::trace!("AccessGuard({}): writer registered", self.generation);
        Ok(())
    }

    /// Records the completion of a scheduled read-write access.
    pub fn release_writer(&self) {
        if self
            .update("release_writer", |bits| Some(bits & !Self::WRITER))
            .is_ok()
        {
            log::trace!("AccessGuard({}): writer released", self.generation);
        }
    }

    /// Registers a reader only if no writer is outstanding and the owning thread
    /// does not currently hold the region; check and registration are one atomic
    /// step.
    pub fn try_register_reader(&self, operation: &'static str) -> Result<()> {
        self.update(operation, |bits| {
            if bits & (Self::WRITER | Self::OWNER) == 0 {
                Self::add_reader(bits)
            } else {
                None
            }
        })?;
        log::trace!("AccessGuard({}): reader registered", self.generation);
        Ok(())
    }

    /// Registers a writer only if nothing else is outstanding; check and
    /// registration are one atomic step.
    pub fn try_register_writer(&self, operation: &'static str) -> Result<()> {
        self.update(operation, |bits| (bits == 0).then_some(Self::WRITER))?;
        log::trace!("AccessGuard({}): writer registered", self.generation);
        Ok(())
    }

    /// Marks the region as borrowed by the owning thread, provided nothing is
    /// outstanding. While the mark is held every `try_register_*` call fails.
    pub fn acquire_owner(&self, operation: &'static str) -> Result<()> {
        self.update(operation, |bits| (bits == 0).then_some(Self::OWNER))
    }

    /// Clears the mark set by [`acquire_owner`](Self::acquire_owner).
    pub fn release_owner(&self) {
        let _ = self.update("release_owner", |bits| Some(bits & !Self::OWNER));
    }

    /// Verifies that no reader and no writer is outstanding.
    ///
    /// Required before handing out the primary view, and before clearing, resizing
    /// or disposing the region. `operation` names the caller's operation in the
    /// reported error.
    pub fn check_exclusive(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            GuardState::Idle => Ok(()),
            GuardState::Invalidated => Err(Error::invalidated_handle(self.generation)),
            state => Err(self.violation(operation, state)),
        }
    }

    /// Verifies that no writer is outstanding. Outstanding readers do not conflict.
    ///
    /// Required before iterating over the region.
    pub fn check_shared(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            GuardState::Idle | GuardState::Reading(_) => Ok(()),
            GuardState::Invalidated => Err(Error::invalidated_handle(self.generation)),
            state => Err(self.violation(operation, state)),
        }
    }

    /// Forcibly clears every registration and rejects all future ones.
    ///
    /// Called right before the protected region is reallocated or released,
    /// after [`check_exclusive`](Self::check_exclusive) has passed.
    pub fn invalidate(&self) {
        let previous = self.state.swap(Self::INVALIDATED, Ordering::AcqRel);
        let previous = GuardState::from_bits(previous);
        if previous != GuardState::Idle {
            log::debug!(
                "AccessGuard({}): invalidated while {}",
                self.generation,
                previous
            );
        }
    }

    /// Performs [`check_exclusive`](Self::check_exclusive) and
    /// [`invalidate`](Self::invalidate) as one atomic step, so that no
    /// registration can slip in between the two.
    pub fn try_invalidate(&self, operation: &'static str) -> Result<()> {
        self.update(operation, |bits| (bits == 0).then_some(Self::INVALIDATED))?;
        log::trace!("AccessGuard({}): invalidated", self.generation);
        Ok(())
    }

    /// Adds one reader, or rejects the transition when the reader count is
    /// saturated.
    #[inline]
    fn add_reader(bits: u64) -> Option<u64> {
        (bits & Self::READERS_MASK < Self::READERS_MASK).then_some(bits + 1)
    }

    /// Applies `f` to the state word unless the guard is invalidated.
    ///
    /// `f` returns `None` to reject the transition, which is reported as a
    /// `ConcurrentAccessViolation` for `operation` and leaves the state untouched.
    fn update(&self, operation: &'static str, f: impl Fn(u64) -> Option<u64>) -> Result<()> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & Self::INVALIDATED != 0 {
                return Err(Error::invalidated_handle(self.generation));
            }
            let Some(next) = f(current) else {
                return Err(self.violation(operation, GuardState::from_bits(current)));
            };
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(updated) => current = updated,
            }
        }
    }

    #[cold]
    fn violation(&self, operation: &'static str, state: GuardState) -> Error {
        log::debug!(
            "AccessGuard({}): {operation} rejected, {state}",
            self.generation
        );
        Error::concurrent_access(operation, state.to_string())
    }
}

impl fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGuard")
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}

/// Snapshot of the registrations recorded by an [`AccessGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No outstanding access.
    Idle,
    /// One or more outstanding readers, no writer.
    Reading(u32),
    /// An outstanding writer.
    Writing,
    /// The owning thread currently holds the region.
    Owned,
    /// The guard was invalidated; the storage it protected is gone.
    Invalidated,
}

impl GuardState {
    fn from_bits(bits: u64) -> GuardState {
        if bits & AccessGuard::INVALIDATED != 0 {
            GuardState::Invalidated
        } else if bits & AccessGuard::OWNER != 0 {
            GuardState::Owned
        } else if bits & AccessGuard::WRITER != 0 {
            GuardState::Writing
        } else {
            match (bits & AccessGuard::READERS_MASK) as u32 {
                0 => GuardState::Idle,
                n => GuardState::Reading(n),
            }
        }
    }
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardState::Idle => write!(f, "idle"),
            GuardState::Reading(1) => write!(f, "1 outstanding reader"),
            GuardState::Reading(n) => write!(f, "{n} outstanding readers"),
            GuardState::Writing => write!(f, "outstanding writer"),
            GuardState::Owned => write!(f, "held by the owning thread"),
            GuardState::Invalidated => write!(f, "invalidated"),
        }
    }
}
