use std::sync::Arc;

use dualview_common::Result;

use crate::AccessGuard;

impl AccessGuard {
    /// Registers a reader and returns a token that releases it when dropped.
    ///
    /// Fails with `ConcurrentAccessViolation` if a writer is outstanding or the
    /// owning thread holds the region.
    pub fn read(self: &Arc<Self>) -> Result<ReadRegistration> {
        self.try_register_reader("read")?;
        Ok(ReadRegistration {
            guard: self.clone(),
        })
    }

    /// Registers a writer and returns a token that releases it when dropped.
    ///
    /// Fails with `ConcurrentAccessViolation` if any other access is outstanding.
    pub fn write(self: &Arc<Self>) -> Result<WriteRegistration> {
        self.try_register_writer("write")?;
        Ok(WriteRegistration {
            guard: self.clone(),
        })
    }
}

/// An outstanding reader registration.
///
/// The reader is released from its guard when the registration is dropped.
#[derive(Debug)]
pub struct ReadRegistration {
    guard: Arc<AccessGuard>,
}

impl ReadRegistration {
    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.guard
    }
}

impl Drop for ReadRegistration {
    fn drop(&mut self) {
        self.guard.release_reader();
    }
}

/// An outstanding writer registration.
///
/// The writer is released from its guard when the registration is dropped.
#[derive(Debug)]
pub struct WriteRegistration {
    guard: Arc<AccessGuard>,
}

impl WriteRegistration {
    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.guard
    }
}

impl Drop for WriteRegistration {
    fn drop(&mut self) {
        self.guard.release_writer();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{AccessGuard, GuardState};

    #[test]
    fn test_read_registration_released_on_drop() {
        let guard = Arc::new(AccessGuard::new(0));
        let first = guard.read().unwrap();
        let second = guard.read().unwrap();
        assert_eq!(guard.state(), GuardState::Reading(2));
        drop(first);
        assert_eq!(guard.state(), GuardState::Reading(1));
        drop(second);
        assert_eq!(guard.state(), GuardState::Idle);
    }

    #[test]
    fn test_write_registration_released_on_drop() {
        let guard = Arc::new(AccessGuard::new(0));
        {
            let registration = guard.write().unwrap();
            assert_eq!(registration.guard().state(), GuardState::Writing);
            assert!(guard.check_exclusive("test").is_err());
        }
        assert!(guard.check_exclusive("test").is_ok());
    }

    #[test]
    fn test_conflicting_registrations() {
        let guard = Arc::new(AccessGuard::new(0));
        let reader = guard.read().unwrap();
        assert!(guard.write().unwrap_err().is_concurrent_access());
        drop(reader);
        let writer = guard.write().unwrap();
        assert!(guard.read().unwrap_err().is_concurrent_access());
        assert!(guard.write().unwrap_err().is_concurrent_access());
        drop(writer);
        assert_eq!(guard.state(), GuardState::Idle);
    }

    #[test]
    fn test_registration_on_invalidated_guard() {
        let guard = Arc::new(AccessGuard::new(2));
        let registration = guard.write().unwrap();
        guard.invalidate();
        assert!(guard.read().unwrap_err().is_invalidated_handle());
        assert!(guard.write().unwrap_err().is_invalidated_handle());
        drop(registration);
        assert_eq!(guard.state(), GuardState::Invalidated);
    }

    #[test]
    fn test_registration_moves_to_worker() {
        let guard = Arc::new(AccessGuard::new(0));
        let registration = guard.read().unwrap();
        let worker = std::thread::spawn(move || {
            assert_eq!(registration.guard().state(), GuardState::Reading(1));
        });
        worker.join().unwrap();
        assert_eq!(guard.state(), GuardState::Idle);
    }
}
