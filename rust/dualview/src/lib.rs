//! One block of memory, two typed views, and conflict detection between them.
//!
//! A [`SharedSequence<T, U>`] owns a single allocation that sequential code sees as
//! `[T]` (the primary view) and that worker jobs see as `[U]` (the secondary view,
//! a [`HandleView`]). `T` and `U` must be plain-old-data types of identical size;
//! nothing is ever copied between the two views.
//!
//! Workers register their accesses with the sequence's [`AccessGuard`]. Whenever the
//! owning thread wants to touch the elements itself, the guard is consulted first
//! and the operation fails with `ConcurrentAccessViolation` if it would conflict
//! with an outstanding access. The guard detects conflicts; it never waits for
//! workers to finish.
//!
//! ```
//! use dualview::{JobScheduler, SharedSequence};
//!
//! let mut sequence = SharedSequence::<u32, f32>::new(4)?;
//! let scheduler = JobScheduler::builder().num_threads(2).build()?;
//!
//! let view = sequence.to_secondary_view()?;
//! let job = scheduler.schedule_write(&view, |values| values.fill(1.0))?;
//! job.complete()?;
//!
//! // An access registered by some other scheduler blocks the owning thread.
//! sequence.guard().register_reader()?;
//! assert!(sequence.clear().is_err());
//! sequence.guard().release_reader();
//!
//! let primary = sequence.to_primary_view()?;
//! assert!(primary.iter().all(|&bits| bits == 1.0f32.to_bits()));
//! # Ok::<(), dualview::Error>(())
//! ```

pub mod elements;
pub mod handle;
pub mod scheduler;
pub mod sequence;

pub use dualview_common::{Result, error::Error, error::ErrorKind};
pub use dualview_guard::{AccessGuard, GuardState, ReadRegistration, WriteRegistration};
pub use elements::Elements;
pub use handle::{HandleRead, HandleView, HandleWrite};
pub use scheduler::{JobHandle, JobScheduler, JobSchedulerBuilder};
pub use sequence::{PrimaryView, SharedSequence};
