//! A minimal scheduler integration that runs worker jobs against [`HandleView`]s.
//!
//! Each job's access is registered with the view's guard on the calling thread,
//! before `schedule_*` returns, and released on the worker right after the job
//! body finishes. The owning thread therefore observes the job as outstanding
//! from the moment it is scheduled until it is known to be complete.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, OnceLock},
};

use dualview_common::{Result, error::Error};
use once_cell::sync::OnceCell;

use crate::handle::HandleView;

/// Runs scheduled read and write jobs on a dedicated rayon thread pool.
pub struct JobScheduler {
    thread_pool: rayon::ThreadPool,
}

impl JobScheduler {
    /// Returns a builder for a scheduler with its own thread pool.
    pub fn builder() -> JobSchedulerBuilder {
        JobSchedulerBuilder {
            num_threads: None,
            thread_name: None,
        }
    }

    /// Returns the process-wide shared scheduler, created on first use with one
    /// thread per available core.
    pub fn shared() -> Arc<JobScheduler> {
        static SCHEDULER: OnceLock<Arc<JobScheduler>> = OnceLock::new();
        SCHEDULER
            .get_or_init(|| {
                let scheduler = JobScheduler::builder()
                    .build()
                    .expect("shared job scheduler");
                Arc::new(scheduler)
            })
            .clone()
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.thread_pool.current_num_threads()
    }

    /// Schedules a read-only job over `view`.
    ///
    /// The reader is registered before this call returns. Fails without scheduling
    /// anything if the registration is rejected (an outstanding writer, the owning
    /// thread holding the sequence, or a stale view).
    pub fn schedule_read<U, F>(&self, view: &HandleView<U>, job: F) -> Result<JobHandle>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&[U]) + Send + 'static,
    {
        let access = view.read()?;
        Ok(self.spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| job(&access[..])));
            drop(access);
            result
        }))
    }

    /// Schedules a read-write job over `view`.
    ///
    /// The writer is registered before this call returns. Fails without scheduling
    /// anything if any other access is outstanding or the view is stale.
    pub fn schedule_write<U, F>(&self, view: &HandleView<U>, job: F) -> Result<JobHandle>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&mut [U]) + Send + 'static,
    {
        let mut access = view.write()?;
        Ok(self.spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| job(&mut access[..])));
            drop(access);
            result
        }))
    }

    fn spawn<F>(&self, body: F) -> JobHandle
    where
        F: FnOnce() -> std::thread::Result<()> + Send + 'static,
    {
        let outcome = Arc::new(OnceCell::new());
        let handle = JobHandle {
            outcome: outcome.clone(),
        };
        self.thread_pool.spawn(move || {
            let result = body().map_err(|payload| panic_message(payload.as_ref()));
            if let Err(message) = &result {
                log::warn!("JobScheduler: job panicked: {message}");
            }
            let _ = outcome.set(result);
        });
        handle
    }
}

/// Configuration for a [`JobScheduler`].
#[derive(Debug, Clone)]
pub struct JobSchedulerBuilder {
    num_threads: Option<usize>,
    thread_name: Option<String>,
}

impl JobSchedulerBuilder {
    /// Number of worker threads; defaults to the number of available cores.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Prefix of the worker thread names; defaults to `dualview_worker`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = Some(prefix.into());
        self
    }

    /// Starts the thread pool.
    pub fn build(self) -> Result<JobScheduler> {
        let prefix = self
            .thread_name
            .unwrap_or_else(|| "dualview_worker".to_string());
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(move |i| format!("{prefix}_{i}"));
        if let Some(num_threads) = self.num_threads {
            builder = builder.num_threads(num_threads);
        }
        let thread_pool = builder
            .build()
            .map_err(|e| Error::scheduler(e.to_string()))?;
        log::debug!(
            "JobScheduler: started {} worker threads",
            thread_pool.current_num_threads()
        );
        Ok(JobScheduler { thread_pool })
    }
}

/// Completion handle of a scheduled job.
///
/// Dropping the handle does not cancel the job; its registration is still
/// released when the job finishes.
#[derive(Clone)]
pub struct JobHandle {
    outcome: Arc<OnceCell<std::result::Result<(), String>>>,
}

impl JobHandle {
    /// Returns `true` once the job has finished and released its registration.
    pub fn is_complete(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Blocks until the job has finished.
    ///
    /// Fails with `JobPanicked` if the job body panicked; its registration has been
    /// released either way.
    pub fn complete(self) -> Result<()> {
        match self.outcome.wait() {
            Ok(()) => Ok(()),
            Err(message) => Err(Error::job_panicked(message.clone())),
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("complete", &self.is_complete())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
