//! # Stroke executor
//!
//! Runs the jobs of many strokes on one worker pool. Each stroke has its own queue, ordered by
//! the jobs' [`Sequentiality`](crate::job::Sequentiality), and strokes contend with each other only
//! through their [`ExclusiveResource`].
//!
//! ```text
//! start_stroke -> Init -> DoStroke* (Suspend -> Resume)* -> Finish | Cancel
//! ```

mod pool;
mod resource;
mod schedule;
mod stroke;

pub use resource::{ExclusiveResource, ResourceID};

use std::sync::{Arc, Weak};

use crate::commands::UndoStore;
use crate::job::{Job, JobBatch, JobError, JobPayload, RunnableJobsInterface};
use crate::strategy::StrokeStrategy;
use schedule::Phase;
use stroke::StrokeCore;

pub struct StrokeMarker;
pub type StrokeID = crate::id::UniqueID<StrokeMarker>;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct ExecutorConfig {
    /// 0 to use the available parallelism.
    pub worker_threads: usize,
}

/// How a stroke ended.
#[derive(Clone, Debug)]
pub enum StrokeOutcome {
    Finished,
    Cancelled,
    /// A job failed and the stroke was cancelled because of it.
    Failed(Arc<JobError>),
}
impl StrokeOutcome {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

pub struct StrokeOptions {
    pub resource: ExclusiveResource,
    /// The level of detail this stroke executes at. Jobs restricted to another one are dropped.
    pub level_of_detail: i32,
    /// Receives the stroke's commands after a clean finish.
    pub undo_store: Option<Arc<dyn UndoStore>>,
}
impl StrokeOptions {
    #[must_use]
    pub fn new(resource: ExclusiveResource) -> Self {
        Self {
            resource,
            level_of_detail: 0,
            undo_store: None,
        }
    }
    #[must_use]
    pub fn level_of_detail(mut self, level_of_detail: i32) -> Self {
        self.level_of_detail = level_of_detail;
        self
    }
    #[must_use]
    pub fn undo_store(mut self, store: Arc<dyn UndoStore>) -> Self {
        self.undo_store = Some(store);
        self
    }
}

pub struct StrokeExecutor {
    pool: pool::WorkerPool,
}
impl StrokeExecutor {
    /// Spawn the worker threads.
    pub fn new(config: ExecutorConfig) -> std::io::Result<Self> {
        let threads = match config.worker_threads {
            0 => std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            n => n,
        };
        Ok(Self {
            pool: pool::WorkerPool::new(threads)?,
        })
    }
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.pool.threads()
    }
    /// Start a stroke. Its init job is queued immediately.
    pub fn start_stroke<S>(&self, strategy: S, options: StrokeOptions) -> StrokeHandle
    where
        S: StrokeStrategy + 'static,
    {
        StrokeHandle {
            core: StrokeCore::start(
                Box::new(strategy),
                options.resource,
                options.level_of_detail,
                options.undo_store,
                self.pool.spawner(),
            ),
        }
    }
}

/// Owner's side of a stroke.
///
/// Must be ended or cancelled. A handle dropped while the stroke is still running cancels it.
pub struct StrokeHandle {
    core: Arc<StrokeCore>,
}
impl StrokeHandle {
    #[must_use]
    pub fn id(&self) -> StrokeID {
        self.core.id
    }
    pub fn add_job(&self, job: Job) {
        self.add_jobs(std::iter::once(job).collect());
    }
    /// Queue a batch. Not allowed after [`Self::end`] or [`Self::cancel`].
    pub fn add_jobs(&self, batch: JobBatch) {
        self.core.add_jobs(batch);
    }
    /// Queue a suspend job. Must be balanced by [`Self::resume`].
    pub fn suspend(&self) {
        self.core.suspend();
    }
    pub fn resume(&self) {
        self.core.resume();
    }
    /// Queue the finish job after everything already queued.
    pub fn end(&self) {
        self.core.end();
    }
    /// Drop pending cancellable jobs and queue the cancel job.
    pub fn cancel(&self) {
        if !self.core.cancel() {
            log::debug!("{}: cancel of a stroke that is already ending", self.core.id);
        }
    }
    /// Block until the stroke's terminal job completes.
    pub fn wait(&self) -> StrokeOutcome {
        self.core.wait()
    }
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.core.phase() == Phase::Done
    }
    /// A jobs interface that submits into this stroke from within its own jobs.
    #[must_use]
    pub fn jobs(&self) -> StrokeJobs {
        StrokeJobs {
            core: Arc::downgrade(&self.core),
        }
    }
}
impl Drop for StrokeHandle {
    fn drop(&mut self) {
        if self.core.phase() == Phase::Running {
            log::warn!(
                "{} ({}) dropped without being ended, cancelling",
                self.core.id,
                self.core.name()
            );
            self.core.cancel();
        }
    }
}

/// What a running job sees of its stroke.
pub struct StrokeContext {
    core: Arc<StrokeCore>,
}
impl StrokeContext {
    #[must_use]
    pub fn stroke_id(&self) -> StrokeID {
        self.core.id
    }
    #[must_use]
    pub fn level_of_detail(&self) -> i32 {
        self.core.level_of_detail
    }
    /// Run a payload right here. Commands are redone and retained by the stroke.
    pub fn execute(&self, payload: JobPayload) -> Result<(), JobError> {
        self.core.execute_payload(payload)
    }
    #[must_use]
    pub fn jobs(&self) -> StrokeJobs {
        StrokeJobs {
            core: Arc::downgrade(&self.core),
        }
    }
}

/// Submits jobs into a stroke from within the stroke's jobs.
///
/// Submitted batches run before anything queued after the submitting job. While the stroke is
/// cancelling, submissions are dropped.
#[derive(Clone)]
pub struct StrokeJobs {
    core: Weak<StrokeCore>,
}
impl RunnableJobsInterface for StrokeJobs {
    fn add_runnable_jobs(&self, batch: JobBatch) {
        if let Some(core) = self.core.upgrade() {
            core.inject_jobs(batch);
        } else {
            log::error!("{} jobs submitted to a dropped stroke", batch.len());
            debug_assert!(false, "jobs submitted to a dropped stroke");
        }
    }
    fn is_attached(&self) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| !matches!(core.phase(), Phase::Terminating | Phase::Done))
    }
}
