//! # Jobs
//!
//! A job is the smallest schedulable unit of a stroke: a payload, tagged with how it may be ordered
//! against its siblings ([`Sequentiality`]) and whether it needs the stroke's resource to itself
//! ([`Exclusivity`]).

use crate::commands::{CommandError, UndoCommand};

/// Ordering class of a job, relative to the other jobs of its stroke.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum Sequentiality {
    /// Runs alone w.r.t. other sequential-ish jobs, in submission order. Later jobs wait for it.
    Sequential,
    /// Runs in parallel with other concurrent jobs.
    Concurrent,
    /// Waits for every earlier job to complete, and every later job waits for it.
    Barrier,
    /// Concurrent, except never alongside another uniquely concurrent job.
    UniquelyConcurrent,
}
/// Whether a job shares the stroke's resource with other jobs.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, strum::AsRefStr)]
pub enum Exclusivity {
    #[default]
    Normal,
    /// No other job touching the same resource runs at the same time, in any stroke.
    Exclusive,
}

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error("job panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Command(#[from] CommandError),
}
impl JobError {
    /// Convenience for `JobError::Failed(reason.to_string())`.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }
}

pub type RunnableFn = Box<dyn FnOnce() -> Result<(), JobError> + Send>;

/// What a job does when it runs.
pub enum JobPayload {
    /// An arbitrary closure.
    Runnable(RunnableFn),
    /// A reversible command. The stroke retains it after `redo`, see [`crate::commands`].
    Command(Box<dyn UndoCommand>),
    /// Several payloads, executed in order within one job.
    Composite(Vec<JobPayload>),
}
impl JobPayload {
    pub fn runnable<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        Self::Runnable(Box::new(f))
    }
    pub fn command<C: UndoCommand + 'static>(command: C) -> Self {
        Self::Command(Box::new(command))
    }
    /// Run outside of any stroke. Commands are redone but not retained.
    pub fn run_detached(self) -> Result<(), JobError> {
        match self {
            Self::Runnable(f) => f(),
            Self::Command(mut command) => command.redo().map_err(Into::into),
            Self::Composite(payloads) => payloads.into_iter().try_for_each(Self::run_detached),
        }
    }
}
impl std::fmt::Debug for JobPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Runnable(_) => f.write_str("Runnable"),
            Self::Command(command) => write!(f, "Command({})", command.name()),
            Self::Composite(payloads) => f.debug_tuple("Composite").field(payloads).finish(),
        }
    }
}

/// Scheduling attributes of a job.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct JobTags {
    pub sequentiality: Sequentiality,
    pub exclusivity: Exclusivity,
    /// If some, the job only runs when its stroke executes at this level of detail,
    /// and is silently dropped otherwise.
    pub lod_override: Option<i32>,
    /// Cancellable jobs that haven't started are dropped when the stroke is cancelled.
    pub cancellable: bool,
}
impl JobTags {
    #[must_use]
    pub fn new(sequentiality: Sequentiality, exclusivity: Exclusivity) -> Self {
        Self {
            sequentiality,
            exclusivity,
            lod_override: None,
            cancellable: true,
        }
    }
    /// Whether this job is allowed at all in a stroke running at `level_of_detail`.
    #[must_use]
    pub fn runs_at(&self, level_of_detail: i32) -> bool {
        self.lod_override.map_or(true, |lod| lod == level_of_detail)
    }
}

#[derive(Debug)]
pub struct Job {
    pub tags: JobTags,
    pub payload: JobPayload,
}
impl Job {
    #[must_use]
    pub fn new(sequentiality: Sequentiality, payload: JobPayload) -> Self {
        Self {
            tags: JobTags::new(sequentiality, Exclusivity::Normal),
            payload,
        }
    }
    /// Restrict this job to strokes executing at `lod`.
    pub fn with_lod(&mut self, lod: i32) -> &mut Self {
        self.tags.lod_override = Some(lod);
        self
    }
    pub fn exclusive(&mut self) -> &mut Self {
        self.tags.exclusivity = Exclusivity::Exclusive;
        self
    }
    pub fn non_cancellable(&mut self) -> &mut Self {
        self.tags.cancellable = false;
        self
    }
}

/// An ordered list of jobs submitted together.
///
/// Batches never interleave with each other, jobs within a batch are ordered only by their own
/// [`Sequentiality`].
#[derive(Debug, Default)]
pub struct JobBatch {
    jobs: Vec<Job>,
}
impl JobBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, job: Job) -> &mut Job {
        self.jobs.push(job);
        // Just pushed.
        let last = self.jobs.len() - 1;
        &mut self.jobs[last]
    }
    pub fn add<F>(&mut self, sequentiality: Sequentiality, f: F) -> &mut Job
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        self.push(Job::new(sequentiality, JobPayload::runnable(f)))
    }
    pub fn add_sequential<F>(&mut self, f: F) -> &mut Job
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        self.add(Sequentiality::Sequential, f)
    }
    pub fn add_concurrent<F>(&mut self, f: F) -> &mut Job
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        self.add(Sequentiality::Concurrent, f)
    }
    pub fn add_barrier<F>(&mut self, f: F) -> &mut Job
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        self.add(Sequentiality::Barrier, f)
    }
    pub fn add_uniquely_concurrent<F>(&mut self, f: F) -> &mut Job
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        self.add(Sequentiality::UniquelyConcurrent, f)
    }
    /// Add a reversible command as a job of the given ordering class.
    pub fn add_command<C>(&mut self, sequentiality: Sequentiality, command: C) -> &mut Job
    where
        C: UndoCommand + 'static,
    {
        self.push(Job::new(sequentiality, JobPayload::command(command)))
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Job> + '_ {
        self.jobs.iter()
    }
}
impl IntoIterator for JobBatch {
    type Item = Job;
    type IntoIter = std::vec::IntoIter<Job>;
    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}
impl FromIterator<Job> for JobBatch {
    fn from_iter<T: IntoIterator<Item = Job>>(iter: T) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}

/// Lets code running inside a job schedule more jobs for later in the same stroke.
pub trait RunnableJobsInterface: Send + Sync {
    fn add_runnable_jobs(&self, batch: JobBatch);
    /// Whether submitted jobs will still run. False once the stroke behind it has ended.
    fn is_attached(&self) -> bool {
        true
    }
}

/// Runs submitted jobs right away on the calling thread, in submission order.
///
/// For work that outlived its stroke. Tags are ignored, and a failed job is logged without
/// stopping the rest.
#[derive(Copy, Clone, Debug, Default)]
pub struct ImmediateJobs;
impl RunnableJobsInterface for ImmediateJobs {
    fn add_runnable_jobs(&self, batch: JobBatch) {
        for job in batch {
            if let Err(e) = job.payload.run_detached() {
                log::error!("detached job failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{
        Exclusivity, ImmediateJobs, JobBatch, JobError, JobPayload, RunnableJobsInterface,
        Sequentiality,
    };

    #[test]
    fn builders_tag_jobs() {
        let mut batch = JobBatch::new();
        batch.add_sequential(|| Ok(()));
        batch.add_concurrent(|| Ok(())).with_lod(1);
        batch.add_barrier(|| Ok(())).exclusive().non_cancellable();
        batch.add_uniquely_concurrent(|| Ok(()));

        let tags: Vec<_> = batch.iter().map(|job| job.tags).collect();
        assert_eq!(tags[0].sequentiality, Sequentiality::Sequential);
        assert_eq!(tags[1].sequentiality, Sequentiality::Concurrent);
        assert_eq!(tags[1].lod_override, Some(1));
        assert!(tags[1].runs_at(1));
        assert!(!tags[1].runs_at(0));
        assert_eq!(tags[2].sequentiality, Sequentiality::Barrier);
        assert_eq!(tags[2].exclusivity, Exclusivity::Exclusive);
        assert!(!tags[2].cancellable);
        assert_eq!(tags[3].sequentiality, Sequentiality::UniquelyConcurrent);
        assert!(tags[3].runs_at(7));
    }
    #[test]
    fn immediate_jobs_run_in_order_past_failures() {
        let ran = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut batch = JobBatch::new();
        for idx in 0..3 {
            let ran = ran.clone();
            batch.add_barrier(move || {
                ran.lock().push(idx);
                if idx == 1 {
                    Err(JobError::failed("tile lost"))
                } else {
                    Ok(())
                }
            });
        }
        assert!(ImmediateJobs.is_attached());
        ImmediateJobs.add_runnable_jobs(batch);
        assert_eq!(*ran.lock(), [0, 1, 2]);
    }
    #[test]
    fn payload_debug_is_readable() {
        let payload = JobPayload::Composite(vec![JobPayload::runnable(|| Ok(()))]);
        assert_eq!(format!("{payload:?}"), "Composite([Runnable])");
    }
}
