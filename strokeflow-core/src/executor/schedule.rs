//! Per-stroke queue and the admission rules of the four ordering classes.
//!
//! Nothing here touches threads; the stroke locks a `Schedule`, asks it which jobs may start,
//! and reports back when they complete.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::job::{JobError, JobPayload, JobTags, Sequentiality};
use crate::strategy::JobCategory;

use super::StrokeOutcome;

pub(super) struct QueuedJob {
    pub category: JobCategory,
    pub tags: JobTags,
    /// Only `DoStroke` jobs carry a payload.
    pub payload: Option<JobPayload>,
    /// Skip the strategy callback, the category is disabled.
    pub silent: bool,
    /// Submission the job came with. Stamped by the schedule.
    pub batch: u64,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(super) enum Phase {
    /// Accepting jobs from anyone.
    Running,
    /// `end` was called, the finish job is queued.
    Ending,
    /// The cancel job is queued. Pending cancellable jobs were dropped.
    Cancelling,
    /// The terminal job has started. Nothing new is accepted.
    Terminating,
    Done,
}

#[derive(Default, Debug)]
struct Running {
    sequential: usize,
    concurrent: usize,
    uniquely: usize,
    barrier: usize,
}
impl Running {
    fn total(&self) -> usize {
        self.sequential + self.concurrent + self.uniquely + self.barrier
    }
    fn slot(&mut self, sequentiality: Sequentiality) -> &mut usize {
        match sequentiality {
            Sequentiality::Sequential => &mut self.sequential,
            Sequentiality::Concurrent => &mut self.concurrent,
            Sequentiality::UniquelyConcurrent => &mut self.uniquely,
            Sequentiality::Barrier => &mut self.barrier,
        }
    }
}

pub(super) struct Schedule {
    queue: VecDeque<QueuedJob>,
    /// Jobs submitted from within running jobs. Always dispatched before `queue`.
    injected: VecDeque<QueuedJob>,
    running: Running,
    /// Batch of the running jobs, if any run. Jobs of other batches wait for them.
    running_batch: u64,
    next_batch: u64,
    phase: Phase,
    level_of_detail: i32,
    /// A suspend job completed, and no resume has completed since.
    pub suspended: bool,
    /// Tracks requests rather than completions, to catch unbalanced suspend/resume calls.
    pub suspend_requested: bool,
    failure: Option<Arc<JobError>>,
    outcome: Option<StrokeOutcome>,
}
impl Schedule {
    pub fn new(level_of_detail: i32) -> Self {
        Self {
            queue: VecDeque::new(),
            injected: VecDeque::new(),
            running: Running::default(),
            running_batch: 0,
            next_batch: 0,
            phase: Phase::Running,
            level_of_detail,
            suspended: false,
            suspend_requested: false,
            failure: None,
            outcome: None,
        }
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn outcome(&self) -> Option<&StrokeOutcome> {
        self.outcome.as_ref()
    }
    fn stamp(&mut self) -> u64 {
        self.next_batch += 1;
        self.next_batch
    }
    /// Queue a job as a batch of its own.
    pub fn push(&mut self, job: QueuedJob) {
        self.push_batch(std::iter::once(job));
    }
    /// Queue jobs submitted together. They never interleave with other batches.
    pub fn push_batch<I: IntoIterator<Item = QueuedJob>>(&mut self, jobs: I) {
        let batch = self.stamp();
        self.queue.extend(jobs.into_iter().map(|job| QueuedJob { batch, ..job }));
    }
    /// Queue jobs submitted from within a running job, ahead of the regular queue.
    pub fn inject<I: IntoIterator<Item = QueuedJob>>(&mut self, jobs: I) {
        let batch = self.stamp();
        self.injected
            .extend(jobs.into_iter().map(|job| QueuedJob { batch, ..job }));
    }
    /// Queue the finish job.
    pub fn end(&mut self, finish: QueuedJob) {
        debug_assert_eq!(finish.category, JobCategory::Finish);
        self.phase = Phase::Ending;
        self.push(finish);
    }
    /// Drop everything that may be dropped and queue the cancel job.
    ///
    /// Returns false if the stroke is already past the point of cancelling. `from_finish` allows
    /// cancelling out of a failed finish.
    pub fn begin_cancel(&mut self, cancel: QueuedJob, from_finish: bool) -> bool {
        debug_assert_eq!(cancel.category, JobCategory::Cancel);
        match self.phase {
            Phase::Running | Phase::Ending => (),
            Phase::Terminating if from_finish => (),
            _ => return false,
        }
        let keep = |job: &QueuedJob| match job.category {
            JobCategory::Finish | JobCategory::Suspend | JobCategory::Resume => false,
            _ => !job.tags.cancellable,
        };
        let before = self.queue.len() + self.injected.len();
        self.queue.retain(keep);
        self.injected.retain(keep);
        log::trace!(
            "cancel dropped {} pending jobs",
            before - self.queue.len() - self.injected.len()
        );
        self.push(cancel);
        self.phase = Phase::Cancelling;
        true
    }
    /// Remember the first failure, which becomes the stroke's outcome.
    pub fn record_failure(&mut self, error: JobError) {
        if self.failure.is_none() {
            self.failure = Some(Arc::new(error));
        }
    }
    pub fn finish(&mut self, cancelled: bool) {
        self.phase = Phase::Done;
        self.outcome = Some(match (cancelled, self.failure.take()) {
            (_, Some(error)) => StrokeOutcome::Failed(error),
            (true, None) => StrokeOutcome::Cancelled,
            (false, None) => StrokeOutcome::Finished,
        });
    }
    fn can_start(&self, job: &QueuedJob) -> bool {
        let running = &self.running;
        if running.total() != 0 && (job.category.needs_idle() || job.batch != self.running_batch) {
            return false;
        }
        match job.tags.sequentiality {
            Sequentiality::Barrier => running.total() == 0,
            Sequentiality::Sequential | Sequentiality::UniquelyConcurrent => {
                running.sequential == 0 && running.barrier == 0 && running.uniquely == 0
            }
            Sequentiality::Concurrent => running.sequential == 0 && running.barrier == 0,
        }
    }
    /// Pop the next job that may start right now, marking it running.
    /// Jobs restricted to another level of detail are dropped on the way.
    pub fn next_ready(&mut self) -> Option<QueuedJob> {
        loop {
            let from_injected = !self.injected.is_empty();
            let head = if from_injected {
                self.injected.front()
            } else {
                self.queue.front()
            }?;
            if !head.tags.runs_at(self.level_of_detail) {
                log::trace!(
                    "dropping job for lod {:?}, stroke runs at {}",
                    head.tags.lod_override,
                    self.level_of_detail
                );
                let _ = if from_injected {
                    self.injected.pop_front()
                } else {
                    self.queue.pop_front()
                };
                continue;
            }
            if !self.can_start(head) {
                return None;
            }
            let job = if from_injected {
                self.injected.pop_front()
            } else {
                self.queue.pop_front()
            }?;
            *self.running.slot(job.tags.sequentiality) += 1;
            self.running_batch = job.batch;
            if job.category.is_terminal() {
                self.phase = Phase::Terminating;
            }
            return Some(job);
        }
    }
    pub fn job_done(&mut self, sequentiality: Sequentiality) {
        let slot = self.running.slot(sequentiality);
        debug_assert!(*slot > 0, "completed a job that was never started");
        *slot = slot.saturating_sub(1);
    }
    pub fn pending(&self) -> usize {
        self.queue.len() + self.injected.len()
    }
}
