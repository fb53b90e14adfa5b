//! Shared state of one running stroke, and the job lifecycle on the workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::pool::Spawner;
use super::resource::ExclusiveResource;
use super::schedule::{Phase, QueuedJob, Schedule};
use super::{StrokeContext, StrokeID, StrokeOutcome};
use crate::commands::retained::CommandLog;
use crate::commands::UndoStore;
use crate::job::{Exclusivity, JobBatch, JobError, JobPayload, JobTags, Sequentiality};
use crate::strategy::{JobCategory, StrokeStrategy};

pub(super) struct StrokeCore {
    pub id: StrokeID,
    strategy: Box<dyn StrokeStrategy>,
    resource: ExclusiveResource,
    pub level_of_detail: i32,
    undo_store: Option<Arc<dyn UndoStore>>,
    spawner: Spawner,
    schedule: parking_lot::Mutex<Schedule>,
    done: parking_lot::Condvar,
    commands: parking_lot::Mutex<CommandLog>,
    /// Next command redo sequence number.
    redo_seq: AtomicU64,
}
impl StrokeCore {
    pub fn start(
        strategy: Box<dyn StrokeStrategy>,
        resource: ExclusiveResource,
        level_of_detail: i32,
        undo_store: Option<Arc<dyn UndoStore>>,
        spawner: Spawner,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            id: StrokeID::default(),
            strategy,
            resource,
            level_of_detail,
            undo_store,
            spawner,
            schedule: parking_lot::Mutex::new(Schedule::new(level_of_detail)),
            done: parking_lot::Condvar::new(),
            commands: parking_lot::Mutex::new(CommandLog::new()),
            redo_seq: AtomicU64::new(0),
        });
        log::debug!(
            "{} ({}) started on {:?} at lod {level_of_detail}",
            this.id,
            this.name(),
            this.resource,
        );
        this.schedule.lock().push(this.category_job(JobCategory::Init));
        this.pump();
        this
    }
    pub fn name(&self) -> &'static str {
        self.strategy.config().name
    }
    fn category_job(&self, category: JobCategory) -> QueuedJob {
        let config = self.strategy.config();
        let (tags, enabled) = config.category(category).map_or_else(
            // Only DoStroke has no fixed config, and it's never built here.
            || (JobTags::new(Sequentiality::Sequential, Exclusivity::Normal), true),
            |category| (category.tags(), category.enabled),
        );
        QueuedJob {
            category,
            tags,
            payload: None,
            silent: !enabled,
            batch: 0,
        }
    }
    fn stroke_job(tags: JobTags, payload: JobPayload) -> QueuedJob {
        QueuedJob {
            category: JobCategory::DoStroke,
            tags,
            payload: Some(payload),
            silent: false,
            batch: 0,
        }
    }
    /// Jobs from outside of the stroke.
    pub fn add_jobs(self: &Arc<Self>, batch: JobBatch) {
        {
            let mut schedule = self.schedule.lock();
            if schedule.phase() != Phase::Running {
                log::error!(
                    "{}: {} jobs added after end or cancel, ignoring",
                    self.id,
                    batch.len()
                );
                debug_assert!(false, "jobs added to an ended stroke");
                return;
            }
            schedule.push_batch(
                batch
                    .into_iter()
                    .map(|job| Self::stroke_job(job.tags, job.payload)),
            );
            log::trace!("{}: {} jobs pending", self.id, schedule.pending());
        }
        self.pump();
    }
    /// Jobs from inside of the stroke's own jobs.
    pub fn inject_jobs(self: &Arc<Self>, batch: JobBatch) {
        {
            let mut schedule = self.schedule.lock();
            match schedule.phase() {
                Phase::Running | Phase::Ending => (),
                Phase::Cancelling => {
                    log::debug!(
                        "{}: dropping {} jobs submitted while cancelling",
                        self.id,
                        batch.len()
                    );
                    return;
                }
                Phase::Terminating | Phase::Done => {
                    log::error!(
                        "{}: {} jobs submitted after the stroke ended, ignoring",
                        self.id,
                        batch.len()
                    );
                    debug_assert!(false, "jobs submitted to a finished stroke");
                    return;
                }
            }
            schedule.inject(
                batch
                    .into_iter()
                    .map(|job| Self::stroke_job(job.tags, job.payload)),
            );
        }
        self.pump();
    }
    pub fn suspend(self: &Arc<Self>) {
        {
            let mut schedule = self.schedule.lock();
            if schedule.phase() != Phase::Running || schedule.suspend_requested {
                log::error!("{}: suspend of a stroke that can't be suspended", self.id);
                debug_assert!(false, "unbalanced suspend");
                return;
            }
            schedule.suspend_requested = true;
            schedule.push(self.category_job(JobCategory::Suspend));
        }
        self.pump();
    }
    pub fn resume(self: &Arc<Self>) {
        {
            let mut schedule = self.schedule.lock();
            if schedule.phase() != Phase::Running || !schedule.suspend_requested {
                log::error!("{}: resume of a stroke that isn't suspended", self.id);
                debug_assert!(false, "unbalanced resume");
                return;
            }
            schedule.suspend_requested = false;
            schedule.push(self.category_job(JobCategory::Resume));
        }
        self.pump();
    }
    pub fn end(self: &Arc<Self>) {
        {
            let mut schedule = self.schedule.lock();
            if schedule.phase() != Phase::Running {
                log::error!("{}: end of a stroke that is already ending", self.id);
                debug_assert!(false, "stroke ended twice");
                return;
            }
            if schedule.suspend_requested {
                // Finishing would drop the rewound commands, bring them back first.
                log::warn!("{}: ended while suspended, resuming first", self.id);
                schedule.suspend_requested = false;
                schedule.push(self.category_job(JobCategory::Resume));
            }
            log::debug!("{}: ending", self.id);
            schedule.end(self.category_job(JobCategory::Finish));
        }
        self.pump();
    }
    /// Returns false if the stroke was already on its way out.
    pub fn cancel(self: &Arc<Self>) -> bool {
        let accepted = self
            .schedule
            .lock()
            .begin_cancel(self.category_job(JobCategory::Cancel), false);
        if accepted {
            log::debug!("{}: cancelling", self.id);
            self.pump();
        }
        accepted
    }
    pub fn phase(&self) -> Phase {
        self.schedule.lock().phase()
    }
    pub fn wait(&self) -> StrokeOutcome {
        let mut schedule = self.schedule.lock();
        loop {
            if let Some(outcome) = schedule.outcome() {
                return outcome.clone();
            }
            self.done.wait(&mut schedule);
        }
    }
    /// Start every job that may start.
    fn pump(self: &Arc<Self>) {
        let mut ready = smallvec::SmallVec::<[QueuedJob; 4]>::new();
        {
            let mut schedule = self.schedule.lock();
            while let Some(job) = schedule.next_ready() {
                ready.push(job);
            }
        }
        for job in ready {
            log::trace!(
                "{}: starting {} job ({})",
                self.id,
                job.category.as_ref(),
                job.tags.sequentiality.as_ref()
            );
            let this = self.clone();
            self.spawner.spawn(Box::new(move || this.run(job)));
        }
    }
    /// Worker side of a job.
    fn run(self: Arc<Self>, job: QueuedJob) {
        let category = job.category;
        let tags = job.tags;
        let execute = || {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.execute(job)))
                .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(&*panic))))
        };
        let result = match tags.exclusivity {
            Exclusivity::Normal => {
                let _shared = self.resource.shared();
                execute()
            }
            Exclusivity::Exclusive => {
                let _exclusive = self.resource.exclusive();
                execute()
            }
        };
        self.complete(category, tags, result);
    }
    fn execute(self: &Arc<Self>, job: QueuedJob) -> Result<(), JobError> {
        let ctx = StrokeContext { core: self.clone() };
        let strategy = &*self.strategy;
        match job.category {
            JobCategory::Init if job.silent => Ok(()),
            JobCategory::Init => strategy.init_stroke_callback(&ctx),
            JobCategory::DoStroke => match job.payload {
                Some(payload) => strategy.do_stroke_callback(payload, &ctx),
                None => Ok(()),
            },
            JobCategory::Suspend => {
                if !job.silent {
                    strategy.suspend_stroke_callback(&ctx)?;
                }
                let mut commands = self.commands.lock();
                log::trace!("{}: rewinding {} commands", self.id, commands.live_len());
                commands.rewind();
                Ok(())
            }
            JobCategory::Resume => {
                if !job.silent {
                    strategy.resume_stroke_callback(&ctx)?;
                }
                let rewound = self.commands.lock().take_rewound();
                if rewound.is_empty() {
                    return Ok(());
                }
                let mut schedule = self.schedule.lock();
                if schedule.phase() == Phase::Cancelling {
                    // Already undone, and the cancel won't see them again.
                    log::debug!(
                        "{}: dropping {} rewound commands, cancelling",
                        self.id,
                        rewound.len()
                    );
                    return Ok(());
                }
                log::trace!("{}: redoing {} commands", self.id, rewound.len());
                let tags = JobTags::new(Sequentiality::Sequential, Exclusivity::Normal);
                schedule.inject(
                    rewound
                        .into_iter()
                        .map(|command| Self::stroke_job(tags, JobPayload::Command(command))),
                );
                Ok(())
            }
            JobCategory::Cancel => {
                let quiet = self.schedule.lock().suspended && !strategy.config().needs_explicit_cancel;
                let result = if job.silent || quiet {
                    Ok(())
                } else {
                    strategy.cancel_stroke_callback(&ctx)
                };
                let undone = self.commands.lock().undo_all();
                log::trace!("{}: undid {undone} commands", self.id);
                result
            }
            JobCategory::Finish => {
                if !job.silent {
                    strategy.finish_stroke_callback(&ctx)?;
                }
                let group = self.commands.lock().take_group();
                match &self.undo_store {
                    Some(store) if !group.is_empty() => {
                        log::trace!("{}: {} commands to undo history", self.id, group.len());
                        store.push(group);
                    }
                    _ => (),
                }
                Ok(())
            }
        }
    }
    /// Run a payload on the current worker, retaining any command it carries.
    pub fn execute_payload(&self, payload: JobPayload) -> Result<(), JobError> {
        match payload {
            JobPayload::Runnable(f) => f(),
            JobPayload::Command(mut command) => {
                let seq = self.redo_seq.fetch_add(1, Ordering::Relaxed);
                command.redo()?;
                self.commands.lock().record(seq, command);
                Ok(())
            }
            JobPayload::Composite(payloads) => payloads
                .into_iter()
                .try_for_each(|payload| self.execute_payload(payload)),
        }
    }
    fn complete(self: &Arc<Self>, category: JobCategory, tags: JobTags, result: Result<(), JobError>) {
        let mut finished = false;
        {
            let mut schedule = self.schedule.lock();
            schedule.job_done(tags.sequentiality);
            match (category, result) {
                (JobCategory::Suspend, Ok(())) => schedule.suspended = true,
                (JobCategory::Resume, Ok(())) => schedule.suspended = false,
                (JobCategory::Cancel, result) => {
                    if let Err(e) = result {
                        log::error!("{}: cancel failed: {e}", self.id);
                        schedule.record_failure(e);
                    }
                    schedule.finish(true);
                    finished = true;
                }
                (JobCategory::Finish, Ok(())) => {
                    schedule.finish(false);
                    finished = true;
                }
                (category, Err(e)) => {
                    log::error!("{}: {} job failed: {e}", self.id, category.as_ref());
                    schedule.record_failure(e);
                    let cancel = self.category_job(JobCategory::Cancel);
                    schedule.begin_cancel(cancel, category == JobCategory::Finish);
                }
                _ => (),
            }
        }
        if finished {
            log::debug!("{} ({}) done", self.id, self.name());
            self.done.notify_all();
        } else {
            self.pump();
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
