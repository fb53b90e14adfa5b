//! # UI visibility gate
//!
//! Withholds "projection updated" signals while a batch of background work settles, then
//! surfaces everything that accumulated as one batch of bounded patches.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::commands::{CommandError, UndoCommand};
use crate::job::{ImmediateJobs, JobBatch, RunnableJobsInterface};
use crate::rect::{GridPolicy, Rect};

/// Whoever shows projections to the user.
pub trait UiUpdates: Send + Sync {
    fn disable_updates(&self);
    /// Re-enable signals, returning the regions that changed while they were disabled.
    fn enable_updates(&self) -> Vec<Rect>;
    fn notify_region_ready(&self, region: Rect);
    fn notify_batch_started(&self);
    fn notify_batch_ended(&self);
}

/// Shared "a batch is open" flag, read and flipped by jobs queued at different times.
#[derive(Clone, Default, Debug)]
pub struct BatchUpdateFlag(Arc<AtomicBool>);
impl BatchUpdateFlag {
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
    /// Set the flag, returning the previous value.
    pub fn set(&self) -> bool {
        self.0.swap(true, Ordering::AcqRel)
    }
    /// Clear the flag, returning the previous value.
    pub fn clear(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Advanced whenever pending UI uploads become stale.
#[derive(Clone, Default, Debug)]
pub struct UpdatesEpoch(Arc<AtomicU64>);
impl UpdatesEpoch {
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
    /// Invalidate every upload issued so far. Returns the new epoch.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Everything the two halves of the gate share.
#[derive(Clone)]
pub struct UiBatch {
    pub ui: Arc<dyn UiUpdates>,
    pub started: BatchUpdateFlag,
    pub epoch: UpdatesEpoch,
    /// Regions to surface at the next part B, besides the ones the UI accumulated itself.
    pub pending: Arc<parking_lot::Mutex<Vec<Rect>>>,
    pub bounds: Rect,
    pub policy: GridPolicy,
}
impl UiBatch {
    #[must_use]
    pub fn new(ui: Arc<dyn UiUpdates>, bounds: Rect, policy: GridPolicy) -> Self {
        Self {
            ui,
            started: BatchUpdateFlag::default(),
            epoch: UpdatesEpoch::default(),
            pending: Arc::default(),
            bounds,
            policy,
        }
    }
    /// Queue regions for the next part B.
    pub fn add_pending<I: IntoIterator<Item = Rect>>(&self, regions: I) {
        self.pending.lock().extend(regions);
    }
    /// Part A. Close any open batch, then withhold signals.
    pub fn hold(&self) {
        if self.started.clear() {
            self.ui.notify_batch_ended();
        }
        self.ui.disable_updates();
    }
    /// Part B. Re-enable signals and schedule the accumulated regions as a batch of uploads.
    ///
    /// Every upload job, and the trailing barrier that closes the batch, is a no-op if the epoch
    /// has moved by the time it runs. A batch still open is closed first, and its uploads go stale.
    pub fn release(&self, jobs: &dyn RunnableJobsInterface) {
        let mut regions = self.ui.enable_updates();
        regions.append(&mut self.pending.lock());
        let patches = self.policy.patches(regions, self.bounds);

        if self.started.clear() {
            let epoch = self.epoch.advance();
            log::debug!("ui batch replaced while open, epoch now {epoch}");
            self.ui.notify_batch_ended();
        }
        self.started.set();
        self.ui.notify_batch_started();
        let epoch = self.epoch.current();
        log::trace!("ui batch of {} patches at epoch {epoch}", patches.len());

        let mut batch = JobBatch::new();
        for patch in patches {
            let this = self.clone();
            batch.add_concurrent(move || {
                if this.epoch.current() == epoch {
                    this.ui.notify_region_ready(patch);
                }
                Ok(())
            });
        }
        let this = self.clone();
        batch.add_barrier(move || {
            if this.epoch.current() == epoch && this.started.clear() {
                this.ui.notify_batch_ended();
            }
            Ok(())
        });
        jobs.add_runnable_jobs(batch);
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, strum::AsRefStr)]
pub enum HoldPhase {
    /// Part A on redo.
    Initializing,
    /// Part B on redo.
    Finalizing,
}

/// One half of the gate as a reversible command.
pub struct HoldUiUpdatesCommand {
    phase: HoldPhase,
    batch: UiBatch,
    jobs: Arc<dyn RunnableJobsInterface>,
}
impl HoldUiUpdatesCommand {
    #[must_use]
    pub fn new(phase: HoldPhase, batch: UiBatch, jobs: Arc<dyn RunnableJobsInterface>) -> Self {
        Self { phase, batch, jobs }
    }
}
impl UndoCommand for HoldUiUpdatesCommand {
    fn redo(&mut self) -> Result<(), CommandError> {
        match self.phase {
            HoldPhase::Initializing => self.batch.hold(),
            HoldPhase::Finalizing if self.jobs.is_attached() => self.batch.release(&*self.jobs),
            HoldPhase::Finalizing => {
                // Redone from history, long after its stroke. Upload right here.
                log::debug!("ui batch released without a stroke, uploading inline");
                self.batch.release(&ImmediateJobs);
            }
        }
        Ok(())
    }
    fn undo(&mut self) -> Result<(), CommandError> {
        match self.phase {
            HoldPhase::Initializing => {
                // Re-enable without surfacing anything, keeping what accumulated for later.
                let regions = self.batch.ui.enable_updates();
                self.batch.add_pending(regions);
                // Undoing part B re-opened it.
                if self.batch.started.clear() {
                    self.batch.ui.notify_batch_ended();
                }
            }
            HoldPhase::Finalizing => {
                self.batch.ui.disable_updates();
                if !self.batch.started.set() {
                    self.batch.ui.notify_batch_started();
                }
            }
        }
        Ok(())
    }
    fn name(&self) -> &str {
        match self.phase {
            HoldPhase::Initializing => "HoldUiUpdates(Initializing)",
            HoldPhase::Finalizing => "HoldUiUpdates(Finalizing)",
        }
    }
}
