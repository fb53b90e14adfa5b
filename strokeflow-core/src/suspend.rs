//! # Suspend/resume coordination
//!
//! Brackets a window of background recompute. The suspend stroke installs a
//! [`ProjectionUpdateFilter`] on the graph, the resume stroke removes it, replays what it caught,
//! and surfaces the result to the UI as one batch.
//!
//! ```text
//! Idle -> Suspended (filter in) -> Resuming (filter out, UI held) -> BatchVisible -> Idle
//! ```
//!
//! Either stroke may be cancelled. Its commands are undone and the epoch advances, so UI uploads
//! already queued emit nothing.

use std::sync::Arc;

use crate::commands::{CommandError, UndoCommand};
use crate::executor::StrokeContext;
use crate::filter::ProjectionUpdateFilter;
use crate::graph::{FilterCookie, ProjectionGraph};
use crate::job::{JobBatch, JobError, RunnableJobsInterface, Sequentiality};
use crate::strategy::{RunnableBasedStrokeStrategy, RunnableHooks, StrategyConfig};
use crate::ui::{HoldPhase, HoldUiUpdatesCommand, UiBatch};

/// State shared by the suspend and resume halves of a window.
pub struct SuspendResumeShared {
    pub graph: Arc<ProjectionGraph>,
    /// The filter this window installed, if it is still in.
    cookie: parking_lot::Mutex<Option<FilterCookie>>,
    pub ui: UiBatch,
}
impl SuspendResumeShared {
    #[must_use]
    pub fn cookie(&self) -> Option<FilterCookie> {
        *self.cookie.lock()
    }
    fn install(&self) -> Result<(), CommandError> {
        let cookie = self
            .graph
            .install_filter(Arc::new(ProjectionUpdateFilter::new()))
            .ok_or(CommandError::MismatchedState)?;
        *self.cookie.lock() = Some(cookie);
        Ok(())
    }
    fn take_filter(&self) -> Result<Arc<ProjectionUpdateFilter>, CommandError> {
        let Some(cookie) = self.cookie.lock().take() else {
            log::error!("no projection filter installed by this window");
            debug_assert!(false, "resume without a matching suspend");
            return Err(CommandError::MismatchedState);
        };
        self.graph
            .remove_filter(cookie)
            .ok_or(CommandError::UnknownResource)
    }
}

/// Installs the window's filter.
pub struct SuspendUpdatesCommand {
    shared: Arc<SuspendResumeShared>,
}
impl SuspendUpdatesCommand {
    #[must_use]
    pub fn new(shared: Arc<SuspendResumeShared>) -> Self {
        Self { shared }
    }
}
impl UndoCommand for SuspendUpdatesCommand {
    fn redo(&mut self) -> Result<(), CommandError> {
        // Uploads of the previous window are still queued, they're about to be out of date.
        if self.shared.ui.started.is_set() {
            let epoch = self.shared.ui.epoch.advance();
            log::trace!("suspend during an open ui batch, epoch now {epoch}");
        }
        self.shared.install()
    }
    fn undo(&mut self) -> Result<(), CommandError> {
        let filter = self.shared.take_filter()?;
        filter.discard();
        Ok(())
    }
    fn name(&self) -> &str {
        "SuspendUpdates"
    }
}

/// Removes the window's filter and replays it.
pub struct ResumeUpdatesCommand {
    shared: Arc<SuspendResumeShared>,
}
impl ResumeUpdatesCommand {
    #[must_use]
    pub fn new(shared: Arc<SuspendResumeShared>) -> Self {
        Self { shared }
    }
}
impl UndoCommand for ResumeUpdatesCommand {
    fn redo(&mut self) -> Result<(), CommandError> {
        let filter = self.shared.take_filter()?;
        let shared = &self.shared;
        let regions = filter.replay(&shared.graph, shared.ui.policy);
        shared.ui.add_pending(regions);
        Ok(())
    }
    fn undo(&mut self) -> Result<(), CommandError> {
        // Back to suspended. What was replayed stays issued, the new filter starts empty.
        self.shared.install()
    }
    fn name(&self) -> &str {
        "ResumeUpdates"
    }
}

pub struct SuspendHooks {
    shared: Arc<SuspendResumeShared>,
}
impl RunnableHooks for SuspendHooks {
    fn init(&self, ctx: &StrokeContext) -> Result<(), JobError> {
        let mut batch = JobBatch::new();
        batch.add_command(
            Sequentiality::Barrier,
            SuspendUpdatesCommand::new(self.shared.clone()),
        );
        ctx.jobs().add_runnable_jobs(batch);
        Ok(())
    }
    fn cancel(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        self.shared.ui.epoch.advance();
        Ok(())
    }
}

pub struct ResumeHooks {
    shared: Arc<SuspendResumeShared>,
}
impl RunnableHooks for ResumeHooks {
    fn init(&self, ctx: &StrokeContext) -> Result<(), JobError> {
        let jobs: Arc<dyn RunnableJobsInterface> = Arc::new(ctx.jobs());
        let ui = &self.shared.ui;
        let mut batch = JobBatch::new();
        batch.add_command(
            Sequentiality::Barrier,
            HoldUiUpdatesCommand::new(HoldPhase::Initializing, ui.clone(), jobs.clone()),
        );
        batch.add_command(
            Sequentiality::Barrier,
            ResumeUpdatesCommand::new(self.shared.clone()),
        );
        batch.add_command(
            Sequentiality::Barrier,
            HoldUiUpdatesCommand::new(HoldPhase::Finalizing, ui.clone(), jobs),
        );
        ctx.jobs().add_runnable_jobs(batch);
        Ok(())
    }
    fn cancel(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        self.shared.ui.epoch.advance();
        Ok(())
    }
}

/// Builds the strategies of suspend/resume windows on one graph.
#[derive(Clone)]
pub struct SuspendResumeCoordinator {
    shared: Arc<SuspendResumeShared>,
}
impl SuspendResumeCoordinator {
    #[must_use]
    pub fn new(graph: Arc<ProjectionGraph>, ui: UiBatch) -> Self {
        Self {
            shared: Arc::new(SuspendResumeShared {
                graph,
                cookie: parking_lot::Mutex::new(None),
                ui,
            }),
        }
    }
    #[must_use]
    pub fn shared(&self) -> &Arc<SuspendResumeShared> {
        &self.shared
    }
    /// Whether a window is open, with its filter installed.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.shared.cookie().is_some()
    }
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.ui.epoch.current()
    }
    #[must_use]
    pub fn suspend_strategy(&self) -> RunnableBasedStrokeStrategy<SuspendHooks> {
        RunnableBasedStrokeStrategy::with_hooks(
            StrategyConfig::new("suspend updates").needs_explicit_cancel(true),
            SuspendHooks {
                shared: self.shared.clone(),
            },
        )
    }
    #[must_use]
    pub fn resume_strategy(&self) -> RunnableBasedStrokeStrategy<ResumeHooks> {
        RunnableBasedStrokeStrategy::with_hooks(
            StrategyConfig::new("resume updates").needs_explicit_cancel(true),
            ResumeHooks {
                shared: self.shared.clone(),
            },
        )
    }
}
