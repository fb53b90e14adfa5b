//! A background recompute window against collaborators that only log.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use strokeflow_core::commands::{CommandError, CommandGroup, UndoCommand, UndoStore};
use strokeflow_core::config::EngineConfig;
use strokeflow_core::executor::{ExclusiveResource, StrokeExecutor, StrokeOptions, StrokeOutcome};
use strokeflow_core::graph::{NodeID, ProjectionGraph, ProjectionSink};
use strokeflow_core::job::{JobBatch, Sequentiality};
use strokeflow_core::rect::Rect;
use strokeflow_core::strategy::{RunnableBasedStrokeStrategy, StrategyConfig};
use strokeflow_core::suspend::SuspendResumeCoordinator;
use strokeflow_core::ui::{UiBatch, UiUpdates};

struct LoggingSink;
impl ProjectionSink for LoggingSink {
    fn refresh_graph(&self, node: NodeID, regions: &[Rect], crop: Rect) {
        log::info!("refresh {node} {regions:?} within {crop:?}");
    }
    fn request_update(&self, node: NodeID, regions: &[Rect], crop: Rect, reset: bool) {
        log::info!("update {node} {regions:?} within {crop:?} (reset: {reset})");
    }
    fn request_update_no_filthy(&self, node: NodeID, regions: &[Rect], crop: Rect) {
        log::info!("update {node} {regions:?} within {crop:?} (no filthy)");
    }
}

/// Pretends to be a canvas widget: remembers what changed while it wasn't listening.
#[derive(Default)]
struct LoggingUi {
    disabled: AtomicBool,
    missed: parking_lot::Mutex<Vec<Rect>>,
    patches: AtomicUsize,
}
impl LoggingUi {
    fn changed(&self, region: Rect) {
        if self.disabled.load(Ordering::Acquire) {
            self.missed.lock().push(region);
        }
    }
}
impl UiUpdates for LoggingUi {
    fn disable_updates(&self) {
        log::info!("ui: updates held");
        self.disabled.store(true, Ordering::Release);
    }
    fn enable_updates(&self) -> Vec<Rect> {
        self.disabled.store(false, Ordering::Release);
        let missed = std::mem::take(&mut *self.missed.lock());
        log::info!("ui: updates released, {} regions missed", missed.len());
        missed
    }
    fn notify_region_ready(&self, region: Rect) {
        self.patches.fetch_add(1, Ordering::Relaxed);
        log::info!("ui: {region:?} ready");
    }
    fn notify_batch_started(&self) {
        log::info!("ui: batch started");
    }
    fn notify_batch_ended(&self) {
        log::info!("ui: batch ended");
    }
}

#[derive(Default)]
struct LoggingUndoStore;
impl UndoStore for LoggingUndoStore {
    fn push(&self, command: CommandGroup) {
        log::info!("undo history += {command:?}");
    }
}

/// Stand-in for a recompute step: bumps a shared counter, and tells the graph what it touched.
struct Recompute {
    graph: Arc<ProjectionGraph>,
    ui: Arc<LoggingUi>,
    node: NodeID,
    tile: Rect,
    crop: Rect,
    applied: Arc<AtomicUsize>,
}
impl UndoCommand for Recompute {
    fn redo(&mut self) -> Result<(), CommandError> {
        self.applied.fetch_add(1, Ordering::AcqRel);
        self.ui.changed(self.tile);
        self.graph
            .request_update(self.node, &[self.tile], self.crop, false);
        Ok(())
    }
    fn undo(&mut self) -> Result<(), CommandError> {
        self.applied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map_err(|_| CommandError::MismatchedState)?;
        self.graph
            .request_update(self.node, &[self.tile], self.crop, false);
        Ok(())
    }
    fn name(&self) -> &str {
        "Recompute"
    }
}

fn expect_finished(what: &str, outcome: StrokeOutcome) -> anyhow::Result<()> {
    match outcome {
        StrokeOutcome::Finished => Ok(()),
        StrokeOutcome::Cancelled => anyhow::bail!("{what} stroke was cancelled"),
        StrokeOutcome::Failed(e) => anyhow::bail!("{what} stroke failed: {e}"),
    }
}

/// Suspend projection updates, recompute a row of tiles in the background, then resume.
pub fn run(config: &EngineConfig) -> anyhow::Result<()> {
    let executor = StrokeExecutor::new(config.executor())?;
    log::info!("{} stroke workers", executor.worker_threads());

    let ui = Arc::new(LoggingUi::default());
    let graph = Arc::new(ProjectionGraph::new(Arc::new(LoggingSink)));
    let bounds = config.canvas_bounds();
    let coordinator = SuspendResumeCoordinator::new(
        graph.clone(),
        UiBatch::new(ui.clone(), bounds, config.grid_policy()),
    );
    let resource = ExclusiveResource::new();

    let suspend = executor.start_stroke(
        coordinator.suspend_strategy(),
        StrokeOptions::new(resource.clone()),
    );
    suspend.end();
    expect_finished("suspend", suspend.wait())?;

    let node = NodeID::default();
    let applied = Arc::new(AtomicUsize::new(0));
    let recompute = executor.start_stroke(
        RunnableBasedStrokeStrategy::new(StrategyConfig::new("recompute")),
        StrokeOptions::new(resource.clone()).undo_store(Arc::new(LoggingUndoStore)),
    );
    let mut batch = JobBatch::new();
    let tile_size = config.grid_policy().cell_size;
    for idx in 0..8 {
        // Overlapping tiles, the filter coalesces them.
        let tile = Rect::new(idx * tile_size / 2, 0, tile_size, tile_size);
        batch.add_command(
            Sequentiality::Concurrent,
            Recompute {
                graph: graph.clone(),
                ui: ui.clone(),
                node,
                tile,
                crop: bounds,
                applied: applied.clone(),
            },
        );
    }
    recompute.add_jobs(batch);
    recompute.end();
    expect_finished("recompute", recompute.wait())?;

    let resume = executor.start_stroke(coordinator.resume_strategy(), StrokeOptions::new(resource));
    resume.end();
    expect_finished("resume", resume.wait())?;

    log::info!(
        "recomputed {} tiles, surfaced as {} patches (epoch {})",
        applied.load(Ordering::Acquire),
        ui.patches.load(Ordering::Relaxed),
        coordinator.epoch()
    );
    Ok(())
}
