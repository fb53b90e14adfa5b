//! Fakes shared by the unit tests.

use std::sync::Arc;

use crate::commands::{CommandError, CommandGroup, UndoCommand, UndoStore};
use crate::graph::{NodeID, ProjectionSink};
use crate::job::{JobBatch, JobError, RunnableJobsInterface, Sequentiality};
use crate::rect::Rect;
use crate::ui::UiUpdates;

pub type Trace = Arc<parking_lot::Mutex<Vec<String>>>;

pub fn trace() -> Trace {
    Trace::default()
}
pub fn push(trace: &Trace, event: impl Into<String>) {
    trace.lock().push(event.into());
}
/// Position of `event` in the trace. Panics if absent.
pub fn position(trace: &Trace, event: &str) -> usize {
    let trace = trace.lock();
    trace
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{event:?} not in {trace:?}"))
}

/// Logs its redo and undo calls.
pub struct Traced {
    pub name: &'static str,
    pub trace: Trace,
}
impl Traced {
    pub fn new(name: &'static str, trace: &Trace) -> Self {
        Self {
            name,
            trace: trace.clone(),
        }
    }
}
impl UndoCommand for Traced {
    fn redo(&mut self) -> Result<(), CommandError> {
        push(&self.trace, format!("redo {}", self.name));
        Ok(())
    }
    fn undo(&mut self) -> Result<(), CommandError> {
        push(&self.trace, format!("undo {}", self.name));
        Ok(())
    }
    fn name(&self) -> &str {
        self.name
    }
}

#[derive(Default)]
pub struct RecordingUndoStore {
    pub groups: parking_lot::Mutex<Vec<CommandGroup>>,
}
impl UndoStore for RecordingUndoStore {
    fn push(&self, command: CommandGroup) {
        self.groups.lock().push(command);
    }
}

/// Collects submitted batches without running them.
#[derive(Default)]
pub struct RecordingJobs {
    batches: parking_lot::Mutex<Vec<JobBatch>>,
}
impl RecordingJobs {
    pub fn take(&self) -> Vec<JobBatch> {
        std::mem::take(&mut *self.batches.lock())
    }
    /// Run every pending batch on this thread in submission order, including batches submitted
    /// while running. Returns the ordering classes of the jobs that ran.
    pub fn run_all(&self) -> Result<Vec<Sequentiality>, JobError> {
        let mut ran = Vec::new();
        loop {
            let batches = self.take();
            if batches.is_empty() {
                return Ok(ran);
            }
            for job in batches.into_iter().flatten() {
                ran.push(job.tags.sequentiality);
                job.payload.run_detached()?;
            }
        }
    }
}
impl RunnableJobsInterface for RecordingJobs {
    fn add_runnable_jobs(&self, batch: JobBatch) {
        self.batches.lock().push(batch);
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SinkCall {
    Refresh {
        node: NodeID,
        regions: Vec<Rect>,
        crop: Rect,
    },
    Update {
        node: NodeID,
        regions: Vec<Rect>,
        crop: Rect,
        reset: bool,
    },
    NoFilthy {
        node: NodeID,
        regions: Vec<Rect>,
        crop: Rect,
    },
}

#[derive(Default)]
pub struct RecordingSink {
    pub calls: parking_lot::Mutex<Vec<SinkCall>>,
}
impl RecordingSink {
    pub fn take(&self) -> Vec<SinkCall> {
        std::mem::take(&mut *self.calls.lock())
    }
}
impl ProjectionSink for RecordingSink {
    fn refresh_graph(&self, node: NodeID, regions: &[Rect], crop: Rect) {
        self.calls.lock().push(SinkCall::Refresh {
            node,
            regions: regions.to_vec(),
            crop,
        });
    }
    fn request_update(&self, node: NodeID, regions: &[Rect], crop: Rect, reset: bool) {
        self.calls.lock().push(SinkCall::Update {
            node,
            regions: regions.to_vec(),
            crop,
            reset,
        });
    }
    fn request_update_no_filthy(&self, node: NodeID, regions: &[Rect], crop: Rect) {
        self.calls.lock().push(SinkCall::NoFilthy {
            node,
            regions: regions.to_vec(),
            crop,
        });
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum UiCall {
    Disable,
    Enable,
    Ready(Rect),
    BatchStarted,
    BatchEnded,
}

/// Records notifications. `enable_updates` hands back whatever was queued with [`Self::hold`].
#[derive(Default)]
pub struct RecordingUi {
    pub calls: parking_lot::Mutex<Vec<UiCall>>,
    held: parking_lot::Mutex<Vec<Rect>>,
}
impl RecordingUi {
    pub fn take(&self) -> Vec<UiCall> {
        std::mem::take(&mut *self.calls.lock())
    }
    /// Regions that became dirty while updates were disabled.
    pub fn hold(&self, region: Rect) {
        self.held.lock().push(region);
    }
}
impl UiUpdates for RecordingUi {
    fn disable_updates(&self) {
        self.calls.lock().push(UiCall::Disable);
    }
    fn enable_updates(&self) -> Vec<Rect> {
        self.calls.lock().push(UiCall::Enable);
        std::mem::take(&mut *self.held.lock())
    }
    fn notify_region_ready(&self, region: Rect) {
        self.calls.lock().push(UiCall::Ready(region));
    }
    fn notify_batch_started(&self) {
        self.calls.lock().push(UiCall::BatchStarted);
    }
    fn notify_batch_ended(&self) {
        self.calls.lock().push(UiCall::BatchEnded);
    }
}
