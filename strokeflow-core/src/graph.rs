//! # Projection graph
//!
//! The notification path from scene-graph nodes to whatever recomputes their projections.
//! Requests pass through the graph's single filter slot, where an installed
//! [`ProjectionUpdateFilter`] may capture them instead.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::filter::ProjectionUpdateFilter;
use crate::rect::Rect;

pub struct NodeMarker;
pub type NodeID = crate::id::UniqueID<NodeMarker>;

pub struct FilterMarker;
/// Names an installed filter, needed to remove it.
pub type FilterCookie = crate::id::UniqueID<FilterMarker>;

/// The three kinds of projection notification.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum RequestKind {
    /// Recompute the node's whole graph, such as after a structural change.
    Refresh,
    /// Regions of the node changed.
    Dirty,
    /// Regions need recomposition without marking the node's cached content stale.
    NoFilthy,
}

/// Whatever recomputes node projections.
pub trait ProjectionSink: Send + Sync {
    fn refresh_graph(&self, node: NodeID, regions: &[Rect], crop: Rect);
    fn request_update(&self, node: NodeID, regions: &[Rect], crop: Rect, reset: bool);
    fn request_update_no_filthy(&self, node: NodeID, regions: &[Rect], crop: Rect);
}

/// A filter and the cookie it was installed under.
pub struct FilterHandle {
    pub cookie: FilterCookie,
    pub filter: Arc<ProjectionUpdateFilter>,
}

pub struct ProjectionGraph {
    sink: Arc<dyn ProjectionSink>,
    level_of_detail: AtomicI32,
    /// At most one filter at a time.
    filter: parking_lot::Mutex<Option<FilterHandle>>,
}
impl ProjectionGraph {
    #[must_use]
    pub fn new(sink: Arc<dyn ProjectionSink>) -> Self {
        Self {
            sink,
            level_of_detail: AtomicI32::new(0),
            filter: parking_lot::Mutex::new(None),
        }
    }
    #[must_use]
    pub fn current_level_of_detail(&self) -> i32 {
        self.level_of_detail.load(Ordering::Acquire)
    }
    /// Switch the level of detail the graph is recomputed at. 0 is full detail.
    pub fn set_level_of_detail(&self, level_of_detail: i32) {
        self.level_of_detail.store(level_of_detail, Ordering::Release);
    }
    /// Replace the filter slot, returning whatever was there.
    pub fn swap_filter(&self, handle: Option<FilterHandle>) -> Option<FilterHandle> {
        std::mem::replace(&mut *self.filter.lock(), handle)
    }
    /// Install a filter into the empty slot.
    ///
    /// Installing over another filter is a bug, and leaves the other one in place.
    pub fn install_filter(&self, filter: Arc<ProjectionUpdateFilter>) -> Option<FilterCookie> {
        let mut slot = self.filter.lock();
        if let Some(existing) = slot.as_ref() {
            log::error!("filter installed over {}, ignoring", existing.cookie);
            debug_assert!(false, "only one projection filter may be installed");
            return None;
        }
        let cookie = FilterCookie::default();
        log::trace!("installed projection filter {cookie}");
        *slot = Some(FilterHandle { cookie, filter });
        Some(cookie)
    }
    /// Remove the filter installed under `cookie`.
    pub fn remove_filter(&self, cookie: FilterCookie) -> Option<Arc<ProjectionUpdateFilter>> {
        let mut slot = self.filter.lock();
        match slot.as_ref() {
            Some(handle) if handle.cookie == cookie => {
                log::trace!("removed projection filter {cookie}");
                slot.take().map(|handle| handle.filter)
            }
            other => {
                log::error!(
                    "removing filter {cookie}, but {:?} is installed",
                    other.map(|handle| handle.cookie)
                );
                debug_assert!(false, "removed a filter that isn't installed");
                None
            }
        }
    }
    #[must_use]
    pub fn current_filter(&self) -> Option<FilterCookie> {
        self.filter.lock().as_ref().map(|handle| handle.cookie)
    }
    pub fn request_refresh(&self, node: NodeID, regions: &[Rect], crop: Rect) {
        self.request(RequestKind::Refresh, node, regions, crop, false);
    }
    pub fn request_update(&self, node: NodeID, regions: &[Rect], crop: Rect, reset: bool) {
        self.request(RequestKind::Dirty, node, regions, crop, reset);
    }
    pub fn request_update_no_filthy(&self, node: NodeID, regions: &[Rect], crop: Rect) {
        self.request(RequestKind::NoFilthy, node, regions, crop, false);
    }
    /// Offer a request to the installed filter, forwarding it to the sink if not captured.
    pub fn request(&self, kind: RequestKind, node: NodeID, regions: &[Rect], crop: Rect, reset: bool) {
        // Don't hold the slot while the filter works.
        let filter = self.filter.lock().as_ref().map(|handle| handle.filter.clone());
        if let Some(filter) = filter {
            if filter.intercept(self.current_level_of_detail(), kind, node, regions, crop, reset) {
                return;
            }
        }
        self.forward(kind, node, regions, crop, reset);
    }
    /// Send a request straight to the sink, bypassing any filter.
    pub(crate) fn forward(&self, kind: RequestKind, node: NodeID, regions: &[Rect], crop: Rect, reset: bool) {
        match kind {
            RequestKind::Refresh => self.sink.refresh_graph(node, regions, crop),
            RequestKind::Dirty => self.sink.request_update(node, regions, crop, reset),
            RequestKind::NoFilthy => self.sink.request_update_no_filthy(node, regions, crop),
        }
    }
}
