//! # Projection update filter
//!
//! Captures projection notifications during a background recompute window, then replays them
//! coalesced: one request per node and crop region, covering the union of what was captured.

use smallvec::SmallVec;

use crate::graph::{NodeID, ProjectionGraph, RequestKind};
use crate::rect::{GridPolicy, Rect};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CapturedRequest {
    pub regions: SmallVec<[Rect; 4]>,
    pub crop: Rect,
    pub reset: bool,
}

type RequestMap = hashbrown::HashMap<NodeID, Vec<CapturedRequest>>;

#[derive(Default)]
struct Captured {
    refresh: RequestMap,
    dirty: RequestMap,
    no_filthy: RequestMap,
}
impl Captured {
    fn map_mut(&mut self, kind: RequestKind) -> &mut RequestMap {
        match kind {
            RequestKind::Refresh => &mut self.refresh,
            RequestKind::Dirty => &mut self.dirty,
            RequestKind::NoFilthy => &mut self.no_filthy,
        }
    }
    fn len(&self) -> usize {
        [&self.refresh, &self.dirty, &self.no_filthy]
            .into_iter()
            .flat_map(|map| map.values())
            .map(Vec::len)
            .sum()
    }
}

#[derive(Default)]
pub struct ProjectionUpdateFilter {
    captured: parking_lot::Mutex<Captured>,
}
impl ProjectionUpdateFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Offered every request while installed. Returns true if the request was captured.
    ///
    /// Only full detail requests are captured. Reduced detail recompute is its own
    /// background preview and passes straight through.
    pub fn intercept(
        &self,
        level_of_detail: i32,
        kind: RequestKind,
        node: NodeID,
        regions: &[Rect],
        crop: Rect,
        reset: bool,
    ) -> bool {
        if level_of_detail != 0 {
            return false;
        }
        self.captured
            .lock()
            .map_mut(kind)
            .entry(node)
            .or_default()
            .push(CapturedRequest {
                regions: regions.iter().copied().collect(),
                crop,
                reset,
            });
        true
    }
    /// Number of requests captured so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.captured.lock().len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Re-issue everything captured into `graph`, coalesced, and empty the filter.
    ///
    /// Refresh requests go first, then dirty, then no-filthy. Within a kind nodes are visited in
    /// ID order and crops in sorted order, so the result does not depend on capture order.
    /// Returns every region issued.
    pub fn replay(&self, graph: &ProjectionGraph, policy: GridPolicy) -> Vec<Rect> {
        let captured = std::mem::take(&mut *self.captured.lock());
        log::trace!("replaying {} captured requests", captured.len());
        let mut issued = Vec::new();
        for (kind, map) in [
            (RequestKind::Refresh, captured.refresh),
            (RequestKind::Dirty, captured.dirty),
            (RequestKind::NoFilthy, captured.no_filthy),
        ] {
            let mut nodes: Vec<_> = map.into_iter().collect();
            nodes.sort_unstable_by_key(|(node, _)| *node);
            for (node, requests) in nodes {
                // crop -> (regions, reset)
                let mut by_crop = std::collections::BTreeMap::<Rect, (Vec<Rect>, bool)>::new();
                for request in requests {
                    let (regions, reset) = by_crop.entry(request.crop).or_default();
                    regions.extend(request.regions);
                    *reset |= request.reset;
                }
                for (crop, (regions, reset)) in by_crop {
                    let cover = policy.cover(regions);
                    if cover.is_empty() && kind != RequestKind::Refresh {
                        continue;
                    }
                    graph.forward(kind, node, &cover, crop, reset);
                    issued.extend_from_slice(&cover);
                }
            }
        }
        issued
    }
    /// Drop everything captured without replaying.
    pub fn discard(&self) -> usize {
        let dropped = std::mem::take(&mut *self.captured.lock()).len();
        log::trace!("discarded {dropped} captured requests");
        dropped
    }
}

#[cfg(test)]
mod test {
    use super::ProjectionUpdateFilter;
    use crate::graph::{NodeID, ProjectionGraph};
    use crate::rect::{GridPolicy, Rect};
    use crate::testing::{RecordingSink, SinkCall};
    use std::sync::Arc;

    fn setup() -> (Arc<RecordingSink>, ProjectionGraph, Arc<ProjectionUpdateFilter>) {
        let sink = Arc::new(RecordingSink::default());
        let graph = ProjectionGraph::new(sink.clone());
        let filter = Arc::new(ProjectionUpdateFilter::new());
        graph.install_filter(filter.clone()).unwrap();
        (sink, graph, filter)
    }
    const CANVAS: Rect = Rect::new(0, 0, 1024, 1024);

    #[test]
    fn captures_everything_at_full_detail() {
        let (sink, graph, filter) = setup();
        let node = NodeID::default();
        graph.request_update(node, &[Rect::new(0, 0, 8, 8)], CANVAS, false);
        graph.request_refresh(node, &[CANVAS], CANVAS);
        graph.request_update_no_filthy(node, &[Rect::new(0, 0, 8, 8)], CANVAS);
        assert!(sink.take().is_empty());
        assert_eq!(filter.len(), 3);
    }
    #[test]
    fn reduced_detail_passes() {
        let (sink, graph, filter) = setup();
        graph.set_level_of_detail(2);
        graph.request_update(NodeID::default(), &[Rect::new(0, 0, 8, 8)], CANVAS, false);
        assert_eq!(sink.take().len(), 1);
        assert!(filter.is_empty());
    }
    #[test]
    fn coalesces_per_node_and_crop() {
        let (sink, graph, filter) = setup();
        let node = NodeID::default();
        let other_crop = Rect::new(0, 0, 512, 512);
        graph.request_update(node, &[Rect::new(0, 0, 10, 10)], CANVAS, false);
        graph.request_update(node, &[Rect::new(70, 0, 10, 10)], CANVAS, true);
        graph.request_update(node, &[Rect::new(200, 200, 10, 10)], other_crop, false);
        let cookie = graph.current_filter().unwrap();
        graph.remove_filter(cookie).unwrap();

        let issued = filter.replay(&graph, GridPolicy::default());
        let calls = sink.take();
        assert_eq!(
            calls,
            [
                SinkCall::Update {
                    node,
                    regions: vec![Rect::new(192, 192, 64, 64)],
                    crop: other_crop,
                    reset: false,
                },
                SinkCall::Update {
                    node,
                    regions: vec![Rect::new(0, 0, 128, 64)],
                    crop: CANVAS,
                    reset: true,
                },
            ]
        );
        assert_eq!(issued.len(), 2);
        assert!(filter.is_empty());
    }
    #[test]
    fn refresh_replays_first() {
        let (sink, graph, filter) = setup();
        let node = NodeID::default();
        graph.request_update(node, &[Rect::new(0, 0, 10, 10)], CANVAS, false);
        graph.request_refresh(node, &[CANVAS], CANVAS);
        graph.swap_filter(None);

        filter.replay(&graph, GridPolicy::default());
        let calls = sink.take();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], SinkCall::Refresh { .. }));
        assert!(matches!(calls[1], SinkCall::Update { .. }));
    }
    #[test]
    fn replay_ignores_capture_order() {
        let nodes = [NodeID::default(), NodeID::default()];
        let requests = [
            (nodes[0], Rect::new(0, 0, 100, 30)),
            (nodes[1], Rect::new(500, 500, 3, 3)),
            (nodes[0], Rect::new(60, 20, 100, 100)),
            (nodes[0], Rect::new(300, 0, 1, 1)),
        ];
        let replay = |order: &[usize]| {
            let (sink, graph, filter) = setup();
            for &idx in order {
                let (node, region) = requests[idx];
                graph.request_update(node, &[region], CANVAS, false);
            }
            graph.swap_filter(None);
            filter.replay(&graph, GridPolicy::default());
            sink.take()
        };
        let forward = replay(&[0, 1, 2, 3]);
        assert_eq!(forward, replay(&[3, 2, 1, 0]));
        assert_eq!(forward, replay(&[2, 0, 3, 1]));
        // One request per node.
        assert_eq!(forward.len(), 2);
    }
    #[test]
    fn discard_drops_without_issuing() {
        let (sink, graph, filter) = setup();
        graph.request_update(NodeID::default(), &[Rect::new(0, 0, 1, 1)], CANVAS, false);
        assert_eq!(filter.discard(), 1);
        graph.swap_filter(None);
        assert!(filter.replay(&graph, GridPolicy::default()).is_empty());
        assert!(sink.take().is_empty());
    }
}
