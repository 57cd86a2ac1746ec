//! Test harness around one [`FlowController`].
//!
//! Provides a nested flow with a tracked event stream and an attached
//! 800x600 surface, plus helpers for driving viewport animations.

#![allow(dead_code)]

use super::{EventTracker, RecordingSurface};
use flow_system::{Edge, FlowConfig, FlowController, Node, ViewportTransition};
use std::time::{Duration, Instant};

pub struct FlowTestHarness {
    pub flow: FlowController,
    pub tracker: EventTracker,
    pub surface: RecordingSurface,
}

impl FlowTestHarness {
    /// A group `G` at (100, 100) holding `a` and `b`, a free node `c`, and
    /// edges `a -> b` and `b -> c`.
    pub fn new() -> Self {
        Self::with_elements(default_nodes(), default_edges())
    }

    pub fn with_elements(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self::with_config(FlowConfig::default(), nodes, edges)
    }

    pub fn with_config(config: FlowConfig, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut flow = FlowController::new(config);
        flow.set_nodes(nodes).expect("fixture nodes resolve");
        flow.set_edges(edges);

        let surface = RecordingSurface::new(0.0, 0.0, 800.0, 600.0);
        flow.attach_surface(Box::new(surface.clone()));

        let tracker = EventTracker::new();
        flow.subscribe(tracker.listener());

        Self {
            flow,
            tracker,
            surface,
        }
    }

    /// Like [`new`](Self::new) but without a surface.
    pub fn detached() -> Self {
        let mut harness = Self::new();
        harness.flow.detach_surface();
        harness.tracker.clear();
        harness
    }

    /// Step a running transition to completion, one 16ms frame at a time,
    /// and return its result.
    pub fn finish(&mut self, mut transition: ViewportTransition, duration: Duration) -> Option<bool> {
        let start = Instant::now();
        let mut elapsed = Duration::ZERO;
        while self.flow.is_animating() && elapsed <= duration + Duration::from_millis(32) {
            elapsed += Duration::from_millis(16);
            self.flow.advance(start + elapsed);
        }
        transition.try_result()
    }
}

pub fn default_nodes() -> Vec<Node> {
    vec![
        Node::new("G", 100.0, 100.0).with_measured(400.0, 300.0),
        Node::new("a", 10.0, 10.0).with_parent("G").with_measured(100.0, 50.0),
        Node::new("b", 200.0, 150.0).with_parent("G").with_measured(100.0, 50.0),
        Node::new("c", 700.0, 100.0).with_measured(100.0, 50.0),
    ]
}

pub fn default_edges() -> Vec<Edge> {
    vec![Edge::new("e-ab", "a", "b"), Edge::new("e-bc", "b", "c")]
}
