//! Level 3: Viewport Tests
//!
//! Tests immediate and animated viewport changes, cancellation, zoom limits,
//! fit-view and screen/flow conversion through the controller.

mod common;

use common::harness::FlowTestHarness;
use common::{approx_eq, RecordingSurface};
use flow_system::{
    ease, FitViewOptions, FlowConfig, FlowController, FlowEvent, Node, Rect, Viewport,
    ViewportEngine, ViewportOptions, XYPosition,
};
use std::time::{Duration, Instant};
use test_log::test;

const ANIMATION: Duration = Duration::from_millis(200);

// ============================================================================
// Immediate changes
// ============================================================================

#[test]
fn test_set_viewport_commits_and_notifies() {
    let mut harness = FlowTestHarness::new();
    let target = Viewport::new(40.0, -20.0, 1.5);

    let result = harness.flow.set_viewport(target, ViewportOptions::default()).try_result();

    assert_eq!(result, Some(true));
    assert_eq!(harness.flow.get_viewport(), target);
    assert_eq!(harness.surface.last(), Some(target));
    assert_eq!(harness.tracker.viewports(), vec![target]);
}

#[test]
fn test_zoom_is_clamped_to_limits() {
    let mut harness = FlowTestHarness::new();
    harness
        .flow
        .set_viewport(Viewport::new(0.0, 0.0, 10.0), ViewportOptions::default());
    assert_eq!(harness.flow.get_zoom(), 2.0);

    harness
        .flow
        .set_viewport(Viewport::new(0.0, 0.0, 0.01), ViewportOptions::default());
    assert_eq!(harness.flow.get_zoom(), 0.5);
}

#[test]
fn test_no_surface_resolves_false() {
    let mut harness = FlowTestHarness::detached();
    let before = harness.flow.get_viewport();

    let result = harness
        .flow
        .set_viewport(Viewport::new(10.0, 10.0, 1.0), ViewportOptions::default())
        .try_result();

    assert_eq!(result, Some(false));
    assert_eq!(harness.flow.get_viewport(), before);
    assert!(harness.tracker.viewports().is_empty());
}

#[test]
fn test_unchanged_viewport_publishes_nothing() {
    let mut harness = FlowTestHarness::new();
    let current = harness.flow.get_viewport();
    harness.flow.set_viewport(current, ViewportOptions::default());
    assert!(harness.tracker.viewports().is_empty());
}

// ============================================================================
// Zoom operations
// ============================================================================

#[test]
fn test_zoom_in_keeps_the_surface_center_fixed() {
    let mut harness = FlowTestHarness::new();
    let center = XYPosition::new(400.0, 300.0);
    let anchor = harness.flow.screen_to_flow_position(center);

    harness.flow.zoom_in(ViewportOptions::default());

    assert!(approx_eq(harness.flow.get_zoom(), 1.2));
    let after = harness.flow.flow_to_screen_position(anchor);
    assert!(approx_eq(after.x, center.x));
    assert!(approx_eq(after.y, center.y));
}

#[test]
fn test_zoom_out_then_in_round_trips() {
    let mut harness = FlowTestHarness::new();
    harness.flow.zoom_out(ViewportOptions::default());
    assert!(approx_eq(harness.flow.get_zoom(), 1.0 / 1.2));
    harness.flow.zoom_in(ViewportOptions::default());
    assert!(approx_eq(harness.flow.get_zoom(), 1.0));
}

#[test]
fn test_set_zoom_clamps() {
    let mut harness = FlowTestHarness::new();
    harness.flow.set_zoom(3.0, ViewportOptions::default());
    assert_eq!(harness.flow.get_zoom(), 2.0);
}

#[test]
fn test_set_center() {
    let mut harness = FlowTestHarness::new();
    harness
        .flow
        .set_center(100.0, 50.0, Some(1.0), ViewportOptions::default());
    assert_eq!(harness.flow.get_viewport(), Viewport::new(300.0, 250.0, 1.0));

    // Zoom defaults to the maximum
    harness.flow.set_center(100.0, 50.0, None, ViewportOptions::default());
    assert_eq!(harness.flow.get_viewport(), Viewport::new(200.0, 200.0, 2.0));
}

#[test]
fn test_min_zoom_change_reclamps() {
    let mut harness = FlowTestHarness::new();
    harness.flow.set_min_zoom(1.5);

    assert_eq!(harness.flow.get_zoom(), 1.5);
    assert_eq!(harness.tracker.viewports().len(), 1);

    // Already inside the new limit
    harness.flow.set_max_zoom(1.8);
    assert_eq!(harness.tracker.viewports().len(), 1);
}

// ============================================================================
// Animated transitions
// ============================================================================

#[test]
fn test_animated_transition_reaches_target() {
    let mut harness = FlowTestHarness::new();
    let target = Viewport::new(200.0, 100.0, 2.0);

    let mut transition = harness
        .flow
        .set_viewport(target, ViewportOptions::animated(ANIMATION));
    assert_eq!(transition.try_result(), None);
    assert!(harness.flow.is_animating());

    let result = harness.finish(transition, ANIMATION);

    assert_eq!(result, Some(true));
    assert!(!harness.flow.is_animating());
    assert_eq!(harness.flow.get_viewport(), target);
    let steps = harness.tracker.viewports();
    assert!(steps.len() > 1, "intermediate steps are published");
    assert_eq!(steps.last(), Some(&target));
}

#[test]
fn test_new_transition_cancels_running_one() {
    let mut harness = FlowTestHarness::new();
    let mut first = harness
        .flow
        .set_viewport(Viewport::new(500.0, 0.0, 1.0), ViewportOptions::animated(ANIMATION));
    let mut second = harness
        .flow
        .set_viewport(Viewport::new(0.0, 500.0, 1.0), ViewportOptions::default());

    assert_eq!(first.try_result(), Some(false));
    assert_eq!(second.try_result(), Some(true));
    assert!(!harness.flow.is_animating());
    assert_eq!(harness.flow.get_viewport(), Viewport::new(0.0, 500.0, 1.0));
}

#[test]
fn test_detaching_surface_cancels_transition() {
    let mut harness = FlowTestHarness::new();
    let mut transition = harness
        .flow
        .set_viewport(Viewport::new(500.0, 0.0, 1.0), ViewportOptions::animated(ANIMATION));

    assert!(harness.flow.detach_surface().is_some());
    assert_eq!(transition.try_result(), Some(false));
    assert_eq!(harness.flow.advance(Instant::now() + ANIMATION), None);
}

#[test]
fn test_linear_ease_midpoint() {
    let mut engine = ViewportEngine::new(&FlowConfig::default());
    engine.attach_surface(Box::new(RecordingSurface::new(0.0, 0.0, 800.0, 600.0)));

    let start = Instant::now();
    let options = ViewportOptions::animated(Duration::from_millis(100)).with_ease(ease::linear);
    engine.transition_at(Viewport::new(100.0, 200.0, 2.0), options, start);

    let mid = engine.advance(start + Duration::from_millis(50)).unwrap();
    assert!(approx_eq(mid.x, 50.0));
    assert!(approx_eq(mid.y, 100.0));
    assert!(approx_eq(mid.zoom, 1.5));
    assert!(engine.is_animating());

    let end = engine.advance(start + Duration::from_millis(150)).unwrap();
    assert_eq!(end, Viewport::new(100.0, 200.0, 2.0));
    assert!(!engine.is_animating());
}

#[test(tokio::test)]
async fn test_transition_future_resolves() {
    let mut harness = FlowTestHarness::new();
    let transition = harness
        .flow
        .set_viewport(Viewport::new(10.0, 10.0, 1.0), ViewportOptions::animated(ANIMATION));
    harness.flow.advance(Instant::now() + ANIMATION * 2);
    assert!(transition.await);

    let cancelled = harness
        .flow
        .set_viewport(Viewport::new(20.0, 20.0, 1.0), ViewportOptions::animated(ANIMATION));
    harness.flow.set_viewport(Viewport::new(30.0, 30.0, 1.0), ViewportOptions::default());
    assert!(!cancelled.await);
}

// ============================================================================
// fit_view() / fit_bounds()
// ============================================================================

fn assert_on_screen(harness: &FlowTestHarness, bounds: Rect) {
    let top_left = harness.flow.flow_to_screen_position(bounds.position());
    let bottom_right = harness.flow.flow_to_screen_position(XYPosition::new(
        bounds.x + bounds.width,
        bounds.y + bounds.height,
    ));
    assert!(top_left.x >= 0.0 && top_left.y >= 0.0, "{top_left:?} off screen");
    assert!(
        bottom_right.x <= 800.0 && bottom_right.y <= 600.0,
        "{bottom_right:?} off screen"
    );
}

#[test]
fn test_fit_view_shows_all_nodes_centered() {
    let mut harness = FlowTestHarness::new();
    let bounds = harness.flow.get_nodes_bounds(&["G", "a", "b", "c"]);

    let result = harness.flow.fit_view(FitViewOptions::default()).try_result();

    assert_eq!(result, Some(true));
    assert_on_screen(&harness, bounds);
    let center = harness.flow.flow_to_screen_position(XYPosition::new(
        bounds.x + bounds.width / 2.0,
        bounds.y + bounds.height / 2.0,
    ));
    assert!(approx_eq(center.x, 400.0));
    assert!(approx_eq(center.y, 300.0));
    // Width is the limiting axis
    assert!(approx_eq(harness.flow.get_zoom(), 800.0 / (700.0 * 1.1)));
}

#[test]
fn test_fit_view_on_selected_nodes_respects_max_zoom() {
    let mut harness = FlowTestHarness::new();
    let options = FitViewOptions {
        nodes: Some(vec!["c".into()]),
        ..Default::default()
    };
    harness.flow.fit_view(options);
    assert_eq!(harness.flow.get_viewport(), Viewport::new(-1100.0, 50.0, 2.0));
}

#[test]
fn test_fit_view_skips_hidden_nodes_unless_asked() {
    let mut harness = FlowTestHarness::with_elements(
        vec![
            Node::new("shown", 0.0, 0.0).with_measured(100.0, 100.0),
            Node {
                hidden: Some(true),
                ..Node::new("hidden", 5000.0, 5000.0).with_measured(100.0, 100.0)
            },
        ],
        vec![],
    );

    harness.flow.fit_view(FitViewOptions::default());
    assert_on_screen(&harness, Rect::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(harness.flow.get_zoom(), 2.0);

    harness.flow.fit_view(FitViewOptions {
        include_hidden_nodes: true,
        ..Default::default()
    });
    assert_eq!(harness.flow.get_zoom(), 0.5);
}

#[test]
fn test_fit_view_without_nodes_or_surface() {
    let mut empty = FlowTestHarness::with_elements(vec![], vec![]);
    assert_eq!(empty.flow.fit_view(FitViewOptions::default()).try_result(), Some(false));

    let mut detached = FlowTestHarness::detached();
    assert_eq!(
        detached.flow.fit_view(FitViewOptions::default()).try_result(),
        Some(false)
    );
}

#[test]
fn test_fit_bounds() {
    let mut harness = FlowTestHarness::new();
    let bounds = Rect::new(0.0, 0.0, 400.0, 300.0);
    harness.flow.fit_bounds(&bounds, Some(0.0), ViewportOptions::default());
    assert_eq!(harness.flow.get_viewport(), Viewport::new(0.0, 0.0, 2.0));
}

#[test]
fn test_fit_view_animated() {
    let mut harness = FlowTestHarness::new();
    let options = FitViewOptions {
        viewport: ViewportOptions::animated(ANIMATION),
        ..Default::default()
    };
    let transition = harness.flow.fit_view(options);
    assert!(harness.flow.is_animating());
    assert_eq!(harness.finish(transition, ANIMATION), Some(true));
}

// ============================================================================
// Coordinate conversion
// ============================================================================

#[test]
fn test_conversion_accounts_for_surface_offset() {
    let mut harness = FlowTestHarness::new();
    harness.flow.detach_surface();
    harness
        .flow
        .attach_surface(Box::new(RecordingSurface::new(50.0, 20.0, 800.0, 600.0)));
    harness
        .flow
        .set_viewport(Viewport::new(10.0, 10.0, 2.0), ViewportOptions::default());

    let flow = harness.flow.screen_to_flow_position(XYPosition::new(110.0, 50.0));
    assert_eq!(flow, XYPosition::new(25.0, 10.0));
    assert_eq!(
        harness.flow.flow_to_screen_position(flow),
        XYPosition::new(110.0, 50.0)
    );
}

#[test]
fn test_screen_to_flow_snaps_when_enabled() {
    let config = FlowConfig {
        snap_to_grid: true,
        snap_grid: [15.0, 15.0],
        ..Default::default()
    };
    let harness = FlowTestHarness::with_config(config, vec![], vec![]);
    assert_eq!(
        harness.flow.screen_to_flow_position(XYPosition::new(22.0, 8.0)),
        XYPosition::new(15.0, 15.0)
    );
}

#[test]
fn test_conversion_without_surface_is_identity() {
    let flow = FlowController::default();
    let point = XYPosition::new(12.0, 34.0);
    assert_eq!(flow.screen_to_flow_position(point), point);
    assert_eq!(flow.flow_to_screen_position(point), point);
}

#[test]
fn test_attach_surface_receives_current_viewport() {
    let mut flow = FlowController::new(FlowConfig {
        default_viewport: Viewport::new(5.0, 6.0, 1.0),
        ..Default::default()
    });
    let surface = RecordingSurface::new(0.0, 0.0, 100.0, 100.0);
    flow.attach_surface(Box::new(surface.clone()));
    assert_eq!(surface.last(), Some(Viewport::new(5.0, 6.0, 1.0)));

    let events = common::EventTracker::new();
    flow.subscribe(events.listener());
    flow.set_viewport(Viewport::new(1.0, 1.0, 1.0), ViewportOptions::default());
    assert_eq!(
        events.count(|e| matches!(e, FlowEvent::ViewportChanged(_))),
        1
    );
}
