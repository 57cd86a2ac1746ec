//! Pan/zoom state and animated viewport transitions.
//!
//! [`ViewportEngine`] owns the single viewport of a flow. It converts between
//! screen space (client pixels) and flow space, clamps zoom to the configured
//! limits, and runs at most one transition at a time:
//!
//! ```text
//! Idle --transition_to(duration)--> Animating --advance(t >= 1)--> Idle
//!                                       |
//!                                       +--transition_to / cancel--> (old one resolves false)
//! ```
//!
//! The host drives animation frames by calling [`ViewportEngine::advance`]
//! with the current time, typically from its render loop. Every step is
//! committed to the attached [`TransformSurface`].

use crate::config::FlowConfig;
use crate::geometry::{clamp, point_to_flow, point_to_screen};
use crate::types::{Rect, Viewport, XYPosition};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

pub type EaseFn = fn(f64) -> f64;

/// Easing curves for `t` in `[0, 1]`.
pub mod ease {
    pub fn linear(t: f64) -> f64 {
        t
    }

    pub fn quad_in_out(t: f64) -> f64 {
        if t < 0.5 {
            2.0 * t * t
        } else {
            1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
        }
    }

    pub fn cubic_in_out(t: f64) -> f64 {
        if t < 0.5 {
            4.0 * t * t * t
        } else {
            1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
        }
    }

    pub fn cubic_out(t: f64) -> f64 {
        1.0 - (1.0 - t).powi(3)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportOptions {
    /// Without a duration the viewport is committed immediately.
    pub duration: Option<Duration>,
    /// Defaults to [`ease::cubic_in_out`].
    pub ease: Option<EaseFn>,
}

impl ViewportOptions {
    pub fn animated(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ease: None,
        }
    }

    pub fn with_ease(mut self, ease: EaseFn) -> Self {
        self.ease = Some(ease);
        self
    }
}

/// The pan/zoom surface provided by the UI layer.
pub trait TransformSurface {
    /// Client rect of the element hosting the flow.
    fn bounding_rect(&self) -> Rect;
    /// Render `viewport`. Called for every committed step.
    fn apply(&mut self, viewport: Viewport);
}

/// Completion of a viewport operation.
///
/// Resolves to `true` once the target viewport is committed and to `false`
/// when no surface was attached or the transition was cancelled.
#[derive(Debug)]
pub struct ViewportTransition {
    state: TransitionState,
}

#[derive(Debug)]
enum TransitionState {
    Ready(bool),
    Pending(oneshot::Receiver<bool>),
}

impl ViewportTransition {
    pub fn ready(committed: bool) -> Self {
        Self {
            state: TransitionState::Ready(committed),
        }
    }

    fn pending(receiver: oneshot::Receiver<bool>) -> Self {
        Self {
            state: TransitionState::Pending(receiver),
        }
    }

    /// The result if it is already known, without waiting.
    pub fn try_result(&mut self) -> Option<bool> {
        let result = match &mut self.state {
            TransitionState::Ready(committed) => return Some(*committed),
            TransitionState::Pending(receiver) => match receiver.try_recv() {
                Ok(committed) => committed,
                Err(oneshot::error::TryRecvError::Empty) => return None,
                Err(oneshot::error::TryRecvError::Closed) => false,
            },
        };
        self.state = TransitionState::Ready(result);
        Some(result)
    }
}

impl Future for ViewportTransition {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let result = match &mut self.state {
            TransitionState::Ready(committed) => return Poll::Ready(*committed),
            TransitionState::Pending(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(result) => result.unwrap_or(false),
                Poll::Pending => return Poll::Pending,
            },
        };
        self.state = TransitionState::Ready(result);
        Poll::Ready(result)
    }
}

struct ActiveTransition {
    from: Viewport,
    to: Viewport,
    started: Instant,
    duration: Duration,
    ease: EaseFn,
    done: oneshot::Sender<bool>,
}

impl ActiveTransition {
    fn progress(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started);
        clamp(elapsed.as_secs_f64() / self.duration.as_secs_f64(), 0.0, 1.0)
    }

    fn viewport_at(&self, t: f64) -> Viewport {
        let eased = (self.ease)(t);
        let lerp = |a: f64, b: f64| a + (b - a) * eased;
        Viewport {
            x: lerp(self.from.x, self.to.x),
            y: lerp(self.from.y, self.to.y),
            zoom: lerp(self.from.zoom, self.to.zoom),
        }
    }
}

enum Phase {
    Idle,
    Animating(ActiveTransition),
}

/// Viewport that fits `bounds` into a `width` x `height` surface.
///
/// Picks the largest zoom at which the bounds, grown by `padding` (a fraction
/// of their size), fit on both axes, clamps it, and centers the bounds.
pub fn viewport_for_bounds(
    bounds: &Rect,
    width: f64,
    height: f64,
    min_zoom: f64,
    max_zoom: f64,
    padding: f64,
) -> Viewport {
    let axis_zoom = |available: f64, size: f64| {
        if size > 0.0 {
            available / (size * (1.0 + padding))
        } else {
            f64::INFINITY
        }
    };
    let zoom = axis_zoom(width, bounds.width).min(axis_zoom(height, bounds.height));
    let zoom = clamp(zoom, min_zoom, max_zoom);

    let center_x = bounds.x + bounds.width / 2.0;
    let center_y = bounds.y + bounds.height / 2.0;
    Viewport {
        x: width / 2.0 - center_x * zoom,
        y: height / 2.0 - center_y * zoom,
        zoom,
    }
}

pub struct ViewportEngine {
    viewport: Viewport,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
    surface: Option<Box<dyn TransformSurface>>,
    phase: Phase,
}

impl Default for ViewportEngine {
    fn default() -> Self {
        Self::new(&FlowConfig::default())
    }
}

impl ViewportEngine {
    pub fn new(config: &FlowConfig) -> Self {
        let mut engine = Self {
            viewport: config.default_viewport,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_step: config.zoom_step,
            surface: None,
            phase: Phase::Idle,
        };
        engine.viewport = engine.clamp_viewport(engine.viewport);
        engine
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn zoom(&self) -> f64 {
        self.viewport.zoom
    }

    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.phase, Phase::Animating(_))
    }

    // === Surface ===

    /// Attach the pan/zoom surface; it immediately receives the current viewport.
    pub fn attach_surface(&mut self, mut surface: Box<dyn TransformSurface>) {
        surface.apply(self.viewport);
        self.surface = Some(surface);
    }

    /// Detach the surface, cancelling any running transition.
    pub fn detach_surface(&mut self) -> Option<Box<dyn TransformSurface>> {
        self.cancel();
        self.surface.take()
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface_rect(&self) -> Option<Rect> {
        self.surface.as_ref().map(|surface| surface.bounding_rect())
    }

    // === Zoom limits ===

    pub fn clamp_viewport(&self, viewport: Viewport) -> Viewport {
        Viewport {
            zoom: clamp(viewport.zoom, self.min_zoom, self.max_zoom),
            ..viewport
        }
    }

    pub fn set_min_zoom(&mut self, min_zoom: f64) {
        self.min_zoom = min_zoom;
        self.reclamp();
    }

    pub fn set_max_zoom(&mut self, max_zoom: f64) {
        self.max_zoom = max_zoom;
        self.reclamp();
    }

    /// Clamp the current viewport and the target of a running transition
    /// into the new limits.
    fn reclamp(&mut self) {
        let (min_zoom, max_zoom) = (self.min_zoom, self.max_zoom);
        if let Phase::Animating(active) = &mut self.phase {
            active.to.zoom = clamp(active.to.zoom, min_zoom, max_zoom);
        }
        let clamped = self.clamp_viewport(self.viewport);
        if clamped != self.viewport {
            self.commit(clamped);
        }
    }

    // === Transitions ===

    /// Move to `target`, animated when `options.duration` is set.
    pub fn transition_to(&mut self, target: Viewport, options: ViewportOptions) -> ViewportTransition {
        self.transition_at(target, options, Instant::now())
    }

    /// [`transition_to`](Self::transition_to) with an explicit start time.
    pub fn transition_at(
        &mut self,
        target: Viewport,
        options: ViewportOptions,
        now: Instant,
    ) -> ViewportTransition {
        if self.surface.is_none() {
            debug!("viewport transition requested without a surface");
            return ViewportTransition::ready(false);
        }
        self.cancel();

        let target = self.clamp_viewport(target);
        let duration = options.duration.filter(|duration| !duration.is_zero());
        let Some(duration) = duration else {
            self.commit(target);
            return ViewportTransition::ready(true);
        };

        let (done, receiver) = oneshot::channel();
        self.phase = Phase::Animating(ActiveTransition {
            from: self.viewport,
            to: target,
            started: now,
            duration,
            ease: options.ease.unwrap_or(ease::cubic_in_out),
            done,
        });
        ViewportTransition::pending(receiver)
    }

    /// Commit the animation step for `now`. Returns the committed viewport, or
    /// `None` when idle.
    pub fn advance(&mut self, now: Instant) -> Option<Viewport> {
        let Phase::Animating(active) = &self.phase else {
            return None;
        };
        let t = active.progress(now);
        let step = if t >= 1.0 { active.to } else { active.viewport_at(t) };
        let step = self.clamp_viewport(step);
        self.commit(step);

        if t >= 1.0 {
            if let Phase::Animating(active) = std::mem::replace(&mut self.phase, Phase::Idle) {
                let _ = active.done.send(true);
            }
        }
        Some(step)
    }

    /// Drop the running transition where it is. Its future resolves `false`.
    pub fn cancel(&mut self) {
        if let Phase::Animating(active) = std::mem::replace(&mut self.phase, Phase::Idle) {
            debug!("viewport transition cancelled");
            let _ = active.done.send(false);
        }
    }

    fn commit(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(surface) = self.surface.as_mut() {
            surface.apply(viewport);
        }
    }

    // === Viewport operations ===

    pub fn set_viewport(&mut self, viewport: Viewport, options: ViewportOptions) -> ViewportTransition {
        self.transition_to(viewport, options)
    }

    /// Zoom to `zoom` keeping the surface center fixed.
    pub fn zoom_to(&mut self, zoom: f64, options: ViewportOptions) -> ViewportTransition {
        let Some(rect) = self.surface_rect() else {
            return ViewportTransition::ready(false);
        };
        let zoom = clamp(zoom, self.min_zoom, self.max_zoom);
        let center = XYPosition::new(rect.width / 2.0, rect.height / 2.0);
        let anchor = point_to_flow(center, &self.viewport, None);
        let target = Viewport {
            x: center.x - anchor.x * zoom,
            y: center.y - anchor.y * zoom,
            zoom,
        };
        self.transition_to(target, options)
    }

    pub fn zoom_by(&mut self, factor: f64, options: ViewportOptions) -> ViewportTransition {
        self.zoom_to(self.viewport.zoom * factor, options)
    }

    pub fn zoom_in(&mut self, options: ViewportOptions) -> ViewportTransition {
        self.zoom_by(self.zoom_step, options)
    }

    pub fn zoom_out(&mut self, options: ViewportOptions) -> ViewportTransition {
        self.zoom_by(1.0 / self.zoom_step, options)
    }

    /// Center the flow point `(x, y)`; `zoom` defaults to the maximum zoom.
    pub fn set_center(
        &mut self,
        x: f64,
        y: f64,
        zoom: Option<f64>,
        options: ViewportOptions,
    ) -> ViewportTransition {
        let Some(rect) = self.surface_rect() else {
            return ViewportTransition::ready(false);
        };
        let zoom = clamp(zoom.unwrap_or(self.max_zoom), self.min_zoom, self.max_zoom);
        let target = Viewport {
            x: rect.width / 2.0 - x * zoom,
            y: rect.height / 2.0 - y * zoom,
            zoom,
        };
        self.transition_to(target, options)
    }

    /// Fit `bounds` (flow space) into the surface.
    pub fn fit_bounds(&mut self, bounds: &Rect, padding: f64, options: ViewportOptions) -> ViewportTransition {
        let Some(rect) = self.surface_rect() else {
            return ViewportTransition::ready(false);
        };
        let target = viewport_for_bounds(bounds, rect.width, rect.height, self.min_zoom, self.max_zoom, padding);
        self.transition_to(target, options)
    }

    // === Coordinate conversion ===

    /// Client position to flow space, corrected for the surface's offset.
    ///
    /// Without a surface the position is returned unchanged.
    pub fn screen_to_flow(&self, client: XYPosition, snap_grid: Option<[f64; 2]>) -> XYPosition {
        let Some(rect) = self.surface_rect() else {
            return client;
        };
        let relative = XYPosition::new(client.x - rect.x, client.y - rect.y);
        point_to_flow(relative, &self.viewport, snap_grid)
    }

    /// Flow position to client space.
    ///
    /// Without a surface the position is returned unchanged.
    pub fn flow_to_screen(&self, flow: XYPosition) -> XYPosition {
        let Some(rect) = self.surface_rect() else {
            return flow;
        };
        let relative = point_to_screen(flow, &self.viewport);
        XYPosition::new(relative.x + rect.x, relative.y + rect.y)
    }
}
