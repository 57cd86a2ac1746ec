//! Slint adapter for [`FlowController`].
//!
//! [`SlintFlowBinding`] shares one controller between Slint callbacks and
//! keeps a [`VecModel`] of node rects in sync with the store.
//!
//! # Example
//!
//! ```ignore
//! use flow_system::slint_binding::SlintFlowBinding;
//!
//! let binding = SlintFlowBinding::new(FlowConfig::default());
//! window.set_node_rects(binding.node_rects().into());
//! window.on_node_measured(binding.node_measured_callback());
//! window.on_node_clicked(binding.node_click_callback());
//! window.on_drag_ended(binding.drag_ended_callback());
//! window.on_surface_resized(binding.surface_geometry_callback());
//! window.on_delete_pressed(binding.delete_selected_callback());
//!
//! let w = window.as_weak();
//! binding.attach_surface(move |x, y, zoom| {
//!     if let Some(w) = w.upgrade() {
//!         w.set_viewport_transform(x, y, zoom);
//!     }
//! });
//! let _timer = binding.start_animation_timer();
//! ```

use crate::config::FlowConfig;
use crate::controller::FlowController;
use crate::events::FlowEvent;
use crate::geometry::internal_node_to_rect;
use crate::tracking::DimensionUpdate;
use crate::types::{Rect, Viewport};
use crate::viewport::{TransformSurface, ViewportOptions};
use slint::{SharedString, Timer, TimerMode, VecModel};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Row of the node model, in flow coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeRect {
    pub id: SharedString,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub z: i32,
    pub selected: bool,
    pub hidden: bool,
}

/// Surface whose geometry is reported by Slint and whose transform is pushed
/// back through a callback.
struct SlintSurface {
    rect: Rc<Cell<Rect>>,
    on_apply: Box<dyn Fn(f32, f32, f32)>,
}

impl TransformSurface for SlintSurface {
    fn bounding_rect(&self) -> Rect {
        self.rect.get()
    }

    fn apply(&mut self, viewport: Viewport) {
        (self.on_apply)(viewport.x as f32, viewport.y as f32, viewport.zoom as f32);
    }
}

/// Shared controller plus the Slint models derived from it.
///
/// Clone this binding to share it across callbacks.
#[derive(Clone)]
pub struct SlintFlowBinding {
    controller: Rc<RefCell<FlowController>>,
    node_rects: Rc<VecModel<NodeRect>>,
    surface_rect: Rc<Cell<Rect>>,
    dirty: Rc<Cell<bool>>,
}

impl SlintFlowBinding {
    pub fn new(config: FlowConfig) -> Self {
        Self::with_controller(FlowController::new(config))
    }

    pub fn with_controller(mut controller: FlowController) -> Self {
        let dirty = Rc::new(Cell::new(true));
        let flag = dirty.clone();
        controller.subscribe(move |event| {
            if matches!(
                event,
                FlowEvent::NodesChanged | FlowEvent::ElementsDeleted { .. }
            ) {
                flag.set(true);
            }
        });

        let binding = Self {
            controller: Rc::new(RefCell::new(controller)),
            node_rects: Rc::new(VecModel::default()),
            surface_rect: Rc::new(Cell::new(Rect::default())),
            dirty,
        };
        binding.sync();
        binding
    }

    pub fn controller(&self) -> Rc<RefCell<FlowController>> {
        self.controller.clone()
    }

    pub fn node_rects(&self) -> Rc<VecModel<NodeRect>> {
        self.node_rects.clone()
    }

    /// Rebuild the node model if the store changed since the last sync.
    pub fn sync(&self) {
        if !self.dirty.replace(false) {
            return;
        }
        let rows: Vec<NodeRect> = self
            .controller
            .borrow()
            .store()
            .internal_nodes()
            .map(|node| {
                let rect = internal_node_to_rect(node);
                NodeRect {
                    id: node.id.as_str().into(),
                    x: rect.x as f32,
                    y: rect.y as f32,
                    width: rect.width as f32,
                    height: rect.height as f32,
                    z: node.internals.z,
                    selected: node.node().is_selected(),
                    hidden: node.node().is_hidden(),
                }
            })
            .collect();
        self.node_rects.set_vec(rows);
    }

    /// Attach the Slint pan/zoom surface. `on_apply` receives `(x, y, zoom)`
    /// for every committed viewport.
    pub fn attach_surface<F>(&self, on_apply: F)
    where
        F: Fn(f32, f32, f32) + 'static,
    {
        let surface = SlintSurface {
            rect: self.surface_rect.clone(),
            on_apply: Box::new(on_apply),
        };
        self.controller.borrow_mut().attach_surface(Box::new(surface));
    }

    /// Drive viewport animations from a repeating timer. Keep the returned
    /// timer alive for as long as animations should run.
    pub fn start_animation_timer(&self) -> Timer {
        let controller = self.controller.clone();
        let timer = Timer::default();
        timer.start(TimerMode::Repeated, Duration::from_millis(16), move || {
            if let Ok(mut controller) = controller.try_borrow_mut() {
                controller.advance(Instant::now());
            }
        });
        timer
    }

    // === Callback factories ===

    /// Returns a callback for surface geometry reports: `(x, y, width, height)`.
    pub fn surface_geometry_callback(&self) -> impl Fn(f32, f32, f32, f32) {
        let surface_rect = self.surface_rect.clone();
        move |x, y, width, height| {
            surface_rect.set(Rect::new(x as f64, y as f64, width as f64, height as f64));
        }
    }

    /// Returns a callback for node measurement reports: `(id, width, height)`.
    pub fn node_measured_callback(&self) -> impl Fn(SharedString, f32, f32) {
        let binding = self.clone();
        move |id, width, height| {
            let update = DimensionUpdate::new(id.as_str(), width as f64, height as f64);
            let result = binding.controller.borrow_mut().update_node_dimensions(&[update]);
            if let Err(err) = result {
                warn!(error = %err, "measurement left unresolved nodes");
            }
            binding.sync();
        }
    }

    /// Returns a callback for node clicks: `(id, additive)`.
    pub fn node_click_callback(&self) -> impl Fn(SharedString, bool) {
        let binding = self.clone();
        move |id, additive| {
            let result = binding.controller.borrow_mut().handle_node_click(id.as_str(), additive);
            if let Err(err) = result {
                warn!(error = %err, "selection left unresolved nodes");
            }
            binding.sync();
        }
    }

    /// Returns a callback for the end of a drag: `(delta_x, delta_y)` in
    /// screen pixels, applied to the selected nodes.
    pub fn drag_ended_callback(&self) -> impl Fn(f32, f32) {
        let binding = self.clone();
        move |delta_x, delta_y| {
            let mut controller = binding.controller.borrow_mut();
            let zoom = controller.get_zoom();
            let selected = controller.selected_node_ids();
            let ids: Vec<&str> = selected.iter().map(String::as_str).collect();
            let result = controller.translate_nodes(&ids, delta_x as f64 / zoom, delta_y as f64 / zoom);
            drop(controller);
            if let Err(err) = result {
                warn!(error = %err, "drag left unresolved nodes");
            }
            binding.sync();
        }
    }

    /// Returns a callback for viewport changes made by Slint gestures:
    /// `(x, y, zoom)`.
    pub fn viewport_callback(&self) -> impl Fn(f32, f32, f32) {
        let controller = self.controller.clone();
        move |x, y, zoom| {
            controller.borrow_mut().set_viewport(
                Viewport::new(x as f64, y as f64, zoom as f64),
                ViewportOptions::default(),
            );
        }
    }

    /// Returns a callback deleting the current selection.
    ///
    /// The guard is awaited on the Slint event loop without holding the
    /// controller, so other callbacks keep working while it is pending. The
    /// deletion is then committed against the store as it is at that point.
    pub fn delete_selected_callback(&self) -> impl Fn() {
        let binding = self.clone();
        move || {
            let Some(pending) = binding.controller.borrow().prepare_delete_selected() else {
                return;
            };
            let binding = binding.clone();
            let spawned = slint::spawn_local(async move {
                let confirmed = pending.confirm().await;
                let deleted = binding.controller.borrow_mut().commit_deletion(&confirmed);
                debug!(
                    nodes = deleted.nodes.len(),
                    edges = deleted.edges.len(),
                    "deleted selection"
                );
                binding.sync();
            });
            if let Err(err) = spawned {
                warn!(error = %err, "could not schedule deletion");
            }
        }
    }
}
