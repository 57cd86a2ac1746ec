//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod harness;

use flow_system::{FlowEvent, Rect, TransformSurface, Viewport};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Records every event a flow publishes.
#[derive(Default, Clone)]
pub struct EventTracker {
    pub events: Rc<RefCell<Vec<FlowEvent>>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listener to pass to `subscribe`.
    pub fn listener(&self) -> impl FnMut(&FlowEvent) + 'static {
        let events = self.events.clone();
        move |event| events.borrow_mut().push(event.clone())
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn count(&self, matches: impl Fn(&FlowEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| matches(event)).count()
    }

    /// Viewports published through `ViewportChanged`, in order.
    pub fn viewports(&self) -> Vec<Viewport> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                FlowEvent::ViewportChanged(viewport) => Some(*viewport),
                _ => None,
            })
            .collect()
    }
}

/// Pan/zoom surface with a fixed client rect that records every applied
/// viewport.
#[derive(Clone)]
pub struct RecordingSurface {
    pub rect: Rc<Cell<Rect>>,
    pub applied: Rc<RefCell<Vec<Viewport>>>,
}

impl RecordingSurface {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            rect: Rc::new(Cell::new(Rect::new(x, y, width, height))),
            applied: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn last(&self) -> Option<Viewport> {
        self.applied.borrow().last().copied()
    }
}

impl TransformSurface for RecordingSurface {
    fn bounding_rect(&self) -> Rect {
        self.rect.get()
    }

    fn apply(&mut self, viewport: Viewport) {
        self.applied.borrow_mut().push(viewport);
    }
}

/// Compare floats with a small tolerance.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
