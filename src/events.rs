//! Change notifications.
//!
//! Any UI layer attaches to a flow through [`Listeners::subscribe`] and gets a
//! [`FlowEvent`] after each mutation has been fully applied.

use crate::graph::ConnectionDiff;
use crate::types::{Edge, Node, Viewport};

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// The node list (and therefore the node lookup) was replaced.
    NodesChanged,
    /// The edge list (and therefore the edge and connection lookups) was replaced.
    EdgesChanged,
    ConnectionsChanged(ConnectionDiff),
    ViewportChanged(Viewport),
    ElementsDeleted { nodes: Vec<Node>, edges: Vec<Edge> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&FlowEvent)>;

#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&FlowEvent) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Deliver `event` to every listener in subscription order.
    pub fn emit(&mut self, event: &FlowEvent) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
