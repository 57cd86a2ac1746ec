//! Canonical node and edge collections plus their derived lookups.
//!
//! The ordered `nodes`/`edges` vectors are the source of truth. The node
//! lookup, parent lookup, edge lookup and connection lookup are caches that
//! are thrown away and rebuilt in full after every mutation, so they can never
//! drift from the vectors.

use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::events::{FlowEvent, ListenerId, Listeners};
use crate::graph::{ConnectionLookup, HandleQuery};
use crate::hierarchy::{resolve_node, ResolvedNode};
use crate::types::{Connection, Edge, Internals, InternalNode, Node, NodeOrigin};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

struct NodeIndex {
    node_lookup: HashMap<String, InternalNode>,
    parent_lookup: HashMap<String, Vec<String>>,
    errors: Vec<FlowError>,
    /// Ids of the nodes behind `errors`, index for index.
    unresolved: Vec<String>,
}

fn build_node_index(nodes: &[Node], node_origin: NodeOrigin, elevate_on_select: bool) -> NodeIndex {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|node| (node.id.as_str(), node)).collect();

    let mut parent_lookup: HashMap<String, Vec<String>> = HashMap::new();
    for node in nodes {
        if let Some(parent_id) = &node.parent_id {
            parent_lookup
                .entry(parent_id.clone())
                .or_default()
                .push(node.id.clone());
        }
    }

    let mut errors = Vec::new();
    let mut unresolved = Vec::new();
    let mut node_lookup = HashMap::with_capacity(nodes.len());
    for node in nodes {
        let resolved =
            match resolve_node(node, |id| by_id.get(id).copied(), node_origin, elevate_on_select) {
                Ok(resolved) => resolved,
                Err(err) => {
                    warn!(node = %node.id, error = %err, "falling back to the node's own position");
                    errors.push(err);
                    unresolved.push(node.id.clone());
                    ResolvedNode::unnested(node, node_origin, elevate_on_select)
                }
            };
        node_lookup.insert(
            node.id.clone(),
            InternalNode {
                id: node.id.clone(),
                internals: Internals {
                    position_absolute: resolved.position_absolute,
                    top_left: resolved.top_left,
                    user_node: node.clone(),
                    z: resolved.z,
                },
            },
        );
    }

    NodeIndex {
        node_lookup,
        parent_lookup,
        errors,
        unresolved,
    }
}

/// Replace entries with a matching id in place, append the rest.
fn upsert<T, F>(items: &mut Vec<T>, incoming: Vec<T>, id_of: F)
where
    F: Fn(&T) -> &str,
{
    let mut index: HashMap<String, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (id_of(item).to_owned(), i))
        .collect();
    for item in incoming {
        match index.get(id_of(&item)) {
            Some(&i) => items[i] = item,
            None => {
                index.insert(id_of(&item).to_owned(), items.len());
                items.push(item);
            }
        }
    }
}

/// Node/edge store of one flow.
pub struct FlowStore {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_lookup: HashMap<String, InternalNode>,
    parent_lookup: HashMap<String, Vec<String>>,
    edge_lookup: HashMap<String, Edge>,
    connection_lookup: ConnectionLookup,
    resolution_errors: Vec<FlowError>,
    unresolved: HashSet<String>,
    node_origin: NodeOrigin,
    elevate_nodes_on_select: bool,
    listeners: Listeners,
}

impl Default for FlowStore {
    fn default() -> Self {
        Self::new(&FlowConfig::default())
    }
}

impl FlowStore {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            node_lookup: HashMap::new(),
            parent_lookup: HashMap::new(),
            edge_lookup: HashMap::new(),
            connection_lookup: ConnectionLookup::new(),
            resolution_errors: Vec::new(),
            unresolved: HashSet::new(),
            node_origin: config.node_origin,
            elevate_nodes_on_select: config.elevate_nodes_on_select,
            listeners: Listeners::new(),
        }
    }

    // === Reads ===

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_lookup.get(id).map(InternalNode::node)
    }

    pub fn internal_node(&self, id: &str) -> Option<&InternalNode> {
        self.node_lookup.get(id)
    }

    pub fn node_lookup(&self) -> &HashMap<String, InternalNode> {
        &self.node_lookup
    }

    /// Internal nodes in authored order.
    pub fn internal_nodes(&self) -> impl Iterator<Item = &InternalNode> + '_ {
        self.nodes.iter().filter_map(|node| self.node_lookup.get(&node.id))
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edge_lookup.get(id)
    }

    /// Direct children of `parent_id`, in authored order.
    pub fn children(&self, parent_id: &str) -> &[String] {
        self.parent_lookup
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn parent_lookup(&self) -> &HashMap<String, Vec<String>> {
        &self.parent_lookup
    }

    pub fn connection_lookup(&self) -> &ConnectionLookup {
        &self.connection_lookup
    }

    pub fn handle_connections(&self, query: HandleQuery<'_>) -> Vec<Connection> {
        self.connection_lookup.handle_connections(query)
    }

    /// Nodes whose absolute position could not be resolved in the last rebuild.
    pub fn resolution_errors(&self) -> &[FlowError] {
        &self.resolution_errors
    }

    pub fn node_origin(&self) -> NodeOrigin {
        self.node_origin
    }

    // === Mutations ===

    /// Mutate the node list in place, then rebuild and notify.
    ///
    /// The store always commits. Nodes whose absolute position cannot be
    /// resolved keep their own position and are listed in
    /// [`resolution_errors`](Self::resolution_errors). The returned error is
    /// the first failure this mutation introduced: a node that resolved
    /// before, or a failing node whose data changed. Failures left over from
    /// earlier mutations are not reported again.
    pub fn update_nodes<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Node>),
    {
        f(&mut self.nodes);
        let introduced = self.rebuild_nodes();
        self.listeners.emit(&FlowEvent::NodesChanged);
        introduced
    }

    /// Mutate the edge list in place, then rebuild and notify.
    pub fn update_edges<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Vec<Edge>),
    {
        f(&mut self.edges);
        self.commit_edges();
    }

    pub fn set_nodes(&mut self, nodes: Vec<Node>) -> Result<()> {
        self.update_nodes(|current| *current = nodes)
    }

    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.update_edges(|current| *current = edges);
    }

    /// Nodes with an id already in the store replace it in place.
    pub fn add_nodes(&mut self, nodes: Vec<Node>) -> Result<()> {
        self.update_nodes(|current| upsert(current, nodes, |node| node.id.as_str()))
    }

    /// Edges with an id already in the store replace it in place.
    pub fn add_edges(&mut self, edges: Vec<Edge>) {
        self.update_edges(|current| upsert(current, edges, |edge| edge.id.as_str()));
    }

    /// Replace both lists, rebuilding every lookup before any listener runs.
    pub fn set_elements(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<()> {
        self.nodes = nodes;
        self.edges = edges;
        let introduced = self.rebuild_nodes();
        self.edge_lookup = self.edges.iter().map(|e| (e.id.clone(), e.clone())).collect();
        let diff = self.connection_lookup.rebuild(&self.edges);

        self.listeners.emit(&FlowEvent::NodesChanged);
        self.listeners.emit(&FlowEvent::EdgesChanged);
        if !diff.is_empty() {
            self.listeners.emit(&FlowEvent::ConnectionsChanged(diff));
        }
        introduced
    }

    pub fn set_node_origin(&mut self, origin: NodeOrigin) -> Result<()> {
        self.node_origin = origin;
        self.update_nodes(|_| {})
    }

    pub fn set_elevate_nodes_on_select(&mut self, elevate: bool) -> Result<()> {
        self.elevate_nodes_on_select = elevate;
        self.update_nodes(|_| {})
    }

    // === Notifications ===

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&FlowEvent) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn emit(&mut self, event: &FlowEvent) {
        self.listeners.emit(event);
    }

    // === Internal ===

    /// Rebuild the node lookups. Returns the first resolution failure that
    /// was not already recorded for an unchanged node.
    fn rebuild_nodes(&mut self) -> Result<()> {
        let index = build_node_index(&self.nodes, self.node_origin, self.elevate_nodes_on_select);
        let introduced = index
            .unresolved
            .iter()
            .zip(&index.errors)
            .find(|(id, _)| {
                !self.unresolved.contains(id.as_str())
                    || self.node_lookup.get(id.as_str()).map(InternalNode::node)
                        != index.node_lookup.get(id.as_str()).map(InternalNode::node)
            })
            .map(|(_, err)| err.clone());

        self.node_lookup = index.node_lookup;
        self.parent_lookup = index.parent_lookup;
        self.resolution_errors = index.errors;
        self.unresolved = index.unresolved.into_iter().collect();
        debug!(
            nodes = self.nodes.len(),
            errors = self.resolution_errors.len(),
            "rebuilt node lookup"
        );
        introduced.map_or(Ok(()), Err)
    }

    fn commit_edges(&mut self) {
        self.edge_lookup = self.edges.iter().map(|e| (e.id.clone(), e.clone())).collect();
        let diff = self.connection_lookup.rebuild(&self.edges);
        debug!(
            edges = self.edges.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            "rebuilt edge lookup"
        );

        self.listeners.emit(&FlowEvent::EdgesChanged);
        if !diff.is_empty() {
            self.listeners.emit(&FlowEvent::ConnectionsChanged(diff));
        }
    }
}
