//! High-level facade over one flow.
//!
//! [`FlowController`] owns the node/edge store, the viewport engine and the
//! deletion hooks, and is the surface a UI binding talks to.
//!
//! # Example
//!
//! ```
//! use flow_system::{FlowController, FlowConfig, Node, NodePatch, UpdateOptions};
//!
//! # fn main() -> Result<(), flow_system::FlowError> {
//! let mut flow = FlowController::new(FlowConfig::default());
//! flow.set_nodes(vec![Node::new("a", 0.0, 0.0)])?;
//! flow.update_node("a", |node: &Node| NodePatch {
//!     hidden: Some(!node.is_hidden()),
//!     ..Default::default()
//! }, UpdateOptions::default())?;
//! assert!(flow.get_node("a").unwrap().is_hidden());
//! # Ok(())
//! # }
//! ```

use crate::config::FlowConfig;
use crate::deletion::{self, BeforeDelete, ConfirmedDeletion, Elements, PendingDeletion};
use crate::error::Result;
use crate::events::{FlowEvent, ListenerId};
use crate::geometry::{nodes_bounds, rect_to_flow, rects_intersect};
use crate::graph::HandleQuery;
use crate::hierarchy::clamp_to_extent;
use crate::hit_test::{intersecting_nodes, nodes_in_selection_box, IntersectionTarget};
use crate::selection;
use crate::state::FlowStore;
use crate::tracking::{self, DimensionUpdate};
use crate::types::{
    Connection, Dimensions, Edge, FlowSnapshot, InternalNode, Node, NodeExtent, NodeOrigin, Rect,
    Viewport, XYPosition,
};
use crate::viewport::{viewport_for_bounds, TransformSurface, ViewportEngine, ViewportOptions, ViewportTransition};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Replace the element (or its data) instead of merging into it.
    pub replace: bool,
}

impl UpdateOptions {
    pub fn replace() -> Self {
        Self { replace: true }
    }
}

/// Partial node. Unset fields are left alone when merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub position: Option<XYPosition>,
    pub data: Option<Value>,
    pub node_type: Option<String>,
    pub measured: Option<Dimensions>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub parent_id: Option<String>,
    pub origin: Option<NodeOrigin>,
    pub extent: Option<NodeExtent>,
    pub expand_parent: Option<bool>,
    pub selected: Option<bool>,
    pub hidden: Option<bool>,
    pub z_index: Option<i32>,
    pub deletable: Option<bool>,
    pub selectable: Option<bool>,
}

impl NodePatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            position: Some(XYPosition::new(x, y)),
            ..Default::default()
        }
    }

    fn apply(self, node: &mut Node) {
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(data) = self.data {
            node.data = data;
        }
        node.node_type = self.node_type.or(node.node_type.take());
        node.measured = self.measured.or(node.measured);
        node.width = self.width.or(node.width);
        node.height = self.height.or(node.height);
        node.parent_id = self.parent_id.or(node.parent_id.take());
        node.origin = self.origin.or(node.origin);
        node.extent = self.extent.or(node.extent);
        node.expand_parent = self.expand_parent.or(node.expand_parent);
        node.selected = self.selected.or(node.selected);
        node.hidden = self.hidden.or(node.hidden);
        node.z_index = self.z_index.or(node.z_index);
        node.deletable = self.deletable.or(node.deletable);
        node.selectable = self.selectable.or(node.selectable);
    }
}

/// Partial edge. Unset fields are left alone when merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgePatch {
    pub source: Option<String>,
    pub target: Option<String>,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub data: Option<Value>,
    pub selected: Option<bool>,
    pub hidden: Option<bool>,
    pub deletable: Option<bool>,
}

impl EdgePatch {
    fn apply(self, edge: &mut Edge) {
        if let Some(source) = self.source {
            edge.source = source;
        }
        if let Some(target) = self.target {
            edge.target = target;
        }
        if let Some(data) = self.data {
            edge.data = data;
        }
        edge.source_handle = self.source_handle.or(edge.source_handle.take());
        edge.target_handle = self.target_handle.or(edge.target_handle.take());
        edge.selected = self.selected.or(edge.selected);
        edge.hidden = self.hidden.or(edge.hidden);
        edge.deletable = self.deletable.or(edge.deletable);
    }
}

/// Either a [`NodePatch`] or a closure computing one from the current node.
pub trait NodeUpdate {
    fn into_patch(self, current: &Node) -> NodePatch;
}

impl NodeUpdate for NodePatch {
    fn into_patch(self, _current: &Node) -> NodePatch {
        self
    }
}

impl<F> NodeUpdate for F
where
    F: FnOnce(&Node) -> NodePatch,
{
    fn into_patch(self, current: &Node) -> NodePatch {
        self(current)
    }
}

/// Either an [`EdgePatch`] or a closure computing one from the current edge.
pub trait EdgeUpdate {
    fn into_patch(self, current: &Edge) -> EdgePatch;
}

impl EdgeUpdate for EdgePatch {
    fn into_patch(self, _current: &Edge) -> EdgePatch {
        self
    }
}

impl<F> EdgeUpdate for F
where
    F: FnOnce(&Edge) -> EdgePatch,
{
    fn into_patch(self, current: &Edge) -> EdgePatch {
        self(current)
    }
}

/// Either a data value or a closure computing one from the current data.
pub trait DataUpdate {
    fn into_data(self, current: &Value) -> Value;
}

impl DataUpdate for Value {
    fn into_data(self, _current: &Value) -> Value {
        self
    }
}

impl<F> DataUpdate for F
where
    F: FnOnce(&Value) -> Value,
{
    fn into_data(self, current: &Value) -> Value {
        self(current)
    }
}

/// Shallow merge of two data objects; anything that isn't an object pair is
/// replaced.
fn merge_data(current: &Value, update: Value) -> Value {
    match (current, update) {
        (Value::Object(current), Value::Object(update)) => {
            let mut merged = current.clone();
            merged.extend(update);
            Value::Object(merged)
        }
        (_, update) => update,
    }
}

#[derive(Debug, Clone, Default)]
pub struct FitViewOptions {
    /// Defaults to the configured `fit_view_padding`.
    pub padding: Option<f64>,
    pub include_hidden_nodes: bool,
    /// Restrict the fit to these node ids.
    pub nodes: Option<Vec<String>>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub viewport: ViewportOptions,
}

type DeleteCallback = Box<dyn FnMut(&Elements)>;

/// Query and mutation facade of one flow.
pub struct FlowController {
    config: FlowConfig,
    store: FlowStore,
    viewport: ViewportEngine,
    before_delete: Option<Rc<dyn BeforeDelete>>,
    on_delete: Option<DeleteCallback>,
}

impl Default for FlowController {
    fn default() -> Self {
        Self::new(FlowConfig::default())
    }
}

impl FlowController {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            store: FlowStore::new(&config),
            viewport: ViewportEngine::new(&config),
            config,
            before_delete: None,
            on_delete: None,
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn store(&self) -> &FlowStore {
        &self.store
    }

    pub fn viewport_engine(&self) -> &ViewportEngine {
        &self.viewport
    }

    // === Nodes and edges ===

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.store.node(id)
    }

    pub fn get_nodes(&self) -> &[Node] {
        self.store.nodes()
    }

    pub fn get_internal_node(&self, id: &str) -> Option<&InternalNode> {
        self.store.internal_node(id)
    }

    pub fn get_edge(&self, id: &str) -> Option<&Edge> {
        self.store.edge(id)
    }

    pub fn get_edges(&self) -> &[Edge] {
        self.store.edges()
    }

    pub fn set_nodes(&mut self, nodes: Vec<Node>) -> Result<()> {
        self.store.set_nodes(nodes)
    }

    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.store.set_edges(edges);
    }

    pub fn add_nodes(&mut self, nodes: Vec<Node>) -> Result<()> {
        self.store.add_nodes(nodes)
    }

    pub fn add_edges(&mut self, edges: Vec<Edge>) {
        self.store.add_edges(edges);
    }

    pub fn handle_connections(&self, query: HandleQuery<'_>) -> Vec<Connection> {
        self.store.handle_connections(query)
    }

    /// Owned deep copy of the authored state.
    pub fn to_object(&self) -> FlowSnapshot {
        FlowSnapshot {
            nodes: self.store.nodes().to_vec(),
            edges: self.store.edges().to_vec(),
            viewport: self.viewport.viewport(),
        }
    }

    // === Updates ===

    /// Patch or replace one node. Unknown ids are a no-op.
    ///
    /// A changed position is clamped into the node's extent.
    pub fn update_node<U>(&mut self, id: &str, update: U, options: UpdateOptions) -> Result<()>
    where
        U: NodeUpdate,
    {
        let Some(current) = self.store.node(id) else {
            return Ok(());
        };
        let patch = update.into_patch(current);
        let mut next = if options.replace {
            Node {
                id: current.id.clone(),
                ..Default::default()
            }
        } else {
            current.clone()
        };
        patch.apply(&mut next);

        if next.extent.is_some() {
            let parent = next.parent_id.as_deref().and_then(|parent_id| self.store.node(parent_id));
            next.position = clamp_to_extent(&next, parent);
        }
        self.replace_node(next)
    }

    /// Merge into (or replace) the data of one node.
    pub fn update_node_data<U>(&mut self, id: &str, update: U, options: UpdateOptions) -> Result<()>
    where
        U: DataUpdate,
    {
        let Some(current) = self.store.node(id) else {
            return Ok(());
        };
        let data = update.into_data(&current.data);
        let mut next = current.clone();
        next.data = if options.replace { data } else { merge_data(&current.data, data) };
        self.replace_node(next)
    }

    /// Patch or replace one edge. Unknown ids are a no-op.
    pub fn update_edge<U>(&mut self, id: &str, update: U, options: UpdateOptions)
    where
        U: EdgeUpdate,
    {
        let Some(current) = self.store.edge(id) else {
            return;
        };
        let patch = update.into_patch(current);
        let mut next = if options.replace {
            Edge {
                id: current.id.clone(),
                source: current.source.clone(),
                target: current.target.clone(),
                ..Default::default()
            }
        } else {
            current.clone()
        };
        patch.apply(&mut next);
        self.replace_edge(next);
    }

    /// Merge into (or replace) the data of one edge.
    pub fn update_edge_data<U>(&mut self, id: &str, update: U, options: UpdateOptions)
    where
        U: DataUpdate,
    {
        let Some(current) = self.store.edge(id) else {
            return;
        };
        let data = update.into_data(&current.data);
        let mut next = current.clone();
        next.data = if options.replace { data } else { merge_data(&current.data, data) };
        self.replace_edge(next);
    }

    fn replace_node(&mut self, next: Node) -> Result<()> {
        self.store.update_nodes(|nodes| {
            if let Some(slot) = nodes.iter_mut().find(|node| node.id == next.id) {
                *slot = next;
            }
        })
    }

    fn replace_edge(&mut self, next: Edge) {
        self.store.update_edges(|edges| {
            if let Some(slot) = edges.iter_mut().find(|edge| edge.id == next.id) {
                *slot = next;
            }
        });
    }

    /// Move nodes by a flow-space delta, e.g. at the end of a drag.
    ///
    /// Nodes nested inside another moved node follow their ancestor and are
    /// not moved twice. Positions are clamped into each node's extent.
    pub fn translate_nodes(&mut self, ids: &[&str], dx: f64, dy: f64) -> Result<()> {
        let moving: HashSet<&str> = ids.iter().copied().filter(|id| self.store.node(id).is_some()).collect();
        if moving.is_empty() || (dx == 0.0 && dy == 0.0) {
            return Ok(());
        }

        let mut moved: HashMap<String, Node> = HashMap::new();
        for node in self.store.nodes() {
            if !moving.contains(node.id.as_str()) || self.has_moving_ancestor(node, &moving) {
                continue;
            }
            let mut next = node.clone();
            next.position.x += dx;
            next.position.y += dy;
            let parent = next.parent_id.as_deref().and_then(|parent_id| self.store.node(parent_id));
            next.position = clamp_to_extent(&next, parent);
            moved.insert(next.id.clone(), next);
        }

        debug!(count = moved.len(), dx, dy, "translating nodes");
        self.store.update_nodes(|nodes| {
            for node in nodes.iter_mut() {
                if let Some(next) = moved.remove(&node.id) {
                    *node = next;
                }
            }
        })
    }

    fn has_moving_ancestor(&self, node: &Node, moving: &HashSet<&str>) -> bool {
        let mut visited = HashSet::new();
        let mut parent_id = node.parent_id.as_deref();
        while let Some(id) = parent_id {
            if moving.contains(id) {
                return true;
            }
            if !visited.insert(id) {
                return false;
            }
            parent_id = self.store.node(id).and_then(|parent| parent.parent_id.as_deref());
        }
        false
    }

    /// Arrange the top-level nodes in layers, each group moving with its
    /// children.
    #[cfg(feature = "layout")]
    pub fn auto_layout(&mut self, options: &crate::layout::AutoLayoutOptions) -> Result<()> {
        let placements = crate::layout::compute_layout(&self.store, options);
        crate::layout::apply_layout(&mut self.store, &placements)
    }

    /// Store measured sizes reported by the UI layer.
    pub fn update_node_dimensions(&mut self, updates: &[DimensionUpdate]) -> Result<bool> {
        tracking::update_node_dimensions(&mut self.store, updates)
    }

    // === Queries ===

    /// Nodes intersecting `target`, optionally only among `candidates`.
    ///
    /// Candidates are matched to store nodes by id. An unknown target node
    /// yields no results.
    pub fn get_intersecting_nodes(
        &self,
        target: &IntersectionTarget,
        partially: bool,
        candidates: Option<&[Node]>,
    ) -> Vec<Node> {
        let Some((area, exclude)) = target.resolve(self.store.node_lookup()) else {
            return Vec::new();
        };
        let pool: Vec<&InternalNode> = match candidates {
            Some(candidates) => candidates
                .iter()
                .filter_map(|node| self.store.internal_node(&node.id))
                .collect(),
            None => self.store.internal_nodes().collect(),
        };
        intersecting_nodes(&area, exclude, pool, partially)
            .into_iter()
            .map(|node| node.node().clone())
            .collect()
    }

    /// Whether `target` intersects `area`. Unknown target nodes never do.
    pub fn is_node_intersecting(&self, target: &IntersectionTarget, area: &Rect, partially: bool) -> bool {
        target
            .resolve(self.store.node_lookup())
            .is_some_and(|(rect, _)| rects_intersect(&rect, area, partially))
    }

    /// Absolute bounds of the given nodes; the zero rect when none are known.
    pub fn get_nodes_bounds(&self, ids: &[&str]) -> Rect {
        nodes_bounds(ids.iter().filter_map(|id| self.store.internal_node(id)))
    }

    /// Visible nodes inside a selection box given in surface-relative screen
    /// coordinates.
    pub fn get_nodes_inside(&self, screen_rect: &Rect, partially: bool) -> Vec<String> {
        let area = rect_to_flow(screen_rect, &self.viewport.viewport());
        nodes_in_selection_box(&area, self.store.internal_nodes(), partially)
    }

    // === Selection ===

    pub fn add_selected_nodes(&mut self, ids: &[&str], additive: bool) -> Result<()> {
        selection::add_selected_nodes(&mut self.store, ids, additive)
    }

    pub fn add_selected_edges(&mut self, ids: &[&str], additive: bool) -> Result<()> {
        selection::add_selected_edges(&mut self.store, ids, additive)
    }

    pub fn unselect_nodes_and_edges(&mut self, node_ids: Option<&[&str]>, edge_ids: Option<&[&str]>) -> Result<()> {
        selection::unselect_nodes_and_edges(&mut self.store, node_ids, edge_ids)
    }

    pub fn handle_node_click(&mut self, id: &str, additive: bool) -> Result<()> {
        selection::handle_interaction(&mut self.store, id, additive)
    }

    pub fn selected_node_ids(&self) -> Vec<String> {
        selection::selected_node_ids(&self.store)
    }

    pub fn selected_edge_ids(&self) -> Vec<String> {
        selection::selected_edge_ids(&self.store)
    }

    // === Deletion ===

    pub fn set_before_delete<G>(&mut self, guard: G)
    where
        G: BeforeDelete + 'static,
    {
        self.before_delete = Some(Rc::new(guard));
    }

    pub fn clear_before_delete(&mut self) {
        self.before_delete = None;
    }

    /// Called with the removed elements after every completed deletion.
    pub fn on_delete<F>(&mut self, callback: F)
    where
        F: FnMut(&Elements) + 'static,
    {
        self.on_delete = Some(Box::new(callback));
    }

    /// Delete nodes (with their descendants and attached edges) and edges.
    ///
    /// Returns the removed elements; empty when the guard vetoed or nothing
    /// matched. Nodes the removal leaves unresolvable, such as a
    /// non-deletable child of a deleted parent, are logged and listed in the
    /// store's resolution errors.
    pub async fn delete_elements(&mut self, node_ids: &[&str], edge_ids: &[&str]) -> Elements {
        let Some(pending) = self.prepare_deletion(node_ids, edge_ids) else {
            return Elements::default();
        };
        let confirmed = pending.confirm().await;
        self.commit_deletion(&confirmed)
    }

    /// Delete the selected nodes and edges.
    pub async fn delete_selected(&mut self) -> Elements {
        let Some(pending) = self.prepare_delete_selected() else {
            return Elements::default();
        };
        let confirmed = pending.confirm().await;
        self.commit_deletion(&confirmed)
    }

    /// First half of [`delete_elements`](Self::delete_elements): compute the
    /// candidate and take the guard. `None` when nothing would be deleted.
    ///
    /// The pending deletion does not borrow the controller, so a binding can
    /// release it while the guard is awaited and commit afterwards.
    pub fn prepare_deletion(&self, node_ids: &[&str], edge_ids: &[&str]) -> Option<PendingDeletion> {
        let candidate = deletion::deletion_candidates(&self.store, node_ids, edge_ids);
        if candidate.is_empty() {
            return None;
        }
        Some(PendingDeletion::new(candidate, self.before_delete.clone()))
    }

    pub fn prepare_delete_selected(&self) -> Option<PendingDeletion> {
        let nodes = self.selected_node_ids();
        let edges = self.selected_edge_ids();
        let node_ids: Vec<&str> = nodes.iter().map(String::as_str).collect();
        let edge_ids: Vec<&str> = edges.iter().map(String::as_str).collect();
        self.prepare_deletion(&node_ids, &edge_ids)
    }

    /// Apply a confirmed deletion to the store as it is now and call
    /// `on_delete` with what was removed.
    pub fn commit_deletion(&mut self, confirmed: &ConfirmedDeletion) -> Elements {
        let deleted = confirmed.commit(&mut self.store);
        if !deleted.is_empty() {
            if let Some(callback) = self.on_delete.as_mut() {
                callback(&deleted);
            }
        }
        deleted
    }

    // === Viewport ===

    pub fn attach_surface(&mut self, surface: Box<dyn TransformSurface>) {
        self.viewport.attach_surface(surface);
    }

    pub fn detach_surface(&mut self) -> Option<Box<dyn TransformSurface>> {
        self.viewport.detach_surface()
    }

    pub fn get_viewport(&self) -> Viewport {
        self.viewport.viewport()
    }

    pub fn get_zoom(&self) -> f64 {
        self.viewport.zoom()
    }

    fn track_viewport<F>(&mut self, f: F) -> ViewportTransition
    where
        F: FnOnce(&mut ViewportEngine) -> ViewportTransition,
    {
        let before = self.viewport.viewport();
        let transition = f(&mut self.viewport);
        self.notify_viewport(before);
        transition
    }

    fn notify_viewport(&mut self, before: Viewport) {
        let now = self.viewport.viewport();
        if now != before {
            self.store.emit(&FlowEvent::ViewportChanged(now));
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport, options: ViewportOptions) -> ViewportTransition {
        self.track_viewport(|engine| engine.set_viewport(viewport, options))
    }

    pub fn set_zoom(&mut self, zoom: f64, options: ViewportOptions) -> ViewportTransition {
        self.track_viewport(|engine| engine.zoom_to(zoom, options))
    }

    pub fn zoom_in(&mut self, options: ViewportOptions) -> ViewportTransition {
        self.track_viewport(|engine| engine.zoom_in(options))
    }

    pub fn zoom_out(&mut self, options: ViewportOptions) -> ViewportTransition {
        self.track_viewport(|engine| engine.zoom_out(options))
    }

    pub fn set_center(&mut self, x: f64, y: f64, zoom: Option<f64>, options: ViewportOptions) -> ViewportTransition {
        self.track_viewport(|engine| engine.set_center(x, y, zoom, options))
    }

    pub fn fit_bounds(&mut self, bounds: &Rect, padding: Option<f64>, options: ViewportOptions) -> ViewportTransition {
        let padding = padding.unwrap_or(self.config.fit_view_padding);
        self.track_viewport(|engine| engine.fit_bounds(bounds, padding, options))
    }

    /// Fit the visible (or requested) nodes into the surface.
    ///
    /// Resolves `false` when there is no surface or nothing to fit.
    pub fn fit_view(&mut self, options: FitViewOptions) -> ViewportTransition {
        let Some(surface) = self.viewport.surface_rect() else {
            return ViewportTransition::ready(false);
        };
        let requested: Option<HashSet<&str>> = options
            .nodes
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect());
        let fitted: Vec<&InternalNode> = self
            .store
            .internal_nodes()
            .filter(|node| options.include_hidden_nodes || !node.node().is_hidden())
            .filter(|node| requested.as_ref().map_or(true, |ids| ids.contains(node.id.as_str())))
            .collect();
        if fitted.is_empty() {
            return ViewportTransition::ready(false);
        }

        let bounds = nodes_bounds(fitted);
        let target = viewport_for_bounds(
            &bounds,
            surface.width,
            surface.height,
            options.min_zoom.unwrap_or(self.viewport.min_zoom()),
            options.max_zoom.unwrap_or(self.viewport.max_zoom()),
            options.padding.unwrap_or(self.config.fit_view_padding),
        );
        self.set_viewport(target, options.viewport)
    }

    pub fn set_min_zoom(&mut self, min_zoom: f64) {
        let before = self.viewport.viewport();
        self.viewport.set_min_zoom(min_zoom);
        self.notify_viewport(before);
    }

    pub fn set_max_zoom(&mut self, max_zoom: f64) {
        let before = self.viewport.viewport();
        self.viewport.set_max_zoom(max_zoom);
        self.notify_viewport(before);
    }

    pub fn is_animating(&self) -> bool {
        self.viewport.is_animating()
    }

    /// Drive a running viewport transition; call once per frame.
    pub fn advance(&mut self, now: Instant) -> Option<Viewport> {
        let step = self.viewport.advance(now)?;
        self.store.emit(&FlowEvent::ViewportChanged(step));
        Some(step)
    }

    /// Client position to flow space, snapped when snapping is on.
    pub fn screen_to_flow_position(&self, client: XYPosition) -> XYPosition {
        self.viewport.screen_to_flow(client, self.config.active_snap_grid())
    }

    pub fn flow_to_screen_position(&self, flow: XYPosition) -> XYPosition {
        self.viewport.flow_to_screen(flow)
    }

    // === Notifications ===

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&FlowEvent) + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.store.unsubscribe(id)
    }
}
