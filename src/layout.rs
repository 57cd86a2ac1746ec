//! Layered auto-layout of a flow's top-level nodes.
//!
//! Every root is laid out as one box covering its whole subtree, so a group
//! moves together with everything nested in it and is spaced by its real
//! extent. Edges between nested nodes count as edges between their roots.
//! Layering is done by `rust-sugiyama`.
//!
//! Requires the `layout` feature to be enabled.

use crate::error::Result;
use crate::geometry::{nodes_bounds, union_bounds};
use crate::hierarchy::descendants;
use crate::state::FlowStore;
use crate::types::{InternalNode, Rect, XYPosition};
use std::collections::{BTreeSet, HashMap};
use std::iter;
use tracing::debug;

/// Direction in which layers follow each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutDirection {
    #[default]
    Down,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoLayoutOptions {
    pub direction: LayoutDirection,
    /// Minimum gap between boxes, in flow units.
    pub spacing: f64,
    /// Lay out hidden roots too instead of leaving them in place.
    pub include_hidden_nodes: bool,
}

impl Default for AutoLayoutOptions {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::Down,
            spacing: 40.0,
            include_hidden_nodes: false,
        }
    }
}

impl AutoLayoutOptions {
    pub fn with_direction(mut self, direction: LayoutDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// New `position` of one top-level node.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: String,
    pub position: XYPosition,
}

/// A root and the flow-space box covering its subtree.
struct SubtreeBox<'a> {
    root: &'a InternalNode,
    bounds: Rect,
}

/// Boxes of the laid-out roots, plus the box index owning each node id.
fn subtree_boxes<'a>(store: &'a FlowStore, include_hidden: bool) -> (Vec<SubtreeBox<'a>>, HashMap<&'a str, usize>) {
    let mut boxes = Vec::new();
    let mut owner = HashMap::new();
    let roots = store
        .internal_nodes()
        .filter(|node| node.node().parent_id.is_none())
        .filter(|node| include_hidden || !node.node().is_hidden());

    for root in roots {
        let index = boxes.len();
        let nested: Vec<&InternalNode> = descendants([root.id.as_str()], store.parent_lookup())
            .iter()
            .filter_map(|id| store.internal_node(id))
            .collect();

        owner.insert(root.id.as_str(), index);
        owner.extend(nested.iter().map(|node| (node.id.as_str(), index)));
        boxes.push(SubtreeBox {
            root,
            bounds: nodes_bounds(iter::once(root).chain(nested)),
        });
    }
    (boxes, owner)
}

/// Compute new positions for the top-level nodes of `store`.
///
/// The layout keeps the top-left corner of the current bounds, and
/// disconnected parts of the graph are placed side by side.
pub fn compute_layout(store: &FlowStore, options: &AutoLayoutOptions) -> Vec<Placement> {
    let (boxes, owner) = subtree_boxes(store, options.include_hidden_nodes);
    if boxes.is_empty() {
        return Vec::new();
    }
    let right = options.direction == LayoutDirection::Right;

    // Layers run along y; swap axes so `Right` layers along x.
    let axes = |x: f64, y: f64| if right { (y, x) } else { (x, y) };
    let vertices: Vec<(u32, (f64, f64))> = boxes
        .iter()
        .enumerate()
        .map(|(index, subtree)| (index as u32, axes(subtree.bounds.width, subtree.bounds.height)))
        .collect();
    let links: Vec<(u32, u32)> = store
        .edges()
        .iter()
        .filter_map(|edge| {
            let source = *owner.get(edge.source.as_str())?;
            let target = *owner.get(edge.target.as_str())?;
            (source != target).then_some((source as u32, target as u32))
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let config = rust_sugiyama::configure::Config {
        vertex_spacing: options.spacing,
        ..Default::default()
    };
    let components = rust_sugiyama::from_vertices_and_edges(&vertices, &links, &config);

    let anchor = union_bounds(boxes.iter().map(|subtree| subtree.bounds)).position();

    let mut placements = Vec::with_capacity(boxes.len());
    let mut cursor = 0.0;
    for (layout, _, _) in &components {
        let cross_extent = |&(index, (x, _)): &(usize, (f64, f64))| {
            let (width, _) = vertices.get(index).map_or((0.0, 0.0), |vertex| vertex.1);
            (x, x + width)
        };
        let start = layout.iter().map(cross_extent).map(|(from, _)| from).fold(f64::INFINITY, f64::min);
        let end = layout.iter().map(cross_extent).map(|(_, to)| to).fold(f64::NEG_INFINITY, f64::max);
        if !start.is_finite() {
            continue;
        }
        let shift = cursor - start;
        cursor += end - start + options.spacing;

        for &(index, (x, y)) in layout {
            let Some(subtree) = boxes.get(index) else {
                continue;
            };
            let (dx, dy) = axes(x + shift, y);
            let delta_x = anchor.x + dx - subtree.bounds.x;
            let delta_y = anchor.y + dy - subtree.bounds.y;
            let position = subtree.root.node().position;
            placements.push(Placement {
                id: subtree.root.id.clone(),
                position: XYPosition::new(position.x + delta_x, position.y + delta_y),
            });
        }
    }

    debug!(
        roots = boxes.len(),
        components = components.len(),
        "computed layout"
    );
    placements
}

/// Write placements back into the store in one mutation. Nested nodes keep
/// their relative positions and move with their root.
pub fn apply_layout(store: &mut FlowStore, placements: &[Placement]) -> Result<()> {
    if placements.is_empty() {
        return Ok(());
    }
    let by_id: HashMap<&str, XYPosition> = placements
        .iter()
        .map(|placement| (placement.id.as_str(), placement.position))
        .collect();
    store.update_nodes(|nodes| {
        for node in nodes.iter_mut() {
            if let Some(position) = by_id.get(node.id.as_str()) {
                node.position = *position;
            }
        }
    })
}
