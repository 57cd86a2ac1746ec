//! Parent/child nesting: absolute positions, z-order and extents.
//!
//! Nodes live in a flat id map with explicit `parent_id` pointers. Every walk
//! up a parent chain carries a visited set, so cyclic data is reported as
//! [`FlowError::CyclicParent`] instead of looping.

use crate::config::SELECTED_NODE_Z;
use crate::error::{FlowError, Result};
use crate::geometry::{clamp_position, node_dimensions, position_with_origin};
use crate::types::{Node, NodeExtent, NodeOrigin, XYPosition};
use std::collections::{HashMap, HashSet, VecDeque};

/// Absolute position and stacking order of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedNode {
    pub position_absolute: XYPosition,
    /// Absolute top-left corner of the node's box. Differs from
    /// `position_absolute` only for root nodes with a non-zero origin.
    pub top_left: XYPosition,
    pub z: i32,
}

impl ResolvedNode {
    /// A node placed at its own position, as roots and unresolvable nodes are.
    pub fn unnested(node: &Node, default_origin: NodeOrigin, elevate_on_select: bool) -> Self {
        Self {
            position_absolute: node.position,
            top_left: position_with_origin(node, default_origin),
            z: own_z(node, elevate_on_select),
        }
    }
}

/// z of a node on its own, before nesting is taken into account.
pub fn own_z(node: &Node, elevate_on_select: bool) -> i32 {
    let elevation = if elevate_on_select && node.is_selected() {
        SELECTED_NODE_Z
    } else {
        0
    };
    node.z_index.unwrap_or(0) + elevation
}

/// Walk from `node` up to its root. The returned chain starts at `node` and
/// ends at the root.
fn parent_chain<'a, F>(node: &'a Node, lookup: &F) -> Result<Vec<&'a Node>>
where
    F: Fn(&str) -> Option<&'a Node>,
{
    let mut chain = vec![node];
    let mut visited = HashSet::from([node.id.as_str()]);
    let mut current = node;

    while let Some(parent_id) = current.parent_id.as_deref() {
        if !visited.insert(parent_id) {
            return Err(FlowError::CyclicParent {
                node_id: node.id.clone(),
            });
        }
        let parent = lookup(parent_id).ok_or_else(|| FlowError::ParentNotFound {
            node_id: current.id.clone(),
            parent_id: parent_id.to_owned(),
        })?;
        chain.push(parent);
        current = parent;
    }

    Ok(chain)
}

/// Resolve a node's absolute position and z.
///
/// A root node keeps its position. A nested node's position is relative to
/// its parent's absolute position and names the node's origin point, so the
/// origin offset (`origin * size`) is subtracted on the way down.
pub fn resolve_node<'a, F>(
    node: &'a Node,
    lookup: F,
    default_origin: NodeOrigin,
    elevate_on_select: bool,
) -> Result<ResolvedNode>
where
    F: Fn(&str) -> Option<&'a Node>,
{
    let chain = parent_chain(node, &lookup)?;
    let mut nodes = chain.iter().rev();

    // The chain always holds at least `node` itself.
    let Some(root) = nodes.next() else {
        return Ok(ResolvedNode::unnested(node, default_origin, elevate_on_select));
    };

    let mut resolved = ResolvedNode::unnested(root, default_origin, elevate_on_select);
    for child in nodes {
        let relative = position_with_origin(child, default_origin);
        resolved.position_absolute.x += relative.x;
        resolved.position_absolute.y += relative.y;
        resolved.top_left = resolved.position_absolute;
        resolved.z = own_z(child, elevate_on_select).max(resolved.z + 1);
    }

    Ok(resolved)
}

/// Absolute flow position of `node`, see [`resolve_node`].
pub fn resolve_absolute_position<'a, F>(
    node: &'a Node,
    lookup: F,
    default_origin: NodeOrigin,
) -> Result<XYPosition>
where
    F: Fn(&str) -> Option<&'a Node>,
{
    resolve_node(node, lookup, default_origin, false).map(|resolved| resolved.position_absolute)
}

/// Clamp a node's own position into its extent.
///
/// `"parent"` keeps the node's box inside the parent's size; an explicit
/// extent is interpreted in the node's own coordinate space. Nodes without an
/// extent, or whose parent is unknown or unsized, are returned unchanged.
pub fn clamp_to_extent(node: &Node, parent: Option<&Node>) -> XYPosition {
    let dimensions = node_dimensions(node);
    match node.extent {
        Some(NodeExtent::Coordinates(extent)) => clamp_position(node.position, &extent, dimensions),
        Some(NodeExtent::Parent(_)) => {
            let Some(parent) = parent else {
                return node.position;
            };
            let parent_size = node_dimensions(parent);
            if parent_size.width <= 0.0 || parent_size.height <= 0.0 {
                return node.position;
            }
            let extent = [[0.0, 0.0], [parent_size.width, parent_size.height]];
            clamp_position(node.position, &extent, dimensions)
        }
        None => node.position,
    }
}

/// Every node below `roots` in the parent lookup, breadth first.
///
/// The roots themselves are not included. Cycles in the lookup are cut.
pub fn descendants<'a, I>(roots: I, parent_lookup: &HashMap<String, Vec<String>>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    for root in roots {
        if seen.insert(root.to_owned()) {
            queue.push_back(root.to_owned());
        }
    }

    let mut found = Vec::new();
    while let Some(id) = queue.pop_front() {
        for child in parent_lookup.get(&id).into_iter().flatten() {
            if seen.insert(child.clone()) {
                found.push(child.clone());
                queue.push_back(child.clone());
            }
        }
    }
    found
}
