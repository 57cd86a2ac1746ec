//! Measurement reports from the UI layer.
//!
//! The renderer measures every node after layout and reports the size back
//! through [`update_node_dimensions`]. Nodes with `expand_parent` then grow
//! their parent so the parent keeps containing them.

use crate::error::Result;
use crate::geometry::{node_dimensions, position_with_origin};
use crate::state::FlowStore;
use crate::types::{Dimensions, Node, NodeOrigin};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// One measured size reported by the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionUpdate {
    pub id: String,
    pub dimensions: Dimensions,
}

impl DimensionUpdate {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            dimensions: Dimensions::new(width, height),
        }
    }
}

/// Store measured sizes and run the expand-parent pass.
///
/// Unknown ids and unchanged sizes are ignored. Returns whether the store
/// changed; an unchanged store emits nothing.
pub fn update_node_dimensions(store: &mut FlowStore, updates: &[DimensionUpdate]) -> Result<bool> {
    let changed: Vec<&DimensionUpdate> = updates
        .iter()
        .filter(|update| {
            store
                .node(&update.id)
                .is_some_and(|node| node.measured != Some(update.dimensions))
        })
        .collect();
    if changed.is_empty() {
        return Ok(false);
    }

    let node_origin = store.node_origin();
    store.update_nodes(|nodes| {
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();

        let mut expanding = VecDeque::new();
        for update in &changed {
            if let Some(&i) = index.get(&update.id) {
                nodes[i].measured = Some(update.dimensions);
                expanding.push_back(i);
            }
        }
        expand_parents(nodes, &index, expanding, node_origin);
    })?;
    debug!(count = changed.len(), "applied node measurements");
    Ok(true)
}

/// Grow the parents of expanding nodes, walking up while parents expand too.
fn expand_parents(
    nodes: &mut [Node],
    index: &HashMap<String, usize>,
    mut queue: VecDeque<usize>,
    node_origin: NodeOrigin,
) {
    let mut grown = HashSet::new();
    while let Some(child) = queue.pop_front() {
        if !nodes[child].expands_parent() {
            continue;
        }
        let Some(&parent) = nodes[child].parent_id.as_ref().and_then(|id| index.get(id)) else {
            continue;
        };
        if expand_parent(nodes, child, parent, node_origin) && grown.insert(parent) {
            queue.push_back(parent);
        }
    }
}

/// Grow `parent` to contain `child`. Returns whether the parent changed.
///
/// A child sticking out to the left or top moves the parent by that amount
/// and shifts every child of the parent back, so absolute positions stay put.
fn expand_parent(
    nodes: &mut [Node],
    child: usize,
    parent: usize,
    node_origin: NodeOrigin,
) -> bool {
    let child_position = position_with_origin(&nodes[child], node_origin);
    let child_size = node_dimensions(&nodes[child]);
    let parent_size = node_dimensions(&nodes[parent]);

    let shift_x = child_position.x.min(0.0);
    let shift_y = child_position.y.min(0.0);
    let width = parent_size.width.max(child_position.x + child_size.width) - shift_x;
    let height = parent_size.height.max(child_position.y + child_size.height) - shift_y;

    if shift_x == 0.0 && shift_y == 0.0 && width == parent_size.width && height == parent_size.height {
        return false;
    }

    let parent_node = &mut nodes[parent];
    parent_node.position.x += shift_x;
    parent_node.position.y += shift_y;
    parent_node.width = Some(width);
    parent_node.height = Some(height);
    parent_node.measured = Some(Dimensions::new(width, height));

    if shift_x != 0.0 || shift_y != 0.0 {
        let parent_id = parent_node.id.clone();
        for sibling in nodes.iter_mut() {
            if sibling.parent_id.as_deref() == Some(parent_id.as_str()) {
                sibling.position.x -= shift_x;
                sibling.position.y -= shift_y;
            }
        }
    }
    debug!(parent = %nodes[parent].id, width, height, "expanded parent");
    true
}
