//! Selected-state operations.
//!
//! Selection lives on the nodes and edges themselves (`selected`), so every
//! change goes through the store and is followed by the usual rebuild, which
//! also refreshes the z-elevation of selected nodes.

use crate::error::Result;
use crate::state::FlowStore;
use crate::types::{Edge, Node};
use std::collections::HashSet;

fn set_node_selection<F>(store: &mut FlowStore, wanted: F) -> Result<()>
where
    F: Fn(&Node) -> bool,
{
    if store.nodes().iter().all(|node| node.is_selected() == wanted(node)) {
        return Ok(());
    }
    store.update_nodes(|nodes| {
        for node in nodes.iter_mut() {
            let selected = wanted(node);
            if node.is_selected() != selected {
                node.selected = Some(selected);
            }
        }
    })
}

fn set_edge_selection<F>(store: &mut FlowStore, wanted: F)
where
    F: Fn(&Edge) -> bool,
{
    if store.edges().iter().all(|edge| edge.is_selected() == wanted(edge)) {
        return;
    }
    store.update_edges(|edges| {
        for edge in edges.iter_mut() {
            let selected = wanted(edge);
            if edge.is_selected() != selected {
                edge.selected = Some(selected);
            }
        }
    });
}

/// Select `ids`. Non-selectable nodes are skipped. Without `additive` every
/// other node and edge is unselected.
pub fn add_selected_nodes(store: &mut FlowStore, ids: &[&str], additive: bool) -> Result<()> {
    let ids: HashSet<&str> = ids.iter().copied().collect();
    if !additive {
        set_edge_selection(store, |_| false);
    }
    set_node_selection(store, |node| {
        let requested = ids.contains(node.id.as_str()) && node.is_selectable();
        requested || (additive && node.is_selected())
    })
}

/// Select `ids`. Without `additive` every other node and edge is unselected.
pub fn add_selected_edges(store: &mut FlowStore, ids: &[&str], additive: bool) -> Result<()> {
    let ids: HashSet<&str> = ids.iter().copied().collect();
    set_edge_selection(store, |edge| {
        ids.contains(edge.id.as_str()) || (additive && edge.is_selected())
    });
    if additive {
        Ok(())
    } else {
        set_node_selection(store, |_| false)
    }
}

/// Unselect the given nodes and edges; `None` on both sides clears everything.
pub fn unselect_nodes_and_edges(
    store: &mut FlowStore,
    node_ids: Option<&[&str]>,
    edge_ids: Option<&[&str]>,
) -> Result<()> {
    let clear_all = node_ids.is_none() && edge_ids.is_none();
    let nodes: HashSet<&str> = node_ids.unwrap_or_default().iter().copied().collect();
    let edges: HashSet<&str> = edge_ids.unwrap_or_default().iter().copied().collect();

    set_edge_selection(store, |edge| {
        edge.is_selected() && !clear_all && !edges.contains(edge.id.as_str())
    });
    set_node_selection(store, |node| {
        node.is_selected() && !clear_all && !nodes.contains(node.id.as_str())
    })
}

/// Click handling for a node.
///
/// An additive click toggles the node. A plain click makes it the only
/// selected element, unless it already is.
pub fn handle_interaction(store: &mut FlowStore, id: &str, additive: bool) -> Result<()> {
    let Some(node) = store.node(id) else {
        return Ok(());
    };
    if additive {
        if node.is_selected() {
            return unselect_nodes_and_edges(store, Some(&[id][..]), Some(&[][..]));
        }
        return add_selected_nodes(store, &[id], true);
    }

    let selected = selected_node_ids(store);
    if selected.len() == 1 && selected[0] == id && selected_edge_ids(store).is_empty() {
        return Ok(());
    }
    add_selected_nodes(store, &[id], false)
}

/// Selected node ids in authored order.
pub fn selected_node_ids(store: &FlowStore) -> Vec<String> {
    store
        .nodes()
        .iter()
        .filter(|node| node.is_selected())
        .map(|node| node.id.clone())
        .collect()
}

/// Selected edge ids in authored order.
pub fn selected_edge_ids(store: &FlowStore) -> Vec<String> {
    store
        .edges()
        .iter()
        .filter(|edge| edge.is_selected())
        .map(|edge| edge.id.clone())
        .collect()
}
