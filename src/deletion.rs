//! Deletion cascade.
//!
//! Deleting a node deletes everything nested in it and every edge attached to
//! any of them. The full candidate set is computed first and shown to an
//! optional [`BeforeDelete`] guard, which may proceed, cancel or narrow it.

use crate::error::Result;
use crate::events::FlowEvent;
use crate::graph::connected_edges;
use crate::hierarchy::descendants;
use crate::state::FlowStore;
use crate::types::{Edge, Node};
use async_trait::async_trait;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, warn};

/// A set of nodes and edges, in authored order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Elements {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Elements {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    pub fn edge_ids(&self) -> HashSet<&str> {
        self.edges.iter().map(|edge| edge.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteDecision {
    Proceed,
    Cancel,
    /// Delete only these elements. Anything outside the candidate set is
    /// ignored.
    Subset(Elements),
}

/// Veto point awaited before anything is removed.
///
/// An `Err` is treated like [`DeleteDecision::Cancel`].
#[async_trait(?Send)]
pub trait BeforeDelete {
    async fn before_delete(&self, candidate: &Elements) -> anyhow::Result<DeleteDecision>;
}

#[async_trait(?Send)]
impl<F> BeforeDelete for F
where
    F: Fn(&Elements) -> DeleteDecision,
{
    async fn before_delete(&self, candidate: &Elements) -> anyhow::Result<DeleteDecision> {
        Ok(self(candidate))
    }
}

/// Close a set of deletable nodes and edges over the hierarchy: add the
/// deletable descendants of `node_ids` and the deletable edges touching any
/// of them.
fn close_over(store: &FlowStore, node_ids: HashSet<&str>, edge_ids: &HashSet<&str>) -> Elements {
    let nested = descendants(node_ids.iter().copied(), store.parent_lookup());
    let mut expanded: HashSet<&str> = node_ids;
    expanded.extend(nested.iter().map(String::as_str));

    let nodes: Vec<Node> = store
        .nodes()
        .iter()
        .filter(|node| expanded.contains(node.id.as_str()) && node.is_deletable())
        .cloned()
        .collect();

    let node_set: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    let touching: HashSet<&str> = connected_edges(&node_set, store.edges())
        .into_iter()
        .map(|edge| edge.id.as_str())
        .collect();
    let edges = store
        .edges()
        .iter()
        .filter(|edge| edge.is_deletable())
        .filter(|edge| touching.contains(edge.id.as_str()) || edge_ids.contains(edge.id.as_str()))
        .cloned()
        .collect();

    Elements { nodes, edges }
}

/// Everything a request to delete `node_ids` and `edge_ids` would remove.
///
/// Unknown ids and non-deletable elements are skipped.
pub fn deletion_candidates(store: &FlowStore, node_ids: &[&str], edge_ids: &[&str]) -> Elements {
    let requested: HashSet<&str> = node_ids
        .iter()
        .copied()
        .filter(|id| store.node(id).is_some_and(Node::is_deletable))
        .collect();
    let edge_ids: HashSet<&str> = edge_ids.iter().copied().collect();
    close_over(store, requested, &edge_ids)
}

/// Intersect a guard's subset with the candidates, then close it again so no
/// child outlives its parent and no cascaded edge is left dangling.
pub fn narrow_candidates(store: &FlowStore, candidate: &Elements, subset: &Elements) -> Elements {
    let candidate_nodes = candidate.node_ids();
    let candidate_edges = candidate.edge_ids();
    let kept_nodes: HashSet<&str> = subset
        .node_ids()
        .into_iter()
        .filter(|id| candidate_nodes.contains(id))
        .collect();
    let kept_edges: HashSet<&str> = subset
        .edge_ids()
        .into_iter()
        .filter(|id| candidate_edges.contains(id))
        .collect();

    let closed = close_over(store, kept_nodes, &kept_edges);
    Elements {
        nodes: closed
            .nodes
            .into_iter()
            .filter(|node| candidate_nodes.contains(node.id.as_str()))
            .collect(),
        edges: closed
            .edges
            .into_iter()
            .filter(|edge| candidate_edges.contains(edge.id.as_str()))
            .collect(),
    }
}

/// Ask `guard` about `candidate`. Without a guard the deletion proceeds; a
/// failing guard is a veto.
pub async fn ask_guard(guard: Option<&dyn BeforeDelete>, candidate: &Elements) -> DeleteDecision {
    let Some(guard) = guard else {
        return DeleteDecision::Proceed;
    };
    match guard.before_delete(candidate).await {
        Ok(decision) => decision,
        Err(err) => {
            warn!(error = %err, "deletion guard failed, nothing deleted");
            DeleteDecision::Cancel
        }
    }
}

/// Elements a guard decision removes from the store as it is now.
///
/// The confirmed ids are closed over the current hierarchy again, so ids
/// removed while the guard was pending are skipped and children added in the
/// meantime go with their parent.
pub fn resolve_decision(store: &FlowStore, candidate: &Elements, decision: &DeleteDecision) -> Elements {
    let confirmed = match decision {
        DeleteDecision::Proceed => candidate.clone(),
        DeleteDecision::Cancel => {
            debug!("deletion cancelled by guard");
            return Elements::default();
        }
        DeleteDecision::Subset(subset) => narrow_candidates(store, candidate, subset),
    };
    let node_ids: Vec<&str> = confirmed.nodes.iter().map(|node| node.id.as_str()).collect();
    let edge_ids: Vec<&str> = confirmed.edges.iter().map(|edge| edge.id.as_str()).collect();
    let current = deletion_candidates(store, &node_ids, &edge_ids);
    if current != confirmed {
        debug!(
            confirmed = confirmed.nodes.len() + confirmed.edges.len(),
            current = current.nodes.len() + current.edges.len(),
            "store changed while the deletion guard was pending"
        );
    }
    current
}

/// Remove `elements` from the store in one step, then publish
/// [`FlowEvent::ElementsDeleted`].
///
/// The error names the first node left unresolvable by the removal, such as a
/// non-deletable child of a deleted parent. The removal is committed either
/// way.
pub fn apply_deletion(store: &mut FlowStore, elements: &Elements) -> Result<()> {
    let node_ids = elements.node_ids();
    let edge_ids = elements.edge_ids();
    let nodes: Vec<Node> = store
        .nodes()
        .iter()
        .filter(|node| !node_ids.contains(node.id.as_str()))
        .cloned()
        .collect();
    let edges: Vec<Edge> = store
        .edges()
        .iter()
        .filter(|edge| !edge_ids.contains(edge.id.as_str()))
        .cloned()
        .collect();

    debug!(
        nodes = elements.nodes.len(),
        edges = elements.edges.len(),
        "deleting elements"
    );
    let committed = store.set_elements(nodes, edges);
    store.emit(&FlowEvent::ElementsDeleted {
        nodes: elements.nodes.clone(),
        edges: elements.edges.clone(),
    });
    committed
}

/// Resolve `decision` against the current store and apply it. Returns what
/// was removed.
pub fn commit_decision(store: &mut FlowStore, candidate: &Elements, decision: &DeleteDecision) -> Elements {
    let confirmed = resolve_decision(store, candidate, decision);
    if confirmed.is_empty() {
        return confirmed;
    }
    if let Err(err) = apply_deletion(store, &confirmed) {
        warn!(error = %err, "deletion left unresolvable nodes behind");
    }
    confirmed
}

/// Run the whole cascade. Returns what was deleted, empty when nothing
/// matched or the guard vetoed.
pub async fn delete_elements(
    store: &mut FlowStore,
    guard: Option<&dyn BeforeDelete>,
    node_ids: &[&str],
    edge_ids: &[&str],
) -> Elements {
    let candidate = deletion_candidates(store, node_ids, edge_ids);
    if candidate.is_empty() {
        return candidate;
    }
    let decision = ask_guard(guard, &candidate).await;
    commit_decision(store, &candidate, &decision)
}

/// A deletion whose candidate is computed but whose guard has not answered.
///
/// Owns everything the guard needs, so the store can stay unborrowed while
/// the guard is awaited.
pub struct PendingDeletion {
    candidate: Elements,
    guard: Option<Rc<dyn BeforeDelete>>,
}

impl PendingDeletion {
    pub fn new(candidate: Elements, guard: Option<Rc<dyn BeforeDelete>>) -> Self {
        Self { candidate, guard }
    }

    pub fn candidate(&self) -> &Elements {
        &self.candidate
    }

    /// Await the guard.
    pub async fn confirm(self) -> ConfirmedDeletion {
        let decision = ask_guard(self.guard.as_deref(), &self.candidate).await;
        ConfirmedDeletion {
            candidate: self.candidate,
            decision,
        }
    }
}

/// A guard's answer, to be committed against the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedDeletion {
    pub candidate: Elements,
    pub decision: DeleteDecision,
}

impl ConfirmedDeletion {
    pub fn commit(&self, store: &mut FlowStore) -> Elements {
        commit_decision(store, &self.candidate, &self.decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store() -> FlowStore {
        let mut store = FlowStore::default();
        store
            .set_nodes(vec![
                Node::new("P", 0.0, 0.0),
                Node::new("C", 10.0, 10.0).with_parent("P"),
                Node::new("G", 1.0, 1.0).with_parent("C"),
                Node::new("X", 200.0, 0.0),
            ])
            .unwrap();
        store.set_edges(vec![
            Edge::new("E", "C", "X"),
            Edge::new("F", "X", "X"),
        ]);
        store
    }

    fn node_ids(elements: &Elements) -> Vec<&str> {
        elements.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn edge_ids(elements: &Elements) -> Vec<&str> {
        elements.edges.iter().map(|e| e.id.as_str()).collect()
    }

    struct Recording {
        seen: RefCell<Option<Elements>>,
        decision: DeleteDecision,
    }

    #[async_trait(?Send)]
    impl BeforeDelete for Recording {
        async fn before_delete(&self, candidate: &Elements) -> anyhow::Result<DeleteDecision> {
            *self.seen.borrow_mut() = Some(candidate.clone());
            Ok(self.decision.clone())
        }
    }

    struct Failing;

    #[async_trait(?Send)]
    impl BeforeDelete for Failing {
        async fn before_delete(&self, _candidate: &Elements) -> anyhow::Result<DeleteDecision> {
            anyhow::bail!("backend unavailable")
        }
    }

    // ========================================================================
    // deletion_candidates()
    // ========================================================================

    #[test]
    fn test_parent_cascades_to_descendants_and_edges() {
        let store = store();
        let candidate = deletion_candidates(&store, &["P"], &[]);
        assert_eq!(node_ids(&candidate), vec!["P", "C", "G"]);
        assert_eq!(edge_ids(&candidate), vec!["E"]);
    }

    #[test]
    fn test_non_deletable_elements_are_skipped() {
        let mut store = store();
        store.update_nodes(|nodes| nodes[2].deletable = Some(false)).unwrap();
        store.update_edges(|edges| edges[1].deletable = Some(false));

        let candidate = deletion_candidates(&store, &["P"], &["F"]);
        assert_eq!(node_ids(&candidate), vec!["P", "C"]);
        assert_eq!(edge_ids(&candidate), vec!["E"]);
    }

    #[test]
    fn test_unknown_ids_yield_nothing() {
        let store = store();
        assert!(deletion_candidates(&store, &["ghost"], &["nope"]).is_empty());
    }

    // ========================================================================
    // delete_elements()
    // ========================================================================

    #[tokio::test]
    async fn test_guard_sees_full_candidate() {
        let mut store = store();
        let guard = Recording {
            seen: RefCell::new(None),
            decision: DeleteDecision::Proceed,
        };
        let deleted = delete_elements(&mut store, Some(&guard), &["C"], &[]).await;

        let seen = guard.seen.borrow().clone().unwrap();
        assert_eq!(node_ids(&seen), vec!["C", "G"]);
        assert_eq!(edge_ids(&seen), vec!["E"]);
        assert_eq!(deleted, seen);
        assert_eq!(store.nodes().len(), 2);
        assert!(store.edge("E").is_none());
        assert!(store.edge("F").is_some());
    }

    #[tokio::test]
    async fn test_cancel_is_noop() {
        let mut store = store();
        let guard = |_: &Elements| DeleteDecision::Cancel;
        let deleted = delete_elements(&mut store, Some(&guard), &["P"], &[]).await;
        assert!(deleted.is_empty());
        assert_eq!(store.nodes().len(), 4);
        assert_eq!(store.edges().len(), 2);
    }

    #[tokio::test]
    async fn test_guard_error_is_a_veto() {
        let mut store = store();
        let deleted = delete_elements(&mut store, Some(&Failing), &["X"], &[]).await;
        assert!(deleted.is_empty());
        assert_eq!(store.nodes().len(), 4);
    }

    #[tokio::test]
    async fn test_subset_is_reclosed() {
        let mut store = store();
        let subset = Elements {
            nodes: vec![Node::new("C", 0.0, 0.0), Node::new("X", 0.0, 0.0)],
            edges: Vec::new(),
        };
        let guard = move |_: &Elements| DeleteDecision::Subset(subset.clone());
        let deleted = delete_elements(&mut store, Some(&guard), &["P"], &[]).await;

        // X was never a candidate; G and E follow C back in.
        assert_eq!(node_ids(&deleted), vec!["C", "G"]);
        assert_eq!(edge_ids(&deleted), vec!["E"]);
        assert!(store.node("P").is_some());
        assert!(store.node("X").is_some());
    }

    #[tokio::test]
    async fn test_deleted_event_after_lookups_rebuilt() {
        let mut store = store();
        let observed = Rc::new(RefCell::new(Vec::new()));
        let sink = observed.clone();
        store.subscribe(move |event| {
            if let FlowEvent::ElementsDeleted { nodes, edges } = event {
                sink.borrow_mut().push((nodes.len(), edges.len()));
            }
        });

        delete_elements(&mut store, None, &["P"], &[]).await;
        assert_eq!(*observed.borrow(), vec![(3, 1)]);
        assert!(store.children("P").is_empty());
        assert!(store.connection_lookup().node_connections("C", None).is_empty());
    }

    #[tokio::test]
    async fn test_edge_only_deletion() {
        let mut store = store();
        let deleted = delete_elements(&mut store, None, &[], &["F"]).await;
        assert!(deleted.nodes.is_empty());
        assert_eq!(edge_ids(&deleted), vec!["F"]);
        assert_eq!(store.edges().len(), 1);
    }

    #[tokio::test]
    async fn test_unrelated_cycle_does_not_block_deletion() {
        let mut store = store();
        let _ = store.add_nodes(vec![
            Node::new("x", 0.0, 0.0).with_parent("y"),
            Node::new("y", 0.0, 0.0).with_parent("x"),
        ]);
        let deleted = delete_elements(&mut store, None, &["X"], &[]).await;
        assert_eq!(node_ids(&deleted), vec!["X"]);
        assert!(store.node("X").is_none());
        assert_eq!(store.resolution_errors().len(), 2);
    }

    // ========================================================================
    // PendingDeletion
    // ========================================================================

    #[tokio::test]
    async fn test_commit_follows_store_changes_while_pending() {
        let mut store = store();
        let pending = PendingDeletion::new(deletion_candidates(&store, &["C"], &[]), None);
        assert_eq!(node_ids(pending.candidate()), vec!["C", "G"]);

        let confirmed = pending.confirm().await;
        store
            .update_nodes(|nodes| {
                nodes.retain(|node| node.id != "G");
                nodes.push(Node::new("late", 0.0, 0.0).with_parent("C"));
            })
            .unwrap();

        let deleted = confirmed.commit(&mut store);
        assert_eq!(node_ids(&deleted), vec!["C", "late"]);
        assert!(store.node("late").is_none());
        assert!(store.resolution_errors().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_maps_guard_error_to_cancel() {
        let store = store();
        let pending = PendingDeletion::new(
            deletion_candidates(&store, &["X"], &[]),
            Some(Rc::new(Failing)),
        );
        let confirmed = pending.confirm().await;
        assert_eq!(confirmed.decision, DeleteDecision::Cancel);
    }
}
