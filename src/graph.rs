//! Connection adjacency index.
//!
//! [`ConnectionLookup`] maps every handle that has at least one edge attached
//! to the connections on it. It is a pure cache over the edge list: it is
//! rebuilt wholesale from the edges on every edge mutation and holds nothing
//! the edges don't already encode.

use crate::types::{Connection, Edge, HandleType};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Identifies one handle on one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleKey {
    pub node_id: String,
    pub handle_type: HandleType,
    pub handle_id: Option<String>,
}

impl HandleKey {
    pub fn new(node_id: impl Into<String>, handle_type: HandleType, handle_id: Option<&str>) -> Self {
        Self {
            node_id: node_id.into(),
            handle_type,
            handle_id: handle_id.map(str::to_owned),
        }
    }
}

/// Formats as `{node_id}-{handle_type}-{handle_id}`, with `null` for the
/// default handle.
impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.node_id,
            self.handle_type,
            self.handle_id.as_deref().unwrap_or("null")
        )
    }
}

/// Arguments of [`ConnectionLookup::handle_connections`].
#[derive(Debug, Clone, Copy)]
pub struct HandleQuery<'a> {
    pub handle_type: HandleType,
    /// Handle id; `None` addresses the node's default handle.
    pub id: Option<&'a str>,
    pub node_id: &'a str,
}

/// Connections that appeared or disappeared between two rebuilds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionDiff {
    pub added: Vec<Connection>,
    pub removed: Vec<Connection>,
}

impl ConnectionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionLookup {
    /// Connections per handle, keyed by edge id inside each handle.
    handles: HashMap<HandleKey, BTreeMap<String, Connection>>,
}

impl ConnectionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index for `edges`.
    pub fn from_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = &'a Edge>,
    {
        let mut handles: HashMap<HandleKey, BTreeMap<String, Connection>> = HashMap::new();
        for edge in edges {
            let connection = edge.connection();
            let source_key = HandleKey::new(
                edge.source.as_str(),
                HandleType::Source,
                edge.source_handle.as_deref(),
            );
            let target_key = HandleKey::new(
                edge.target.as_str(),
                HandleType::Target,
                edge.target_handle.as_deref(),
            );
            handles
                .entry(source_key)
                .or_default()
                .insert(edge.id.clone(), connection.clone());
            handles
                .entry(target_key)
                .or_default()
                .insert(edge.id.clone(), connection);
        }
        Self { handles }
    }

    /// Replace the index with one built from `edges` and report what changed.
    pub fn rebuild<'a, I>(&mut self, edges: I) -> ConnectionDiff
    where
        I: IntoIterator<Item = &'a Edge>,
    {
        let next = Self::from_edges(edges);
        let before = self.all_connections();
        let after = next.all_connections();
        *self = next;

        ConnectionDiff {
            added: after.difference(&before).cloned().collect(),
            removed: before.difference(&after).cloned().collect(),
        }
    }

    fn all_connections(&self) -> BTreeSet<Connection> {
        self.handles
            .values()
            .flat_map(|connections| connections.values().cloned())
            .collect()
    }

    /// Connections on one handle; empty for unknown nodes or handles.
    pub fn handle_connections(&self, query: HandleQuery<'_>) -> Vec<Connection> {
        let key = HandleKey::new(query.node_id, query.handle_type, query.id);
        self.handles
            .get(&key)
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every connection touching `node_id`, optionally restricted to one side.
    pub fn node_connections(&self, node_id: &str, handle_type: Option<HandleType>) -> Vec<Connection> {
        let mut found: BTreeMap<&str, &Connection> = BTreeMap::new();
        for (key, connections) in &self.handles {
            if key.node_id != node_id || handle_type.is_some_and(|t| t != key.handle_type) {
                continue;
            }
            for (edge_id, connection) in connections {
                found.insert(edge_id.as_str(), connection);
            }
        }
        found.into_values().cloned().collect()
    }

    /// Number of indexed handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Keys of all indexed handles, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handles.keys().map(ToString::to_string).collect();
        keys.sort();
        keys
    }
}

/// Edges whose source or target is one of `node_ids`, in edge order.
pub fn connected_edges<'a, I>(node_ids: &HashSet<&str>, edges: I) -> Vec<&'a Edge>
where
    I: IntoIterator<Item = &'a Edge>,
{
    edges
        .into_iter()
        .filter(|edge| {
            node_ids.contains(edge.source.as_str()) || node_ids.contains(edge.target.as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges() -> Vec<Edge> {
        vec![
            Edge::new("e1", "a", "b"),
            Edge::new("e2", "a", "c").with_handles(Some("out"), Some("in")),
        ]
    }

    #[test]
    fn test_every_edge_has_two_entries() {
        let lookup = ConnectionLookup::from_edges(&edges());
        assert_eq!(
            lookup.keys(),
            vec![
                "a-source-null",
                "a-source-out",
                "b-target-null",
                "c-target-in",
            ]
        );
    }

    #[test]
    fn test_handle_connections_finds_edge() {
        let lookup = ConnectionLookup::from_edges(&edges());
        let found = lookup.handle_connections(HandleQuery {
            handle_type: HandleType::Source,
            id: Some("out"),
            node_id: "a",
        });
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].edge_id, "e2");
        assert_eq!(found[0].target_handle.as_deref(), Some("in"));
    }

    #[test]
    fn test_unknown_handle_is_empty() {
        let lookup = ConnectionLookup::from_edges(&edges());
        assert!(lookup
            .handle_connections(HandleQuery {
                handle_type: HandleType::Target,
                id: None,
                node_id: "nope",
            })
            .is_empty());
    }

    #[test]
    fn test_node_connections_by_side() {
        let lookup = ConnectionLookup::from_edges(&edges());
        assert_eq!(lookup.node_connections("a", None).len(), 2);
        assert_eq!(lookup.node_connections("a", Some(HandleType::Target)).len(), 0);
        assert_eq!(lookup.node_connections("c", Some(HandleType::Target)).len(), 1);
    }

    #[test]
    fn test_rebuild_reports_diff() {
        let mut lookup = ConnectionLookup::from_edges(&edges());
        let next = vec![Edge::new("e1", "a", "b"), Edge::new("e3", "b", "c")];
        let diff = lookup.rebuild(&next);

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].edge_id, "e3");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].edge_id, "e2");
        assert!(lookup
            .handle_connections(HandleQuery {
                handle_type: HandleType::Source,
                id: Some("out"),
                node_id: "a",
            })
            .is_empty());
    }

    #[test]
    fn test_rebuild_without_change_is_empty_diff() {
        let mut lookup = ConnectionLookup::from_edges(&edges());
        assert!(lookup.rebuild(&edges()).is_empty());
    }

    #[test]
    fn test_connected_edges() {
        let all = edges();
        let ids = HashSet::from(["c"]);
        let found = connected_edges(&ids, &all);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "e2");
    }
}
