use thiserror::Error;

/// Errors raised for malformed caller data.
///
/// Missing ids are never errors: lookups return `None` or an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// The `parent_id` chain of a node revisits a node it already passed.
    #[error("node {node_id} has a cyclic parent chain")]
    CyclicParent { node_id: String },
    /// A node names a parent that is not in the store.
    #[error("parent {parent_id} of node {node_id} not found")]
    ParentNotFound { node_id: String, parent_id: String },
}

impl FlowError {
    /// Id of the node whose resolution failed.
    pub fn node_id(&self) -> &str {
        match self {
            FlowError::CyclicParent { node_id } => node_id,
            FlowError::ParentNotFound { node_id, .. } => node_id,
        }
    }
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;
