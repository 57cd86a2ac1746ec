//! # Flow System
//!
//! A rendering-framework-agnostic graph and viewport engine for node-based
//! flow editors: state machines, data-flow diagrams, shader graphs and any
//! other nodes-and-edges interface.
//!
//! ## Features
//!
//! - **Canonical store** - nodes and edges with lookups rebuilt on every mutation
//! - **Nesting** - parent/child hierarchies with absolute position resolution,
//!   z-ordering, extents and expand-parent
//! - **Connection lookup** - per-handle adjacency, diffed on every edge change
//! - **Viewport engine** - pan/zoom with clamping and animated transitions
//! - **Deletion cascade** - descendants and attached edges, behind an async guard
//! - **Geometry queries** - bounds, intersections and box selection
//!
//! ## Quick Start
//!
//! ```
//! use flow_system::{Edge, FlowConfig, FlowController, Node};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), flow_system::FlowError> {
//! let mut flow = FlowController::new(FlowConfig::default());
//! flow.set_nodes(vec![
//!     Node::new("group", 100.0, 100.0).with_measured(300.0, 200.0),
//!     Node::new("child", 10.0, 10.0).with_parent("group"),
//! ])?;
//! flow.set_edges(vec![Edge::new("e1", "group", "child")]);
//!
//! let child = flow.get_internal_node("child").unwrap();
//! assert_eq!(child.position_absolute().x, 110.0);
//!
//! let deleted = flow.delete_elements(&["group"], &[]).await;
//! assert_eq!(deleted.edges.len(), 1);
//! assert!(flow.get_nodes().is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Optional features
//!
//! - `layout` - Sugiyama auto-layout via `rust-sugiyama`
//! - `slint` - [`slint_binding::SlintFlowBinding`], callbacks and models for Slint UIs

pub mod config;
pub mod controller;
pub mod deletion;
pub mod error;
pub mod events;
pub mod geometry;
pub mod graph;
pub mod hierarchy;
pub mod selection;
pub mod state;
pub mod tracking;
pub mod types;
pub mod viewport;

#[cfg(feature = "layout")]
pub mod layout;

#[cfg(feature = "slint")]
pub mod slint_binding;

pub use config::FlowConfig;
pub use controller::{
    DataUpdate, EdgePatch, EdgeUpdate, FitViewOptions, FlowController, NodePatch, NodeUpdate,
    UpdateOptions,
};
pub use deletion::{BeforeDelete, ConfirmedDeletion, DeleteDecision, Elements, PendingDeletion};
pub use error::{FlowError, Result};
pub use events::{FlowEvent, ListenerId};
pub use geometry::{
    internal_node_to_rect, is_rect_object, node_to_rect, overlap_area, point_to_flow,
    point_to_screen, union_bounds,
};
pub use graph::{ConnectionDiff, ConnectionLookup, HandleKey, HandleQuery};
pub use hierarchy::resolve_absolute_position;
pub use hit_test::{IntersectionTarget, NodeGeometry};
pub use state::FlowStore;
pub use tracking::DimensionUpdate;
pub use types::{
    BoundingBox, Connection, CoordinateExtent, Dimensions, Edge, FlowSnapshot, HandleType,
    InternalNode, Internals, Node, NodeExtent, NodeOrigin, Rect, Viewport, XYPosition,
};
pub use viewport::{
    ease, viewport_for_bounds, TransformSurface, ViewportEngine, ViewportOptions,
    ViewportTransition,
};
