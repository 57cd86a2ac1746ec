//! Per-flow settings.
//!
//! Every field has a default, so a partial JSON object (or none at all) is a
//! valid configuration.

use crate::types::{NodeOrigin, Viewport};
use serde::{Deserialize, Serialize};

/// Offset added to the z of selected nodes when `elevate_nodes_on_select` is on.
pub const SELECTED_NODE_Z: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Factor applied by `zoom_in` / `zoom_out`.
    pub zoom_step: f64,
    pub node_origin: NodeOrigin,
    pub snap_to_grid: bool,
    pub snap_grid: [f64; 2],
    pub elevate_nodes_on_select: bool,
    /// Fraction of the bounds added around them by `fit_view`.
    pub fit_view_padding: f64,
    pub default_viewport: Viewport,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 2.0,
            zoom_step: 1.2,
            node_origin: [0.0, 0.0],
            snap_to_grid: false,
            snap_grid: [15.0, 15.0],
            elevate_nodes_on_select: true,
            fit_view_padding: 0.1,
            default_viewport: Viewport::default(),
        }
    }
}

impl FlowConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Snap grid to use for screen to flow conversions, if snapping is on.
    pub fn active_snap_grid(&self) -> Option<[f64; 2]> {
        self.snap_to_grid.then_some(self.snap_grid)
    }
}
