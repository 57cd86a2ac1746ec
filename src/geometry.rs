//! Pure rectangle and point math.
//!
//! Nothing in here touches the store; every function is deterministic and
//! never fails. Degenerate input (no rects, zero sizes) produces the zero rect
//! rather than an error so callers can check sizes instead of matching errors.

use crate::types::{
    BoundingBox, CoordinateExtent, Dimensions, InternalNode, Node, NodeOrigin, Rect, Viewport,
    XYPosition,
};
use serde_json::Value;

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Clamp `position` so a box of `dimensions` placed there stays inside `extent`.
pub fn clamp_position(
    position: XYPosition,
    extent: &CoordinateExtent,
    dimensions: Dimensions,
) -> XYPosition {
    XYPosition {
        x: clamp(position.x, extent[0][0], extent[1][0] - dimensions.width),
        y: clamp(position.y, extent[0][1], extent[1][1] - dimensions.height),
    }
}

/// Area of the intersection of two rects, 0 when they don't overlap.
pub fn overlap_area(a: &Rect, b: &Rect) -> f64 {
    let x_overlap = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let y_overlap = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    x_overlap * y_overlap
}

/// Intersection test shared by every "is X inside Y" query.
///
/// Partial mode accepts any positive overlap. Otherwise the overlap must cover
/// the whole of the smaller rect, i.e. one rect contains the other.
pub fn rects_intersect(a: &Rect, b: &Rect, partially: bool) -> bool {
    let overlap = overlap_area(a, b);
    if partially {
        overlap > 0.0
    } else {
        overlap >= a.area().min(b.area())
    }
}

pub fn rect_to_box(rect: &Rect) -> BoundingBox {
    BoundingBox {
        x: rect.x,
        y: rect.y,
        x2: rect.x + rect.width,
        y2: rect.y + rect.height,
    }
}

pub fn box_to_rect(bounds: &BoundingBox) -> Rect {
    Rect {
        x: bounds.x,
        y: bounds.y,
        width: bounds.x2 - bounds.x,
        height: bounds.y2 - bounds.y,
    }
}

pub fn bounds_of_boxes(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
    BoundingBox {
        x: a.x.min(b.x),
        y: a.y.min(b.y),
        x2: a.x2.max(b.x2),
        y2: a.y2.max(b.y2),
    }
}

/// Smallest rect containing every input rect. No input gives the zero rect.
pub fn union_bounds<I>(rects: I) -> Rect
where
    I: IntoIterator<Item = Rect>,
{
    rects
        .into_iter()
        .map(|rect| rect_to_box(&rect))
        .reduce(|acc, next| bounds_of_boxes(&acc, &next))
        .map(|bounds| box_to_rect(&bounds))
        .unwrap_or_default()
}

/// Structural check for plain rect data: an object with numeric `x`, `y`,
/// `width` and `height`. Anything else (notably a node object, which carries a
/// `position` instead of `x`/`y`) is not a rect.
pub fn is_rect_object(value: &Value) -> bool {
    match value.as_object() {
        Some(object) => ["x", "y", "width", "height"]
            .iter()
            .all(|key| object.get(*key).is_some_and(Value::is_number)),
        None => false,
    }
}

/// Size of a node: measured size first, then the width/height hints, then 0.
pub fn node_dimensions(node: &Node) -> Dimensions {
    match node.measured {
        Some(measured) => measured,
        None => Dimensions {
            width: node.width.unwrap_or(0.0),
            height: node.height.unwrap_or(0.0),
        },
    }
}

/// Top-left corner of a node whose `position` names its anchor point.
pub fn position_with_origin(node: &Node, default_origin: NodeOrigin) -> XYPosition {
    let origin = node.origin.unwrap_or(default_origin);
    let dimensions = node_dimensions(node);
    XYPosition {
        x: node.position.x - dimensions.width * origin[0],
        y: node.position.y - dimensions.height * origin[1],
    }
}

/// Rect of an authored node in its own coordinate space.
pub fn node_to_rect(node: &Node) -> Rect {
    let dimensions = node_dimensions(node);
    Rect::new(node.position.x, node.position.y, dimensions.width, dimensions.height)
}

/// Rect of a node in absolute flow coordinates.
///
/// Built from the box's top-left corner, so a root node's origin is applied
/// the same way as a nested node's.
pub fn internal_node_to_rect(node: &InternalNode) -> Rect {
    let position = node.internals.top_left;
    let dimensions = node_dimensions(node.node());
    Rect::new(position.x, position.y, dimensions.width, dimensions.height)
}

/// Absolute bounds of a set of nodes; the zero rect for an empty set.
pub fn nodes_bounds<'a, I>(nodes: I) -> Rect
where
    I: IntoIterator<Item = &'a InternalNode>,
{
    union_bounds(nodes.into_iter().map(internal_node_to_rect))
}

pub fn snap_position(position: XYPosition, grid: [f64; 2]) -> XYPosition {
    XYPosition {
        x: grid[0] * (position.x / grid[0]).round(),
        y: grid[1] * (position.y / grid[1]).round(),
    }
}

/// Screen point (relative to the surface) to flow space.
pub fn point_to_flow(point: XYPosition, viewport: &Viewport, snap_grid: Option<[f64; 2]>) -> XYPosition {
    let position = XYPosition {
        x: (point.x - viewport.x) / viewport.zoom,
        y: (point.y - viewport.y) / viewport.zoom,
    };
    match snap_grid {
        Some(grid) => snap_position(position, grid),
        None => position,
    }
}

/// Flow point to screen space (relative to the surface).
pub fn point_to_screen(point: XYPosition, viewport: &Viewport) -> XYPosition {
    XYPosition {
        x: point.x * viewport.zoom + viewport.x,
        y: point.y * viewport.zoom + viewport.y,
    }
}

/// Screen rect to flow space, e.g. a selection box.
pub fn rect_to_flow(rect: &Rect, viewport: &Viewport) -> Rect {
    let top_left = point_to_flow(rect.position(), viewport, None);
    Rect::new(
        top_left.x,
        top_left.y,
        rect.width / viewport.zoom,
        rect.height / viewport.zoom,
    )
}
