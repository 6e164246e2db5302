//! Transform resolver: turns a finished drag/resize/rotate gesture into
//! kind-specific size attributes.
//!
//! The editor's transform handles report a node transform (position, absolute
//! rotation and non-uniform scale). [`apply_transform`] folds the scale into
//! the element's authoritative geometry and resets the node scale to 1, so
//! repeated gestures compose multiplicatively. [`sync_derived`] is the single
//! place where cached `width`/`height` copies are recomputed.

use crate::element::{polygon_extent, Element, ElementKind};
use crate::{CardError, CardResult};

/// Smallest radius a circle can be resized to.
pub const MIN_CIRCLE_RADIUS: f64 = 10.0;

/// Smallest inner radius of a star.
pub const MIN_STAR_INNER_RADIUS: f64 = 5.0;

/// Smallest outer radius of a star.
pub const MIN_STAR_OUTER_RADIUS: f64 = 10.0;

/// Smallest width/height of a box kind (text, rect, image).
pub const MIN_BOX_EXTENT: f64 = 20.0;

/// The transform of an element's node on the interactive surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
    /// Absolute rotation in degrees.
    pub rotation: f64,
    /// Horizontal scale factor.
    pub scale_x: f64,
    /// Vertical scale factor.
    pub scale_y: f64,
}

impl NodeTransform {
    /// The resting node transform of an element (scale 1).
    #[must_use]
    pub fn of(element: &Element) -> Self {
        Self {
            x: element.x,
            y: element.y,
            rotation: element.rotation,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Set the scale factors.
    #[must_use]
    pub fn scaled(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Set the position.
    #[must_use]
    pub fn moved_to(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the absolute rotation.
    #[must_use]
    pub fn rotated_to(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Reset the scale factors to 1.
    pub fn reset_scale(&mut self) {
        self.scale_x = 1.0;
        self.scale_y = 1.0;
    }

    fn validate(&self) -> CardResult<()> {
        if ![self.x, self.y, self.rotation].iter().all(|v| v.is_finite()) {
            return Err(CardError::InvalidTransform(
                "position and rotation must be finite".to_string(),
            ));
        }
        for (axis, scale) in [("x", self.scale_x), ("y", self.scale_y)] {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(CardError::InvalidTransform(format!(
                    "scale {axis} must be a positive number, got {scale}"
                )));
            }
        }
        Ok(())
    }
}

/// Apply a finished gesture to an element and reset the node's scale.
///
/// Position and rotation are copied verbatim from the node. Sizes are scaled
/// per kind and clamped at the kind's floor.
///
/// # Errors
///
/// Returns [`CardError::InvalidTransform`] (leaving both element and node
/// untouched) if the node carries non-finite values or a non-positive scale.
pub fn apply_transform(element: &mut Element, node: &mut NodeTransform) -> CardResult<()> {
    node.validate()?;
    let (sx, sy) = (node.scale_x, node.scale_y);

    element.x = node.x;
    element.y = node.y;
    element.rotation = node.rotation;

    match &mut element.kind {
        ElementKind::Text(a) => scale_box(&mut a.width, &mut a.height, sx, sy),
        ElementKind::Rect(a) => scale_box(&mut a.width, &mut a.height, sx, sy),
        ElementKind::Image(a) => scale_box(&mut a.width, &mut a.height, sx, sy),
        ElementKind::Circle(a) => {
            a.radius = (a.radius * sx).max(MIN_CIRCLE_RADIUS);
        }
        ElementKind::Star(a) => {
            a.inner_radius = (a.inner_radius * sx).max(MIN_STAR_INNER_RADIUS);
            a.outer_radius = (a.outer_radius * sx).max(MIN_STAR_OUTER_RADIUS);
        }
        ElementKind::Triangle(a) | ElementKind::Pentagon(a) | ElementKind::Hexagon(a) => {
            scale_points(&mut a.points, sx, sy);
            a.width *= sx;
            a.height *= sy;
        }
        ElementKind::Custom(a) => {
            scale_points(&mut a.points, sx, sy);
            a.width *= sx;
            a.height *= sy;
        }
    }

    sync_derived(element);
    node.reset_scale();
    tracing::debug!(
        kind = element.kind_name(),
        sx,
        sy,
        "Applied transform gesture"
    );
    Ok(())
}

/// Recompute cached `width`/`height` from the authoritative geometry.
///
/// Circles and stars derive their box from the radius; polygon kinds take it
/// from the vertex extent whenever they have at least three vertices. Box
/// kinds are authoritative and left alone.
pub fn sync_derived(element: &mut Element) {
    match &mut element.kind {
        ElementKind::Circle(a) => {
            a.width = a.radius * 2.0;
            a.height = a.radius * 2.0;
        }
        ElementKind::Star(a) => {
            a.width = a.outer_radius * 2.0;
            a.height = a.outer_radius * 2.0;
        }
        ElementKind::Triangle(a) | ElementKind::Pentagon(a) | ElementKind::Hexagon(a) => {
            fill_box_from_points(&a.points, &mut a.width, &mut a.height);
        }
        ElementKind::Custom(a) => {
            fill_box_from_points(&a.points, &mut a.width, &mut a.height);
        }
        ElementKind::Text(_) | ElementKind::Rect(_) | ElementKind::Image(_) => {}
    }
}

fn scale_box(width: &mut f64, height: &mut f64, sx: f64, sy: f64) {
    *width = (*width * sx).max(MIN_BOX_EXTENT);
    *height = (*height * sy).max(MIN_BOX_EXTENT);
}

fn scale_points(points: &mut [f64], sx: f64, sy: f64) {
    for (i, value) in points.iter_mut().enumerate() {
        *value *= if i % 2 == 0 { sx } else { sy };
    }
}

fn fill_box_from_points(points: &[f64], width: &mut f64, height: &mut f64) {
    if let Some((w, h)) = polygon_extent(points) {
        *width = w;
        *height = h;
    }
}
