//! Shape mask resolver: clip boundaries for image and custom elements.
//!
//! Boundaries are produced centered on the origin in the element's local,
//! unrotated space. The compositor positions them over the element box before
//! rotation, opacity and shadow are applied.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use crate::element::{CustomAttrs, ImageAttrs, ShapeType};

/// Ratio of the star mask's inner radius to its outer radius.
pub const STAR_MASK_INNER_RATIO: f64 = 0.5;

/// Points on the star mask.
pub const STAR_MASK_POINTS: usize = 5;

/// A 2D point in local element space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A vector clip boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipShape {
    /// Circle centered on the origin.
    Circle {
        /// Radius.
        radius: f64,
    },
    /// Closed polygon through the given vertices.
    Polygon {
        /// Vertices in drawing order.
        points: Vec<Point>,
    },
}

/// How an element's painting is restricted.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ShapeMask {
    /// Paint the full bounding box.
    #[default]
    None,
    /// Clip to a vector path.
    Vector(ClipShape),
    /// Clip to the opaque region of an image stretched over the box.
    Image {
        /// Mask image source.
        url: String,
    },
}

impl ShapeMask {
    /// Whether painting is restricted at all.
    #[must_use]
    pub fn is_clipped(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Vertex list as returned by the shape service: either a JSON array or the
/// string-encoded array the upload form sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PointsRepr {
    List(Vec<f64>),
    Encoded(String),
}

fn lenient_points<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<PointsRepr>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(PointsRepr::List(points)) => Ok(points),
        Some(PointsRepr::Encoded(raw)) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(PointsRepr::Encoded(raw)) => {
            serde_json::from_str(&raw).map_err(serde::de::Error::custom)
        }
    }
}

/// An uploaded shape from the shape service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeAsset {
    /// Storage id.
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Mask image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Flat vertex list, possibly empty.
    #[serde(default, deserialize_with = "lenient_points")]
    pub points: Vec<f64>,
}

/// Uploaded shapes, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct ShapeCatalog {
    shapes: HashMap<String, ShapeAsset>,
}

impl ShapeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a shape.
    pub fn insert(&mut self, shape: ShapeAsset) {
        self.shapes.insert(shape.id.clone(), shape);
    }

    /// Look up a shape by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ShapeAsset> {
        self.shapes.get(id)
    }

    /// Number of shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl FromIterator<ShapeAsset> for ShapeCatalog {
    fn from_iter<I: IntoIterator<Item = ShapeAsset>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for shape in iter {
            catalog.insert(shape);
        }
        catalog
    }
}

/// Regular polygon with the first vertex at the top (angle `-π/2`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn regular_polygon(sides: usize, radius: f64) -> Vec<Point> {
    (0..sides)
        .map(|i| {
            let angle = -FRAC_PI_2 + TAU * i as f64 / sides as f64;
            Point::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

/// Star polygon alternating outer and inner radius, starting at the top.
///
/// Produces `2 * points` vertices spaced `π / points` apart.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn star_polygon(points: usize, outer: f64, inner: f64) -> Vec<Point> {
    let step = PI / points as f64;
    (0..points * 2)
        .map(|i| {
            let radius = if i % 2 == 0 { outer } else { inner };
            let angle = -FRAC_PI_2 + step * i as f64;
            Point::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

/// Pair up a flat vertex list into a closed polygon.
///
/// Returns `None` for lists with fewer than three vertices, an odd length or
/// non-finite coordinates.
#[must_use]
pub fn polygon_from_flat(flat: &[f64]) -> Option<Vec<Point>> {
    if flat.len() < 6 || flat.len() % 2 != 0 || !flat.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(
        flat.chunks_exact(2)
            .map(|pair| Point::new(pair[0], pair[1]))
            .collect(),
    )
}

/// Boundary of a built-in mask shape for a box of the given width.
///
/// Returns `None` for `rect` (no clip), custom shapes, and non-positive widths.
#[must_use]
pub fn builtin_clip(shape: &ShapeType, width: f64) -> Option<ClipShape> {
    if !(width.is_finite() && width > 0.0) {
        return None;
    }
    let radius = width / 2.0;
    match shape {
        ShapeType::Rect | ShapeType::Custom(_) => None,
        ShapeType::Circle => Some(ClipShape::Circle { radius }),
        ShapeType::Star => Some(ClipShape::Polygon {
            points: star_polygon(STAR_MASK_POINTS, radius, radius * STAR_MASK_INNER_RATIO),
        }),
        ShapeType::Triangle => Some(ClipShape::Polygon {
            points: regular_polygon(3, radius),
        }),
        ShapeType::Pentagon => Some(ClipShape::Polygon {
            points: regular_polygon(5, radius),
        }),
        ShapeType::Hexagon => Some(ClipShape::Polygon {
            points: regular_polygon(6, radius),
        }),
    }
}

fn shape_asset_mask(shape: &ShapeAsset) -> ShapeMask {
    if let Some(points) = polygon_from_flat(&shape.points) {
        return ShapeMask::Vector(ClipShape::Polygon { points });
    }
    match shape.url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => ShapeMask::Image {
            url: url.to_string(),
        },
        None => ShapeMask::None,
    }
}

fn snapshot_mask(points: Option<&[f64]>, image: Option<&str>) -> ShapeMask {
    if let Some(points) = points.and_then(polygon_from_flat) {
        return ShapeMask::Vector(ClipShape::Polygon { points });
    }
    match image.filter(|u| !u.is_empty()) {
        Some(url) => ShapeMask::Image {
            url: url.to_string(),
        },
        None => ShapeMask::None,
    }
}

/// Resolve the clip of an image element.
///
/// Custom shape references resolve against `catalog` when one is supplied; a
/// reference the catalog no longer knows renders unclipped. Without a
/// catalog the element's stored snapshot (`shapePoints`, then `shapeImage`)
/// is used.
#[must_use]
pub fn resolve_image_mask(attrs: &ImageAttrs, catalog: Option<&ShapeCatalog>) -> ShapeMask {
    let Some(shape) = &attrs.shape_type else {
        return ShapeMask::None;
    };
    match shape {
        ShapeType::Custom(id) => match catalog {
            Some(catalog) => match catalog.get(id) {
                Some(asset) => shape_asset_mask(asset),
                None => {
                    tracing::warn!("Shape {id:?} not found, rendering image unclipped");
                    ShapeMask::None
                }
            },
            None => snapshot_mask(attrs.shape_points.as_deref(), attrs.shape_image.as_deref()),
        },
        builtin => match builtin_clip(builtin, attrs.width) {
            Some(clip) => ShapeMask::Vector(clip),
            None => {
                if *builtin != ShapeType::Rect {
                    tracing::warn!(
                        width = attrs.width,
                        "Degenerate mask width, rendering image unclipped"
                    );
                }
                ShapeMask::None
            }
        },
    }
}

/// Resolve the boundary of a custom-shape element.
///
/// The element's own vertex list wins; otherwise its mask image; otherwise
/// the shape it references in `catalog`. Anything unresolvable paints the
/// plain bounding box.
#[must_use]
pub fn resolve_custom_boundary(attrs: &CustomAttrs, catalog: Option<&ShapeCatalog>) -> ShapeMask {
    let own = snapshot_mask(Some(&attrs.points), attrs.shape_image.as_deref());
    if own.is_clipped() {
        return own;
    }
    match (attrs.shape_id.as_deref(), catalog) {
        (Some(id), Some(catalog)) => match catalog.get(id) {
            Some(asset) => shape_asset_mask(asset),
            None => {
                tracing::warn!("Shape {id:?} not found, rendering custom element unclipped");
                ShapeMask::None
            }
        },
        _ => ShapeMask::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, ElementKind};

    fn image_attrs(shape: Option<ShapeType>, width: f64) -> ImageAttrs {
        let Element {
            kind: ElementKind::Image(mut attrs),
            ..
        } = Element::image("photo.png")
        else {
            unreachable!()
        };
        attrs.shape_type = shape;
        attrs.width = width;
        attrs
    }

    fn radius(p: Point) -> f64 {
        p.x.hypot(p.y)
    }

    #[test]
    fn test_no_shape_type_is_unclipped() {
        assert_eq!(
            resolve_image_mask(&image_attrs(None, 100.0), None),
            ShapeMask::None
        );
        assert_eq!(
            resolve_image_mask(&image_attrs(Some(ShapeType::Rect), 100.0), None),
            ShapeMask::None
        );
    }

    #[test]
    fn test_circle_mask_radius() {
        let mask = resolve_image_mask(&image_attrs(Some(ShapeType::Circle), 120.0), None);
        assert_eq!(mask, ShapeMask::Vector(ClipShape::Circle { radius: 60.0 }));
    }

    #[test]
    fn test_star_mask_geometry() {
        let mask = resolve_image_mask(&image_attrs(Some(ShapeType::Star), 100.0), None);
        let ShapeMask::Vector(ClipShape::Polygon { points }) = mask else {
            panic!("expected polygon");
        };
        assert_eq!(points.len(), 10);
        for (i, p) in points.iter().enumerate() {
            let expected = if i % 2 == 0 { 50.0 } else { 25.0 };
            assert!((radius(*p) - expected).abs() < 1e-9);
        }
        // First vertex at the top.
        assert!(points[0].x.abs() < 1e-9);
        assert!((points[0].y + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_regular_polygon_masks() {
        for (shape, sides) in [
            (ShapeType::Triangle, 3),
            (ShapeType::Pentagon, 5),
            (ShapeType::Hexagon, 6),
        ] {
            let Some(ClipShape::Polygon { points }) = builtin_clip(&shape, 80.0) else {
                panic!("expected polygon for {shape:?}");
            };
            assert_eq!(points.len(), sides);
            assert!(points.iter().all(|p| (radius(*p) - 40.0).abs() < 1e-9));
            assert!((points[0].y + 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_degenerate_width_is_unclipped() {
        assert_eq!(builtin_clip(&ShapeType::Circle, 0.0), None);
        assert_eq!(builtin_clip(&ShapeType::Star, -3.0), None);
        assert_eq!(
            resolve_image_mask(&image_attrs(Some(ShapeType::Hexagon), 0.0), None),
            ShapeMask::None
        );
    }

    #[test]
    fn test_custom_reference_uses_catalog() {
        let catalog: ShapeCatalog = [ShapeAsset {
            id: "s1".to_string(),
            name: "Badge".to_string(),
            url: Some("/uploads/shapes/badge.png".to_string()),
            points: vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0],
        }]
        .into_iter()
        .collect();
        let attrs = image_attrs(Some(ShapeType::Custom("s1".to_string())), 100.0);
        let ShapeMask::Vector(ClipShape::Polygon { points }) =
            resolve_image_mask(&attrs, Some(&catalog))
        else {
            panic!("expected polygon");
        };
        assert_eq!(points[1], Point::new(10.0, 0.0));
    }

    #[test]
    fn test_deleted_custom_reference_is_unclipped() {
        let mut attrs = image_attrs(Some(ShapeType::Custom("gone".to_string())), 100.0);
        attrs.shape_points = Some(vec![0.0, 0.0, 5.0, 0.0, 5.0, 5.0]);
        assert_eq!(
            resolve_image_mask(&attrs, Some(&ShapeCatalog::new())),
            ShapeMask::None
        );
    }

    #[test]
    fn test_snapshot_used_without_catalog() {
        let mut attrs = image_attrs(Some(ShapeType::Custom("s9".to_string())), 100.0);
        attrs.shape_image = Some("/uploads/shapes/heart.png".to_string());
        assert_eq!(
            resolve_image_mask(&attrs, None),
            ShapeMask::Image {
                url: "/uploads/shapes/heart.png".to_string()
            }
        );
    }

    #[test]
    fn test_custom_boundary_fallbacks() {
        let element = Element::custom(Vec::new(), None, Some("missing".to_string()));
        let ElementKind::Custom(attrs) = &element.kind else {
            unreachable!()
        };
        assert_eq!(
            resolve_custom_boundary(attrs, Some(&ShapeCatalog::new())),
            ShapeMask::None
        );

        let element = Element::custom(vec![0.0, 0.0, 1.0], Some("m.png".to_string()), None);
        let ElementKind::Custom(attrs) = &element.kind else {
            unreachable!()
        };
        assert_eq!(
            resolve_custom_boundary(attrs, None),
            ShapeMask::Image {
                url: "m.png".to_string()
            }
        );
    }

    #[test]
    fn test_shape_asset_points_encoded_as_string() {
        let asset: ShapeAsset = serde_json::from_str(
            r#"{"_id":"a","name":"n","url":"u.png","points":"[1,2,3,4,5,6]"}"#,
        )
        .expect("parse");
        assert_eq!(asset.points, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let asset: ShapeAsset =
            serde_json::from_str(r#"{"_id":"b","points":"[]"}"#).expect("parse");
        assert!(asset.points.is_empty());
    }
}
