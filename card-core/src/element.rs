//! Template elements - the drawable primitives of a card layout.
//!
//! The JSON shape matches what the template storage service persists: common
//! attributes sit next to a `type` tag, kind-specific attributes follow, keys
//! are camelCase. Every attribute has a serde default so a partially specified
//! element still renders.

use serde::{Deserialize, Serialize};

/// Default element position for newly added elements.
pub const DEFAULT_POSITION: f64 = 50.0;

/// Default number of star points.
pub const DEFAULT_STAR_POINTS: u32 = 5;

/// Radius used by the built-in polygon generators for new shapes.
pub const DEFAULT_SHAPE_RADIUS: f64 = 50.0;

/// Field name bound by the default text element.
pub const DEFAULT_TEXT_FIELD: &str = "name";

/// Literal text of a newly added text element.
pub const DEFAULT_TEXT: &str = "Sample Text";

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

fn black() -> String {
    "black".to_string()
}

fn transparent() -> String {
    "transparent".to_string()
}

fn arial() -> String {
    "Arial".to_string()
}

fn star_points() -> u32 {
    DEFAULT_STAR_POINTS
}

/// Drop shadow painted behind an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    /// Shadow color.
    #[serde(rename = "shadowColor", default = "black")]
    pub color: String,
    /// Blur radius in pixels.
    #[serde(rename = "shadowBlur", default)]
    pub blur: f64,
    /// Horizontal offset in canvas pixels.
    #[serde(rename = "shadowOffsetX", default)]
    pub offset_x: f64,
    /// Vertical offset in canvas pixels.
    #[serde(rename = "shadowOffsetY", default)]
    pub offset_y: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: black(),
            blur: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl Shadow {
    /// Whether the shadow would be visible at all.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.blur > 0.0 || self.offset_x != 0.0 || self.offset_y != 0.0
    }
}

/// Font weight/slant, stored the way the editor writes it (`"italic bold"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FontStyle {
    /// Bold weight.
    pub bold: bool,
    /// Italic slant.
    pub italic: bool,
}

impl From<String> for FontStyle {
    fn from(value: String) -> Self {
        let lower = value.to_ascii_lowercase();
        Self {
            bold: lower.contains("bold") || lower.contains("700"),
            italic: lower.contains("italic") || lower.contains("oblique"),
        }
    }
}

impl From<FontStyle> for String {
    fn from(style: FontStyle) -> Self {
        match (style.italic, style.bold) {
            (false, false) => "normal",
            (false, true) => "bold",
            (true, false) => "italic",
            (true, true) => "italic bold",
        }
        .to_string()
    }
}

/// Horizontal text alignment inside the text box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Flush left.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Flush right.
    Right,
    /// Justified; laid out as left-aligned.
    Justify,
}

/// How a pattern image tiles across a fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternRepeat {
    /// Tile in both directions.
    #[default]
    Repeat,
    /// Tile horizontally only.
    RepeatX,
    /// Tile vertically only.
    RepeatY,
    /// Paint the image once.
    NoRepeat,
}

/// Fill and stroke attributes shared by the vector shape kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paint {
    /// Fill color.
    #[serde(default = "transparent")]
    pub fill: String,
    /// Optional tiled image fill; painted instead of `fill` once loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_pattern_image: Option<String>,
    /// Tiling mode for `fill_pattern_image`.
    #[serde(default)]
    pub fill_pattern_repeat: PatternRepeat,
    /// Stroke color.
    #[serde(default = "transparent")]
    pub stroke: String,
    /// Stroke width in pixels.
    #[serde(default)]
    pub stroke_width: f64,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            fill: transparent(),
            fill_pattern_image: None,
            fill_pattern_repeat: PatternRepeat::Repeat,
            stroke: transparent(),
            stroke_width: 0.0,
        }
    }
}

impl Paint {
    /// The editor's paint for newly added shapes.
    #[must_use]
    pub fn shape_default() -> Self {
        Self {
            fill: "blue".to_string(),
            stroke: black(),
            stroke_width: 2.0,
            ..Self::default()
        }
    }
}

/// A text box. Text is laid out inside `width`×`height`, not auto-sized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAttrs {
    /// Literal text, used when no record value is bound.
    #[serde(default)]
    pub text: String,
    /// Record field whose value overrides `text` at render time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_field: Option<String>,
    /// Font size in canvas pixels.
    #[serde(default)]
    pub font_size: f64,
    /// Font family name.
    #[serde(default = "arial")]
    pub font_family: String,
    /// Weight and slant.
    #[serde(default)]
    pub font_style: FontStyle,
    /// Horizontal alignment.
    #[serde(default, alias = "textAlign")]
    pub align: TextAlign,
    /// Text color.
    #[serde(default = "black")]
    pub fill: String,
    /// Box width.
    #[serde(default)]
    pub width: f64,
    /// Box height.
    #[serde(default)]
    pub height: f64,
}

/// An axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectAttrs {
    /// Width.
    #[serde(default)]
    pub width: f64,
    /// Height.
    #[serde(default)]
    pub height: f64,
    /// Fill and stroke.
    #[serde(flatten)]
    pub paint: Paint,
}

/// A circle anchored at its center. `radius` is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleAttrs {
    /// Radius.
    #[serde(default)]
    pub radius: f64,
    /// Derived: `2 * radius`.
    #[serde(default)]
    pub width: f64,
    /// Derived: `2 * radius`.
    #[serde(default)]
    pub height: f64,
    /// Fill and stroke.
    #[serde(flatten)]
    pub paint: Paint,
}

/// A star anchored at its center. The radii are authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarAttrs {
    /// Number of outer points.
    #[serde(default = "star_points")]
    pub num_points: u32,
    /// Radius of the inner vertices.
    #[serde(default)]
    pub inner_radius: f64,
    /// Radius of the outer vertices.
    #[serde(default)]
    pub outer_radius: f64,
    /// Derived: `2 * outer_radius`.
    #[serde(default)]
    pub width: f64,
    /// Derived: `2 * outer_radius`.
    #[serde(default)]
    pub height: f64,
    /// Fill and stroke.
    #[serde(flatten)]
    pub paint: Paint,
}

/// A closed polygon anchored at its center.
///
/// `points` is a flat `x0, y0, x1, y1, ...` list in local, unrotated
/// coordinates and is authoritative; `width`/`height` are the cached box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonAttrs {
    /// Flat vertex list.
    #[serde(default)]
    pub points: Vec<f64>,
    /// Derived box width.
    #[serde(default)]
    pub width: f64,
    /// Derived box height.
    #[serde(default)]
    pub height: f64,
    /// Fill and stroke.
    #[serde(flatten)]
    pub paint: Paint,
}

/// A user-supplied shape: a polygon, a mask image, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAttrs {
    /// Flat vertex list (may be empty for image-only shapes).
    #[serde(default)]
    pub points: Vec<f64>,
    /// Derived box width.
    #[serde(default)]
    pub width: f64,
    /// Derived box height.
    #[serde(default)]
    pub height: f64,
    /// Mask image of the uploaded shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_image: Option<String>,
    /// Catalog id of the uploaded shape this element was created from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_id: Option<String>,
    /// Fill and stroke.
    #[serde(flatten)]
    pub paint: Paint,
}

/// Mask shape selected for an image element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShapeType {
    /// Rectangular; equivalent to no mask.
    Rect,
    /// Inscribed circle.
    Circle,
    /// Five-pointed star.
    Star,
    /// Regular triangle.
    Triangle,
    /// Regular pentagon.
    Pentagon,
    /// Regular hexagon.
    Hexagon,
    /// Uploaded shape, by catalog id.
    Custom(String),
}

impl From<String> for ShapeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "rect" => Self::Rect,
            "circle" => Self::Circle,
            "star" => Self::Star,
            "triangle" => Self::Triangle,
            "pentagon" => Self::Pentagon,
            "hexagon" => Self::Hexagon,
            _ => Self::Custom(value),
        }
    }
}

impl From<ShapeType> for String {
    fn from(shape: ShapeType) -> Self {
        match shape {
            ShapeType::Rect => "rect".to_string(),
            ShapeType::Circle => "circle".to_string(),
            ShapeType::Star => "star".to_string(),
            ShapeType::Triangle => "triangle".to_string(),
            ShapeType::Pentagon => "pentagon".to_string(),
            ShapeType::Hexagon => "hexagon".to_string(),
            ShapeType::Custom(id) => id,
        }
    }
}

/// A raster image anchored at its top-left corner, optionally masked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttrs {
    /// Static image source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Record field binding; only `photo` replaces the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_field: Option<String>,
    /// Mask shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_type: Option<ShapeType>,
    /// Snapshot of a custom shape's vertex list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_points: Option<Vec<f64>>,
    /// Snapshot of a custom shape's mask image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_image: Option<String>,
    /// Width.
    #[serde(default)]
    pub width: f64,
    /// Height.
    #[serde(default)]
    pub height: f64,
}

/// Kind-specific attributes, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    /// Text box.
    Text(TextAttrs),
    /// Rectangle.
    Rect(RectAttrs),
    /// Circle.
    Circle(CircleAttrs),
    /// Star.
    Star(StarAttrs),
    /// Triangle polygon.
    Triangle(PolygonAttrs),
    /// Pentagon polygon.
    Pentagon(PolygonAttrs),
    /// Hexagon polygon.
    Hexagon(PolygonAttrs),
    /// Uploaded custom shape.
    Custom(CustomAttrs),
    /// Raster image.
    Image(ImageAttrs),
}

/// Local-space bounding box of an element, before rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Bounds {
    /// Whether a local-space point lies inside the box.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// A template element: common attributes plus its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// X position (top-left for text/rect/image, centroid for shapes).
    #[serde(default)]
    pub x: f64,
    /// Y position.
    #[serde(default)]
    pub y: f64,
    /// Clockwise rotation in degrees around `(x, y)`.
    #[serde(default)]
    pub rotation: f64,
    /// Opacity in `[0, 1]`.
    #[serde(default = "one")]
    pub opacity: f64,
    /// Drop shadow.
    #[serde(flatten)]
    pub shadow: Shadow,
    /// Whether the element may be dragged in the editor.
    #[serde(default = "yes")]
    pub draggable: bool,
    /// Kind-specific attributes.
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    /// Create an element of the given kind at the default position.
    #[must_use]
    pub fn new(kind: ElementKind) -> Self {
        Self {
            x: DEFAULT_POSITION,
            y: DEFAULT_POSITION,
            rotation: 0.0,
            opacity: 1.0,
            shadow: Shadow::default(),
            draggable: true,
            kind,
        }
    }

    /// A text box bound to the `name` field.
    #[must_use]
    pub fn text() -> Self {
        Self::new(ElementKind::Text(TextAttrs {
            text: DEFAULT_TEXT.to_string(),
            data_field: Some(DEFAULT_TEXT_FIELD.to_string()),
            font_size: 16.0,
            font_family: arial(),
            font_style: FontStyle::default(),
            align: TextAlign::Left,
            fill: black(),
            width: 100.0,
            height: 50.0,
        }))
    }

    /// A 100×50 rectangle.
    #[must_use]
    pub fn rect() -> Self {
        Self::new(ElementKind::Rect(RectAttrs {
            width: 100.0,
            height: 50.0,
            paint: Paint::shape_default(),
        }))
    }

    /// A circle of radius 50.
    #[must_use]
    pub fn circle() -> Self {
        Self::new(ElementKind::Circle(CircleAttrs {
            radius: DEFAULT_SHAPE_RADIUS,
            width: DEFAULT_SHAPE_RADIUS * 2.0,
            height: DEFAULT_SHAPE_RADIUS * 2.0,
            paint: Paint::shape_default(),
        }))
    }

    /// A five-pointed star with radii 25/50.
    #[must_use]
    pub fn star() -> Self {
        Self::new(ElementKind::Star(StarAttrs {
            num_points: DEFAULT_STAR_POINTS,
            inner_radius: DEFAULT_SHAPE_RADIUS / 2.0,
            outer_radius: DEFAULT_SHAPE_RADIUS,
            width: DEFAULT_SHAPE_RADIUS * 2.0,
            height: DEFAULT_SHAPE_RADIUS * 2.0,
            paint: Paint::shape_default(),
        }))
    }

    /// An isosceles triangle inside a 100×100 box.
    #[must_use]
    pub fn triangle() -> Self {
        Self::polygon_kind(ElementKind::Triangle, vec![0.0, -50.0, 50.0, 50.0, -50.0, 50.0])
    }

    /// A regular pentagon of radius 50, first vertex pointing down.
    #[must_use]
    pub fn pentagon() -> Self {
        Self::polygon_kind(
            ElementKind::Pentagon,
            regular_points(5, std::f64::consts::FRAC_PI_2),
        )
    }

    /// A regular hexagon of radius 50, first vertex pointing right.
    #[must_use]
    pub fn hexagon() -> Self {
        Self::polygon_kind(ElementKind::Hexagon, regular_points(6, 0.0))
    }

    /// A custom shape from an uploaded shape's vertex list and mask image.
    #[must_use]
    pub fn custom(points: Vec<f64>, shape_image: Option<String>, shape_id: Option<String>) -> Self {
        let (width, height) = polygon_extent(&points).unwrap_or((100.0, 100.0));
        Self::new(ElementKind::Custom(CustomAttrs {
            points,
            width,
            height,
            shape_image,
            shape_id,
            paint: Paint::shape_default(),
        }))
    }

    fn polygon_kind(kind: fn(PolygonAttrs) -> ElementKind, points: Vec<f64>) -> Self {
        let (width, height) = polygon_extent(&points).unwrap_or((100.0, 100.0));
        Self::new(kind(PolygonAttrs {
            points,
            width,
            height,
            paint: Paint::shape_default(),
        }))
    }

    /// A 100×100 image element.
    #[must_use]
    pub fn image(src: impl Into<String>) -> Self {
        Self::new(ElementKind::Image(ImageAttrs {
            image: Some(src.into()),
            data_field: None,
            shape_type: None,
            shape_points: None,
            shape_image: None,
            width: 100.0,
            height: 100.0,
        }))
    }

    /// Set the position.
    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the rotation in degrees.
    #[must_use]
    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the opacity.
    #[must_use]
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the drop shadow.
    #[must_use]
    pub fn with_shadow(mut self, shadow: Shadow) -> Self {
        self.shadow = shadow;
        self
    }

    /// The `type` tag of this element.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ElementKind::Text(_) => "text",
            ElementKind::Rect(_) => "rect",
            ElementKind::Circle(_) => "circle",
            ElementKind::Star(_) => "star",
            ElementKind::Triangle(_) => "triangle",
            ElementKind::Pentagon(_) => "pentagon",
            ElementKind::Hexagon(_) => "hexagon",
            ElementKind::Custom(_) => "custom",
            ElementKind::Image(_) => "image",
        }
    }

    /// Stored width/height (derived for circle, star and polygon kinds).
    #[must_use]
    pub fn size(&self) -> (f64, f64) {
        match &self.kind {
            ElementKind::Text(a) => (a.width, a.height),
            ElementKind::Rect(a) => (a.width, a.height),
            ElementKind::Circle(a) => (a.width, a.height),
            ElementKind::Star(a) => (a.width, a.height),
            ElementKind::Triangle(a) | ElementKind::Pentagon(a) | ElementKind::Hexagon(a) => {
                (a.width, a.height)
            }
            ElementKind::Custom(a) => (a.width, a.height),
            ElementKind::Image(a) => (a.width, a.height),
        }
    }

    /// Whether `(x, y)` is the top-left corner rather than the centroid.
    #[must_use]
    pub fn is_corner_anchored(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Text(_) | ElementKind::Rect(_) | ElementKind::Image(_)
        )
    }

    /// Bounding box in local coordinates (origin at `(x, y)`, unrotated).
    #[must_use]
    pub fn local_bounds(&self) -> Bounds {
        match &self.kind {
            ElementKind::Circle(a) => centered(a.radius * 2.0, a.radius * 2.0),
            ElementKind::Star(a) => centered(a.outer_radius * 2.0, a.outer_radius * 2.0),
            ElementKind::Triangle(a) | ElementKind::Pentagon(a) | ElementKind::Hexagon(a) => {
                points_bounds(&a.points).unwrap_or_else(|| centered(a.width, a.height))
            }
            ElementKind::Custom(a) => {
                points_bounds(&a.points).unwrap_or_else(|| centered(a.width, a.height))
            }
            ElementKind::Text(_) | ElementKind::Rect(_) | ElementKind::Image(_) => {
                let (width, height) = self.size();
                Bounds {
                    x: 0.0,
                    y: 0.0,
                    width,
                    height,
                }
            }
        }
    }

    /// Map a canvas point into this element's local, unrotated space.
    #[must_use]
    pub fn to_local(&self, x: f64, y: f64) -> (f64, f64) {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let dx = x - self.x;
        let dy = y - self.y;
        (dx * cos + dy * sin, -dx * sin + dy * cos)
    }

    /// Check if a canvas point lies within this element, honouring rotation.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let (lx, ly) = self.to_local(x, y);
        self.local_bounds().contains(lx, ly)
    }
}

fn centered(width: f64, height: f64) -> Bounds {
    Bounds {
        x: -width / 2.0,
        y: -height / 2.0,
        width,
        height,
    }
}

/// Bounding box of a flat vertex list, if it holds at least one vertex.
#[must_use]
pub fn points_bounds(points: &[f64]) -> Option<Bounds> {
    let mut pairs = points.chunks_exact(2);
    let first = pairs.next()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first[0], first[1], first[0], first[1]);
    for pair in pairs {
        min_x = min_x.min(pair[0]);
        max_x = max_x.max(pair[0]);
        min_y = min_y.min(pair[1]);
        max_y = max_y.max(pair[1]);
    }
    Some(Bounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

/// Width and height of a vertex list with at least three vertices.
#[must_use]
pub fn polygon_extent(points: &[f64]) -> Option<(f64, f64)> {
    if points.len() < 6 {
        return None;
    }
    points_bounds(points).map(|bounds| (bounds.width, bounds.height))
}

#[allow(clippy::cast_precision_loss)]
fn regular_points(sides: usize, start: f64) -> Vec<f64> {
    (0..sides)
        .flat_map(|i| {
            let angle = start + std::f64::consts::TAU * i as f64 / sides as f64;
            [
                DEFAULT_SHAPE_RADIUS * angle.cos(),
                DEFAULT_SHAPE_RADIUS * angle.sin(),
            ]
        })
        .collect()
}
