//! Scene compositor: turns a bound template into a flat display list.
//!
//! The display list is consumed unchanged by every paint backend (interactive
//! surface, raster export, PDF export). Edit mode only decides whether a
//! decoration layer is appended; geometry and color never depend on it, so
//! [`Scene::without_decoration`] of an editable scene equals the scene
//! composed for export.

use std::collections::BTreeSet;

use crate::binding::{bind, BoundElement, BoundTemplate, Content, Record};
use crate::color::Rgba;
use crate::element::{Bounds, Element, ElementKind, FontStyle, Paint, PatternRepeat};
use crate::mask::{
    polygon_from_flat, resolve_custom_boundary, resolve_image_mask, star_polygon, ClipShape,
    Point, ShapeCatalog, ShapeMask,
};
use crate::template::{Template, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
use crate::text::{layout, TextLine};

/// How a template is composed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionOptions {
    /// Interactive editing surface; enables the decoration layer.
    pub editable: bool,
    /// Index of the selected element.
    pub selected: Option<usize>,
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            editable: false,
            selected: None,
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl CompositionOptions {
    /// Options for the interactive editor with the given selection.
    #[must_use]
    pub fn editor(selected: Option<usize>) -> Self {
        Self {
            editable: true,
            selected,
            ..Self::default()
        }
    }

    /// Set the canvas size.
    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Drop shadow in canvas space (offsets are not rotated with the element).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    /// Shadow color.
    pub color: Rgba,
    /// Blur radius.
    pub blur: f64,
    /// Horizontal offset.
    pub offset_x: f64,
    /// Vertical offset.
    pub offset_y: f64,
}

/// Where and how an item is composited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Local origin X in canvas space.
    pub x: f64,
    /// Local origin Y in canvas space.
    pub y: f64,
    /// Clockwise rotation in degrees around the origin.
    pub rotation: f64,
    /// Group opacity.
    pub opacity: f64,
    /// Drop shadow, if visible.
    pub shadow: Option<ShadowStyle>,
}

/// Fill of a vector body.
#[derive(Debug, Clone, PartialEq)]
pub enum FillStyle {
    /// No fill.
    None,
    /// Flat color.
    Solid(Rgba),
    /// Tiled image; `fallback` is painted while the image is unavailable.
    Pattern {
        /// Tile image source.
        image: String,
        /// Tiling mode.
        repeat: PatternRepeat,
        /// Color used when the image is not loaded.
        fallback: Rgba,
    },
    /// Image stretched over the body's bounding box.
    Stretch {
        /// Image source.
        image: String,
        /// Color used when the image is not loaded.
        fallback: Rgba,
    },
}

impl FillStyle {
    /// Image this fill references, if any.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        match self {
            Self::Pattern { image, .. } | Self::Stretch { image, .. } => Some(image),
            Self::None | Self::Solid(_) => None,
        }
    }
}

/// Outline of a vector body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    /// Stroke color.
    pub color: Rgba,
    /// Stroke width.
    pub width: f64,
}

/// A laid-out text box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Lines in box coordinates.
    pub lines: Vec<TextLine>,
    /// Font family.
    pub font_family: String,
    /// Font size in canvas pixels.
    pub font_size: f64,
    /// Weight and slant.
    pub font_style: FontStyle,
    /// Text color.
    pub color: Rgba,
}

impl TextRun {
    /// Effective alpha once the item's group opacity is applied.
    #[must_use]
    pub fn alpha(&self, placement: &Placement) -> f64 {
        placement.opacity * self.color.a
    }
}

/// What an item paints, in its local coordinate space.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintBody {
    /// Text box.
    Text(TextRun),
    /// Axis-aligned rectangle.
    Rect {
        /// Box in local coordinates.
        bounds: Bounds,
        /// Fill.
        fill: FillStyle,
        /// Stroke.
        stroke: Option<StrokeStyle>,
    },
    /// Circle centered on the origin.
    Circle {
        /// Radius.
        radius: f64,
        /// Fill.
        fill: FillStyle,
        /// Stroke.
        stroke: Option<StrokeStyle>,
    },
    /// Closed polygon.
    Polygon {
        /// Vertices.
        points: Vec<Point>,
        /// Fill.
        fill: FillStyle,
        /// Stroke.
        stroke: Option<StrokeStyle>,
    },
    /// Raster image filling `0,0`–`width,height`, clipped by `mask`.
    ///
    /// Mask boundaries are centered on the origin and are positioned over
    /// the box center by the painter.
    Image {
        /// Image source.
        src: String,
        /// Width.
        width: f64,
        /// Height.
        height: f64,
        /// Clip.
        mask: ShapeMask,
    },
    /// A fill restricted to the opaque region of a mask image.
    MaskedBox {
        /// Box in local coordinates.
        bounds: Bounds,
        /// Mask image source.
        mask_image: String,
        /// Fill.
        fill: FillStyle,
    },
}

/// One element's contribution to the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintItem {
    /// Index of the element in the template.
    pub index: usize,
    /// Position, rotation, opacity and shadow.
    pub placement: Placement,
    /// Geometry and paint.
    pub body: PaintBody,
}

impl PaintItem {
    fn is_vector_text(&self) -> bool {
        matches!(&self.body, PaintBody::Text(run) if run.alpha(&self.placement) >= 1.0)
    }
}

/// Canvas background.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundLayer {
    /// Fill color.
    pub color: Rgba,
    /// Image stretched over the canvas, painted over the color.
    pub image: Option<String>,
}

/// Selection decoration for the active element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoration {
    /// Index of the decorated element.
    pub index: usize,
    /// Element origin X.
    pub x: f64,
    /// Element origin Y.
    pub y: f64,
    /// Element rotation in degrees.
    pub rotation: f64,
    /// Element bounds in local coordinates.
    pub bounds: Bounds,
}

/// The composed display list for one template and record.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Canvas width.
    pub width: f64,
    /// Canvas height.
    pub height: f64,
    /// Background layer.
    pub background: BackgroundLayer,
    /// Elements in paint order.
    pub items: Vec<PaintItem>,
    /// Edit-mode decoration, painted last.
    pub decoration: Option<Decoration>,
}

impl Scene {
    /// The same scene without the decoration layer.
    #[must_use]
    pub fn without_decoration(&self) -> Self {
        Self {
            decoration: None,
            ..self.clone()
        }
    }

    /// The same scene without the text that [`Scene::vector_text_items`]
    /// yields, for the raster half of an export whose opaque text is emitted
    /// as vectors. Translucent and invisible text stays in the raster, where
    /// its alpha is honored.
    #[must_use]
    pub fn without_vector_text(&self) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|item| !item.is_vector_text())
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Text items with their placement, in paint order.
    pub fn text_items(&self) -> impl Iterator<Item = (&Placement, &TextRun)> {
        self.items.iter().filter_map(|item| match &item.body {
            PaintBody::Text(run) => Some((&item.placement, run)),
            _ => None,
        })
    }

    /// Fully opaque text items with their placement, in paint order.
    pub fn vector_text_items(&self) -> impl Iterator<Item = (&Placement, &TextRun)> {
        self.text_items()
            .filter(|(placement, run)| run.alpha(placement) >= 1.0)
    }

    /// Every image source the scene references.
    #[must_use]
    pub fn image_urls(&self) -> BTreeSet<String> {
        let mut urls = BTreeSet::new();
        if let Some(image) = &self.background.image {
            urls.insert(image.clone());
        }
        for item in &self.items {
            match &item.body {
                PaintBody::Image { src, mask, .. } => {
                    urls.insert(src.clone());
                    if let ShapeMask::Image { url } = mask {
                        urls.insert(url.clone());
                    }
                }
                PaintBody::MaskedBox {
                    mask_image, fill, ..
                } => {
                    urls.insert(mask_image.clone());
                    urls.extend(fill.image().map(str::to_string));
                }
                PaintBody::Rect { fill, .. }
                | PaintBody::Circle { fill, .. }
                | PaintBody::Polygon { fill, .. } => {
                    urls.extend(fill.image().map(str::to_string));
                }
                PaintBody::Text(_) => {}
            }
        }
        urls
    }
}

/// Compose a template for one record.
#[must_use]
pub fn compose_record(
    template: &Template,
    record: &Record,
    catalog: Option<&ShapeCatalog>,
    options: &CompositionOptions,
) -> Scene {
    compose(&bind(template, record), catalog, options)
}

/// Compose a bound template into a scene.
///
/// Each element is composed in isolation: an element that cannot be painted
/// (non-finite geometry, degenerate size, missing source) is logged and left
/// out while the rest of the scene is still produced.
#[must_use]
pub fn compose(
    bound: &BoundTemplate<'_>,
    catalog: Option<&ShapeCatalog>,
    options: &CompositionOptions,
) -> Scene {
    let template = bound.template;
    let background = BackgroundLayer {
        color: Rgba::parse_or(&template.background.color, Rgba::WHITE),
        image: template
            .background
            .image
            .clone()
            .filter(|image| !image.trim().is_empty()),
    };

    let items = bound
        .elements
        .iter()
        .filter_map(|bound_element| compose_element(bound_element, catalog))
        .collect();

    let decoration = if options.editable {
        options
            .selected
            .and_then(|index| template.elements.get(index).map(|e| (index, e)))
            .map(|(index, element)| Decoration {
                index,
                x: element.x,
                y: element.y,
                rotation: element.rotation,
                bounds: element.local_bounds(),
            })
    } else {
        None
    };

    Scene {
        width: options.width,
        height: options.height,
        background,
        items,
        decoration,
    }
}

fn compose_element(bound: &BoundElement<'_>, catalog: Option<&ShapeCatalog>) -> Option<PaintItem> {
    let element = bound.element;
    if ![element.x, element.y, element.rotation]
        .iter()
        .all(|v| v.is_finite())
    {
        tracing::warn!(
            index = bound.index,
            kind = element.kind_name(),
            "Skipping element with non-finite position or rotation"
        );
        return None;
    }
    let body = match paint_body(element, &bound.content, catalog) {
        Ok(body) => body,
        Err(reason) => {
            tracing::warn!(
                index = bound.index,
                kind = element.kind_name(),
                "Skipping element: {reason}"
            );
            return None;
        }
    };
    tracing::debug!(index = bound.index, kind = element.kind_name(), "Composed element");
    Some(PaintItem {
        index: bound.index,
        placement: placement(element),
        body,
    })
}

fn placement(element: &Element) -> Placement {
    let shadow = &element.shadow;
    let color = Rgba::parse_or(&shadow.color, Rgba::BLACK);
    let visible = shadow.is_visible()
        && !color.is_transparent()
        && [shadow.blur, shadow.offset_x, shadow.offset_y]
            .iter()
            .all(|v| v.is_finite());
    Placement {
        x: element.x,
        y: element.y,
        rotation: element.rotation,
        opacity: if element.opacity.is_finite() {
            element.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        },
        shadow: visible.then(|| ShadowStyle {
            color,
            blur: shadow.blur.max(0.0),
            offset_x: shadow.offset_x,
            offset_y: shadow.offset_y,
        }),
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn fill_style(paint: &Paint) -> FillStyle {
    let solid = Rgba::parse_or(&paint.fill, Rgba::TRANSPARENT);
    match paint
        .fill_pattern_image
        .as_deref()
        .filter(|image| !image.is_empty())
    {
        Some(image) => FillStyle::Pattern {
            image: image.to_string(),
            repeat: paint.fill_pattern_repeat,
            fallback: solid,
        },
        None if solid.is_transparent() => FillStyle::None,
        None => FillStyle::Solid(solid),
    }
}

fn stroke_style(paint: &Paint) -> Option<StrokeStyle> {
    let color = Rgba::parse_or(&paint.stroke, Rgba::TRANSPARENT);
    (positive(paint.stroke_width) && !color.is_transparent()).then_some(StrokeStyle {
        color,
        width: paint.stroke_width,
    })
}

fn centered_bounds(width: f64, height: f64) -> Bounds {
    Bounds {
        x: -width / 2.0,
        y: -height / 2.0,
        width,
        height,
    }
}

fn polygon_body(points: &[f64], paint: &Paint) -> Result<PaintBody, String> {
    let points = polygon_from_flat(points)
        .ok_or_else(|| format!("invalid vertex list of length {}", points.len()))?;
    Ok(PaintBody::Polygon {
        points,
        fill: fill_style(paint),
        stroke: stroke_style(paint),
    })
}

fn paint_body(
    element: &Element,
    content: &Content,
    catalog: Option<&ShapeCatalog>,
) -> Result<PaintBody, String> {
    match &element.kind {
        ElementKind::Text(attrs) => {
            let text = match content {
                Content::Text(text) => text.as_str(),
                _ => attrs.text.as_str(),
            };
            let lines = layout(text, attrs.font_size, attrs.width, attrs.height, attrs.align);
            if lines.is_empty() {
                return Err("nothing to draw".to_string());
            }
            Ok(PaintBody::Text(TextRun {
                lines,
                font_family: attrs.font_family.clone(),
                font_size: attrs.font_size,
                font_style: attrs.font_style,
                color: Rgba::parse_or(&attrs.fill, Rgba::BLACK),
            }))
        }
        ElementKind::Rect(attrs) => {
            if !(positive(attrs.width) && positive(attrs.height)) {
                return Err(format!("degenerate size {}x{}", attrs.width, attrs.height));
            }
            Ok(PaintBody::Rect {
                bounds: Bounds {
                    x: 0.0,
                    y: 0.0,
                    width: attrs.width,
                    height: attrs.height,
                },
                fill: fill_style(&attrs.paint),
                stroke: stroke_style(&attrs.paint),
            })
        }
        ElementKind::Circle(attrs) => {
            if !positive(attrs.radius) {
                return Err(format!("degenerate radius {}", attrs.radius));
            }
            Ok(PaintBody::Circle {
                radius: attrs.radius,
                fill: fill_style(&attrs.paint),
                stroke: stroke_style(&attrs.paint),
            })
        }
        ElementKind::Star(attrs) => {
            if attrs.num_points < 2 || !positive(attrs.outer_radius) {
                return Err(format!(
                    "degenerate star ({} points, outer radius {})",
                    attrs.num_points, attrs.outer_radius
                ));
            }
            Ok(PaintBody::Polygon {
                points: star_polygon(
                    attrs.num_points as usize,
                    attrs.outer_radius,
                    attrs.inner_radius.max(0.0),
                ),
                fill: fill_style(&attrs.paint),
                stroke: stroke_style(&attrs.paint),
            })
        }
        ElementKind::Triangle(attrs) | ElementKind::Pentagon(attrs) | ElementKind::Hexagon(attrs) => {
            polygon_body(&attrs.points, &attrs.paint)
        }
        ElementKind::Custom(attrs) => {
            let stretch = attrs
                .shape_image
                .as_deref()
                .filter(|image| !image.is_empty());
            // The shape's own image fills the polygon unless a pattern is set.
            let fill = match (fill_style(&attrs.paint), stretch) {
                (FillStyle::Solid(fallback), Some(image)) => FillStyle::Stretch {
                    image: image.to_string(),
                    fallback,
                },
                (FillStyle::None, Some(image)) => FillStyle::Stretch {
                    image: image.to_string(),
                    fallback: Rgba::TRANSPARENT,
                },
                (fill, _) => fill,
            };
            match resolve_custom_boundary(attrs, catalog) {
                ShapeMask::Vector(ClipShape::Polygon { points }) => Ok(PaintBody::Polygon {
                    points,
                    fill,
                    stroke: stroke_style(&attrs.paint),
                }),
                ShapeMask::Vector(ClipShape::Circle { radius }) => Ok(PaintBody::Circle {
                    radius,
                    fill,
                    stroke: stroke_style(&attrs.paint),
                }),
                ShapeMask::Image { url } => {
                    if !(positive(attrs.width) && positive(attrs.height)) {
                        return Err(format!("degenerate size {}x{}", attrs.width, attrs.height));
                    }
                    Ok(PaintBody::MaskedBox {
                        bounds: centered_bounds(attrs.width, attrs.height),
                        mask_image: url,
                        fill: fill_style(&attrs.paint),
                    })
                }
                ShapeMask::None => {
                    if !(positive(attrs.width) && positive(attrs.height)) {
                        return Err(format!("degenerate size {}x{}", attrs.width, attrs.height));
                    }
                    Ok(PaintBody::Rect {
                        bounds: centered_bounds(attrs.width, attrs.height),
                        fill: fill_style(&attrs.paint),
                        stroke: stroke_style(&attrs.paint),
                    })
                }
            }
        }
        ElementKind::Image(attrs) => {
            let src = match content {
                Content::Image(src) => src.clone(),
                _ => attrs.image.clone(),
            }
            .ok_or_else(|| "no image source".to_string())?;
            if !(positive(attrs.width) && positive(attrs.height)) {
                return Err(format!("degenerate size {}x{}", attrs.width, attrs.height));
            }
            Ok(PaintBody::Image {
                src,
                width: attrs.width,
                height: attrs.height,
                mask: resolve_image_mask(attrs, catalog),
            })
        }
    }
}
