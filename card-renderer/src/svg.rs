//! SVG paint backend.
//!
//! Walks a composed [`Scene`] and emits one SVG document. Every backend
//! paints through this module: the interactive surface rasterizes its
//! output, the export pipeline rasterizes it (PNG, JPEG, PDF raster layer)
//! or returns it verbatim (SVG).
//!
//! Images are read from the [`AssetCache`] only. A source that is not
//! loaded is painted as absent: image elements are skipped, pattern fills
//! fall back to their solid color and mask images leave the element
//! unclipped.

use std::fmt::Write;

use card_core::{
    Bounds, ClipShape, Decoration, FillStyle, PaintBody, PaintItem, PatternRepeat, Placement,
    Point, Rgba, Scene, ShapeMask, StrokeStyle, TextRun,
};

use crate::assets::AssetCache;

/// Outline color of the selection decoration.
pub const SELECTION_COLOR: &str = "#1e90ff";

/// Side of a corner resize handle.
pub const HANDLE_SIZE: f64 = 8.0;

/// Radius of the remove affordance.
pub const REMOVE_RADIUS: f64 = 10.0;

/// Paint a scene at its own size.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn paint_svg(scene: &Scene, assets: &AssetCache) -> String {
    let width = scene.width.max(1.0).round() as u32;
    let height = scene.height.max(1.0).round() as u32;
    paint_svg_sized(scene, assets, width, height)
}

/// Paint a scene into an `out_width`×`out_height` document.
///
/// The view box is always the scene's canvas, so a larger output scales the
/// drawing rather than revealing more of it.
#[must_use]
pub fn paint_svg_sized(scene: &Scene, assets: &AssetCache, out_width: u32, out_height: u32) -> String {
    let mut painter = SvgPainter::new(assets, scene);
    painter.background(scene);
    for item in &scene.items {
        painter.item(item);
    }
    if let Some(decoration) = &scene.decoration {
        painter.decoration(decoration);
    }
    painter.finish(scene, out_width, out_height)
}

struct SvgPainter<'a> {
    assets: &'a AssetCache,
    canvas: (f64, f64),
    defs: String,
    body: String,
    next_id: usize,
}

impl<'a> SvgPainter<'a> {
    fn new(assets: &'a AssetCache, scene: &Scene) -> Self {
        Self {
            assets,
            canvas: (scene.width, scene.height),
            defs: String::new(),
            body: String::with_capacity(4096),
            next_id: 0,
        }
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn image_href(&self, url: &str) -> Option<String> {
        self.assets.get(url).map(|image| escape_xml(&image.data_uri()))
    }

    fn finish(self, scene: &Scene, out_width: u32, out_height: u32) -> String {
        let mut svg = String::with_capacity(self.defs.len() + self.body.len() + 256);
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{out_width}\" height=\"{out_height}\" viewBox=\"0 0 {} {}\">",
            scene.width, scene.height,
        );
        if !self.defs.is_empty() {
            let _ = write!(svg, "<defs>{}</defs>", self.defs);
        }
        svg.push_str(&self.body);
        svg.push_str("</svg>");
        svg
    }

    fn background(&mut self, scene: &Scene) {
        let (w, h) = (scene.width, scene.height);
        let _ = write!(
            self.body,
            "<rect x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\"{}/>",
            paint_attr("fill", scene.background.color),
        );
        if let Some(url) = &scene.background.image {
            match self.image_href(url) {
                Some(href) => {
                    let _ = write!(
                        self.body,
                        "<image x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\" preserveAspectRatio=\"none\" xlink:href=\"{href}\"/>",
                    );
                }
                None => tracing::debug!(%url, "Background image not loaded"),
            }
        }
    }

    fn item(&mut self, item: &PaintItem) {
        let mut content = String::new();
        if !self.body_svg(&item.body, &mut content) {
            tracing::debug!(index = item.index, "Nothing painted for element");
            return;
        }
        let placement = &item.placement;
        let (cw, ch) = self.canvas;
        let filter = placement.shadow.map(|shadow| {
            let id = self.id("shadow");
            let _ = write!(
                self.defs,
                "<filter id=\"{id}\" filterUnits=\"userSpaceOnUse\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"><feDropShadow dx=\"{}\" dy=\"{}\" stdDeviation=\"{}\" flood-color=\"{}\" flood-opacity=\"{}\"/></filter>",
                -cw,
                -ch,
                3.0 * cw,
                3.0 * ch,
                shadow.offset_x,
                shadow.offset_y,
                shadow.blur / 2.0,
                shadow.color.to_svg_rgb(),
                shadow.color.a,
            );
            id
        });
        if let Some(id) = &filter {
            let _ = write!(self.body, "<g filter=\"url(#{id})\">");
        }
        let _ = write!(self.body, "<g{}{}>", transform_attr(placement), opacity_attr(placement));
        self.body.push_str(&content);
        self.body.push_str("</g>");
        if filter.is_some() {
            self.body.push_str("</g>");
        }
    }

    /// Append the body's markup to `out`; `false` when nothing is painted.
    fn body_svg(&mut self, body: &PaintBody, out: &mut String) -> bool {
        match body {
            PaintBody::Text(run) => {
                text_svg(run, out);
                true
            }
            PaintBody::Rect {
                bounds,
                fill,
                stroke,
            } => {
                let fill = self.fill_attrs(fill, *bounds);
                let _ = write!(
                    out,
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"{fill}{}/>",
                    bounds.x,
                    bounds.y,
                    bounds.width,
                    bounds.height,
                    stroke_attrs(stroke.as_ref()),
                );
                true
            }
            PaintBody::Circle {
                radius,
                fill,
                stroke,
            } => {
                let r = *radius;
                let fill = self.fill_attrs(
                    fill,
                    Bounds {
                        x: -r,
                        y: -r,
                        width: 2.0 * r,
                        height: 2.0 * r,
                    },
                );
                let _ = write!(
                    out,
                    "<circle cx=\"0\" cy=\"0\" r=\"{r}\"{fill}{}/>",
                    stroke_attrs(stroke.as_ref()),
                );
                true
            }
            PaintBody::Polygon {
                points,
                fill,
                stroke,
            } => {
                let Some(bounds) = point_bounds(points) else {
                    return false;
                };
                let fill = self.fill_attrs(fill, bounds);
                let _ = write!(
                    out,
                    "<polygon points=\"{}\"{fill}{}/>",
                    points_attr(points),
                    stroke_attrs(stroke.as_ref()),
                );
                true
            }
            PaintBody::Image {
                src,
                width,
                height,
                mask,
            } => self.image_svg(src, *width, *height, mask, out),
            PaintBody::MaskedBox {
                bounds,
                mask_image,
                fill,
            } => {
                let fill = self.fill_attrs(fill, *bounds);
                let mask = match self.image_href(mask_image) {
                    Some(href) => {
                        let id = self.id("mask");
                        let _ = write!(
                            self.defs,
                            "<mask id=\"{id}\" mask-type=\"alpha\" maskUnits=\"userSpaceOnUse\" x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\"><image x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\" preserveAspectRatio=\"none\" xlink:href=\"{href}\"/></mask>",
                            x = bounds.x,
                            y = bounds.y,
                            w = bounds.width,
                            h = bounds.height,
                        );
                        format!(" mask=\"url(#{id})\"")
                    }
                    None => {
                        tracing::debug!(url = %mask_image, "Shape mask not loaded, painting box");
                        String::new()
                    }
                };
                let _ = write!(
                    out,
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"{fill}{mask}/>",
                    bounds.x, bounds.y, bounds.width, bounds.height,
                );
                true
            }
        }
    }

    fn image_svg(
        &mut self,
        src: &str,
        width: f64,
        height: f64,
        mask: &ShapeMask,
        out: &mut String,
    ) -> bool {
        let Some(href) = self.image_href(src) else {
            tracing::debug!(url = %src, "Image not loaded, skipping element");
            return false;
        };
        let (cx, cy) = (width / 2.0, height / 2.0);
        let clip = match mask {
            ShapeMask::None => String::new(),
            ShapeMask::Vector(shape) => {
                let id = self.id("clip");
                let path = match shape {
                    ClipShape::Circle { radius } => {
                        format!("<circle cx=\"{cx}\" cy=\"{cy}\" r=\"{radius}\"/>")
                    }
                    ClipShape::Polygon { points } => format!(
                        "<polygon transform=\"translate({cx} {cy})\" points=\"{}\"/>",
                        points_attr(points)
                    ),
                };
                let _ = write!(self.defs, "<clipPath id=\"{id}\">{path}</clipPath>");
                format!(" clip-path=\"url(#{id})\"")
            }
            ShapeMask::Image { url } => match self.image_href(url) {
                Some(mask_href) => {
                    let id = self.id("mask");
                    let _ = write!(
                        self.defs,
                        "<mask id=\"{id}\" mask-type=\"alpha\" maskUnits=\"userSpaceOnUse\" x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\"><image x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" preserveAspectRatio=\"none\" xlink:href=\"{mask_href}\"/></mask>",
                    );
                    format!(" mask=\"url(#{id})\"")
                }
                None => {
                    tracing::debug!(%url, "Shape mask not loaded, painting unclipped");
                    String::new()
                }
            },
        };
        let _ = write!(
            out,
            "<image x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" preserveAspectRatio=\"none\"{clip} xlink:href=\"{href}\"/>",
        );
        true
    }

    /// Fill attributes for a body whose local bounding box is `bounds`.
    fn fill_attrs(&mut self, fill: &FillStyle, bounds: Bounds) -> String {
        match fill {
            FillStyle::None => " fill=\"none\"".to_string(),
            FillStyle::Solid(color) => paint_attr("fill", *color),
            FillStyle::Pattern {
                image,
                repeat,
                fallback,
            } => match self.assets.get(image) {
                Some(loaded) => {
                    let href = escape_xml(&loaded.data_uri());
                    let (iw, ih) = (f64::from(loaded.width), f64::from(loaded.height));
                    // A tile taller (wider) than the whole body leaves a
                    // single copy on the axis that must not repeat.
                    let extent_x = bounds.x.abs().max((bounds.x + bounds.width).abs());
                    let extent_y = bounds.y.abs().max((bounds.y + bounds.height).abs());
                    let (tile_w, tile_h) = match repeat {
                        PatternRepeat::Repeat => (iw, ih),
                        PatternRepeat::RepeatX => (iw, ih + 2.0 * extent_y + 1.0),
                        PatternRepeat::RepeatY => (iw + 2.0 * extent_x + 1.0, ih),
                        PatternRepeat::NoRepeat => {
                            (iw + 2.0 * extent_x + 1.0, ih + 2.0 * extent_y + 1.0)
                        }
                    };
                    let id = self.id("pattern");
                    let _ = write!(
                        self.defs,
                        "<pattern id=\"{id}\" patternUnits=\"userSpaceOnUse\" x=\"0\" y=\"0\" width=\"{tile_w}\" height=\"{tile_h}\"><image x=\"0\" y=\"0\" width=\"{iw}\" height=\"{ih}\" xlink:href=\"{href}\"/></pattern>",
                    );
                    format!(" fill=\"url(#{id})\"")
                }
                None => {
                    tracing::debug!(url = %image, "Pattern not loaded, using solid fill");
                    paint_attr("fill", *fallback)
                }
            },
            FillStyle::Stretch { image, fallback } => match self.image_href(image) {
                Some(href) => {
                    let id = self.id("pattern");
                    let _ = write!(
                        self.defs,
                        "<pattern id=\"{id}\" patternUnits=\"userSpaceOnUse\" x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\"><image x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\" preserveAspectRatio=\"none\" xlink:href=\"{href}\"/></pattern>",
                        x = bounds.x,
                        y = bounds.y,
                        w = bounds.width,
                        h = bounds.height,
                    );
                    format!(" fill=\"url(#{id})\"")
                }
                None => {
                    tracing::debug!(url = %image, "Shape image not loaded, using solid fill");
                    paint_attr("fill", *fallback)
                }
            },
        }
    }

    fn decoration(&mut self, decoration: &Decoration) {
        let b = decoration.bounds;
        let _ = write!(
            self.body,
            "<g transform=\"translate({} {}) rotate({})\">",
            decoration.x, decoration.y, decoration.rotation,
        );
        let _ = write!(
            self.body,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"{SELECTION_COLOR}\" stroke-width=\"1\" stroke-dasharray=\"4 4\"/>",
            b.x, b.y, b.width, b.height,
        );
        let half = HANDLE_SIZE / 2.0;
        for (hx, hy) in [
            (b.x, b.y),
            (b.x + b.width, b.y),
            (b.x, b.y + b.height),
            (b.x + b.width, b.y + b.height),
        ] {
            let _ = write!(
                self.body,
                "<rect x=\"{}\" y=\"{}\" width=\"{HANDLE_SIZE}\" height=\"{HANDLE_SIZE}\" fill=\"white\" stroke=\"{SELECTION_COLOR}\" stroke-width=\"1\"/>",
                hx - half,
                hy - half,
            );
        }
        let (rx, ry) = (b.x + b.width, b.y);
        let arm = REMOVE_RADIUS * 0.4;
        let _ = write!(
            self.body,
            "<circle cx=\"{rx}\" cy=\"{ry}\" r=\"{REMOVE_RADIUS}\" fill=\"red\"/><path d=\"M{} {} L{} {} M{} {} L{} {}\" stroke=\"white\" stroke-width=\"2\"/>",
            rx - arm,
            ry - arm,
            rx + arm,
            ry + arm,
            rx + arm,
            ry - arm,
            rx - arm,
            ry + arm,
        );
        self.body.push_str("</g>");
    }
}

fn text_svg(run: &TextRun, out: &mut String) {
    let weight = if run.font_style.bold {
        " font-weight=\"bold\""
    } else {
        ""
    };
    let style = if run.font_style.italic {
        " font-style=\"italic\""
    } else {
        ""
    };
    let _ = write!(
        out,
        "<text font-family=\"{}\" font-size=\"{}\"{weight}{style}{} xml:space=\"preserve\">",
        escape_xml(&run.font_family),
        run.font_size,
        paint_attr("fill", run.color),
    );
    for line in &run.lines {
        let _ = write!(
            out,
            "<tspan x=\"{}\" y=\"{}\">{}</tspan>",
            line.x,
            line.baseline,
            escape_xml(&line.text),
        );
    }
    out.push_str("</text>");
}

fn transform_attr(placement: &Placement) -> String {
    if placement.rotation == 0.0 {
        format!(" transform=\"translate({} {})\"", placement.x, placement.y)
    } else {
        format!(
            " transform=\"translate({} {}) rotate({})\"",
            placement.x, placement.y, placement.rotation
        )
    }
}

fn opacity_attr(placement: &Placement) -> String {
    if placement.opacity < 1.0 {
        format!(" opacity=\"{}\"", placement.opacity)
    } else {
        String::new()
    }
}

/// `name="rgb(..)"` plus `name-opacity` when translucent.
fn paint_attr(name: &str, color: Rgba) -> String {
    if color.is_transparent() {
        return format!(" {name}=\"none\"");
    }
    if color.a < 1.0 {
        format!(
            " {name}=\"{}\" {name}-opacity=\"{}\"",
            color.to_svg_rgb(),
            color.a
        )
    } else {
        format!(" {name}=\"{}\"", color.to_svg_rgb())
    }
}

fn stroke_attrs(stroke: Option<&StrokeStyle>) -> String {
    match stroke {
        Some(stroke) => format!(
            "{} stroke-width=\"{}\"",
            paint_attr("stroke", stroke.color),
            stroke.width
        ),
        None => String::new(),
    }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn point_bounds(points: &[Point]) -> Option<Bounds> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    Some(Bounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

/// Escape special XML characters.
#[must_use]
pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_core::{
        compose_record, CompositionOptions, Element, ElementKind, Record, ShapeType, Template,
    };

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image::RgbaImage::from_pixel(width, height, image::Rgba([0, 128, 0, 255]))
            .write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode");
        buf.into_inner()
    }

    fn scene(template: &Template, record: &Record) -> Scene {
        compose_record(template, record, None, &CompositionOptions::default())
    }

    #[test]
    fn test_empty_template_document() {
        let svg = paint_svg(&scene(&Template::new("t"), &Record::new()), &AssetCache::new());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("width=\"800\""));
        assert!(svg.contains("viewBox=\"0 0 800 600\""));
        assert!(svg.contains("fill=\"rgb(255,255,255)\""));
        assert!(!svg.contains("<defs>"));
    }

    #[test]
    fn test_sized_output_keeps_view_box() {
        let svg = paint_svg_sized(
            &scene(&Template::new("t"), &Record::new()),
            &AssetCache::new(),
            1600,
            1200,
        );
        assert!(svg.contains("width=\"1600\""));
        assert!(svg.contains("viewBox=\"0 0 800 600\""));
    }

    #[test]
    fn test_text_is_escaped_and_placed() {
        let template = Template::new("t").with_element(Element::text().at(10.0, 20.0));
        let record = Record::new().with("name", "A < B & C");
        let svg = paint_svg(&scene(&template, &record), &AssetCache::new());
        assert!(svg.contains("A &lt; B &amp; C"));
        assert!(svg.contains("translate(10 20)"));
        assert!(svg.contains("font-family=\"Arial\""));
        assert!(svg.contains("xml:space=\"preserve\""));
    }

    #[test]
    fn test_rotation_and_opacity() {
        let template = Template::new("t")
            .with_element(Element::rect().at(5.0, 6.0).with_rotation(30.0).with_opacity(0.5));
        let svg = paint_svg(&scene(&template, &Record::new()), &AssetCache::new());
        assert!(svg.contains("translate(5 6) rotate(30)"));
        assert!(svg.contains("opacity=\"0.5\""));
    }

    #[test]
    fn test_unloaded_image_is_skipped() {
        let template = Template::new("t").with_element(Element::image("/missing.png"));
        let svg = paint_svg(&scene(&template, &Record::new()), &AssetCache::new());
        assert!(!svg.contains("<image"));
    }

    #[test]
    fn test_loaded_image_is_embedded_and_clipped() {
        let mut element = Element::image("/photo.png");
        if let ElementKind::Image(attrs) = &mut element.kind {
            attrs.shape_type = Some(ShapeType::Circle);
        }
        let template = Template::new("t").with_element(element);
        let mut assets = AssetCache::new();
        assets.insert_bytes("/photo.png", &png(4, 4)).expect("insert");
        let svg = paint_svg(&scene(&template, &Record::new()), &assets);
        assert!(svg.contains("xlink:href=\"data:image/png;base64,"));
        assert!(svg.contains("<clipPath id="));
        assert!(svg.contains("<circle cx=\"50\" cy=\"50\" r=\"50\"/>"));
    }

    #[test]
    fn test_pattern_falls_back_to_solid_until_loaded() {
        let mut rect = Element::rect();
        if let ElementKind::Rect(attrs) = &mut rect.kind {
            attrs.paint.fill_pattern_image = Some("/dots.png".to_string());
        }
        let template = Template::new("t").with_element(rect);
        let composed = scene(&template, &Record::new());

        let svg = paint_svg(&composed, &AssetCache::new());
        assert!(svg.contains("fill=\"rgb(0,0,255)\""));
        assert!(!svg.contains("<pattern"));

        let mut assets = AssetCache::new();
        assets.insert_bytes("/dots.png", &png(2, 2)).expect("insert");
        let svg = paint_svg(&composed, &assets);
        assert!(svg.contains("<pattern id=\"pattern1\""));
        assert!(svg.contains("fill=\"url(#pattern1)\""));
    }

    #[test]
    fn test_shadow_wraps_rotation() {
        let element = Element::circle().with_rotation(45.0).with_shadow(card_core::Shadow {
            color: "black".to_string(),
            blur: 6.0,
            offset_x: 3.0,
            offset_y: 3.0,
        });
        let template = Template::new("t").with_element(element);
        let svg = paint_svg(&scene(&template, &Record::new()), &AssetCache::new());
        assert!(svg.contains("<feDropShadow dx=\"3\" dy=\"3\" stdDeviation=\"3\""));
        let filter_at = svg.find("<g filter=").expect("filter group");
        let rotate_at = svg.find("rotate(45)").expect("rotation");
        assert!(filter_at < rotate_at);
    }

    #[test]
    fn test_decoration_painted_last() {
        let template = Template::new("t")
            .with_element(Element::rect())
            .with_element(Element::text());
        let composed = compose_record(
            &template,
            &Record::new(),
            None,
            &CompositionOptions::editor(Some(0)),
        );
        let svg = paint_svg(&composed, &AssetCache::new());
        let outline = svg.find("stroke-dasharray").expect("outline");
        assert!(svg.find("<text").expect("text") < outline);
        assert!(svg.contains("fill=\"red\""));

        let plain = paint_svg(&composed.without_decoration(), &AssetCache::new());
        assert!(!plain.contains("stroke-dasharray"));
    }
}
