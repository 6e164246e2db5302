//! Scene export to image/document formats.
//!
//! Renders a [`Scene`] to PNG, JPEG, SVG or PDF using the SVG painter and
//! the resvg/tiny-skia rasterization pipeline.
//!
//! PDF export is two-pass. The scene minus its text items is rasterized
//! into a full-page image, then every text run is written on top as
//! selectable vector text at the same position, size and rotation. Text is
//! therefore drawn exactly once. Canvas pixels map to PDF points through
//! the single constant [`PT_PER_PX`].

use std::collections::HashMap;

use card_core::{
    compose_record, CompositionOptions, FontStyle, Placement, Record, Scene, ShapeCatalog,
    Template, TextRun,
};
use image::ImageEncoder;
use serde::{Deserialize, Serialize};

use crate::assets::AssetCache;
use crate::backend::raster::rasterize_svg;
use crate::error::{RenderError, RenderResult};
use crate::image::encode_data_uri;
use crate::svg::paint_svg_sized;

/// PDF points per canvas pixel (CSS pixels at 96 dpi, points at 72 dpi).
///
/// Page sizes, text positions and font sizes all go through this ratio, so
/// an 800×600 canvas becomes an 800×600 px (600×450 pt) page.
pub const PT_PER_PX: f64 = 0.75;

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PNG image.
    Png,
    /// JPEG image.
    Jpeg,
    /// SVG vector graphics (returns the SVG XML string as UTF-8 bytes).
    Svg,
    /// PDF document: raster page with a vector text layer.
    Pdf,
}

impl ExportFormat {
    /// MIME type of the encoded output.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
        }
    }

    /// Conventional file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }
}

/// Configuration for scene export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output width in pixels (default: scene canvas width).
    pub width: Option<u32>,
    /// Output height in pixels (default: scene canvas height).
    pub height: Option<u32>,
    /// Color that translucent pixels are flattened onto (JPEG, PDF raster).
    pub background: [u8; 4],
    /// JPEG quality 1-100 (default: 85).
    pub jpeg_quality: u8,
    /// Scale factor (e.g. 2.0 for a sharper PDF raster layer).
    pub scale: f32,
    /// PDF document title.
    pub title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            background: [255, 255, 255, 255],
            jpeg_quality: 85,
            scale: 1.0,
            title: "ID Card".to_string(),
        }
    }
}

/// Standard PDF font family standing in for a CSS family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdfFamily {
    /// Helvetica (sans-serif; the default).
    Helvetica,
    /// Times (serif).
    Times,
    /// Courier (monospace).
    Courier,
}

/// Built-in PDF face used for one text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PdfFace {
    /// Family.
    pub family: PdfFamily,
    /// Bold weight.
    pub bold: bool,
    /// Italic slant.
    pub italic: bool,
}

impl PdfFace {
    /// Pick the standard face closest to a CSS family and style.
    #[must_use]
    pub fn for_font(family: &str, style: FontStyle) -> Self {
        let lower = family.to_ascii_lowercase();
        let family = if lower.contains("courier") || lower.contains("mono") {
            PdfFamily::Courier
        } else if lower.contains("times") || (lower.contains("serif") && !lower.contains("sans")) {
            PdfFamily::Times
        } else {
            PdfFamily::Helvetica
        };
        Self {
            family,
            bold: style.bold,
            italic: style.italic,
        }
    }

    fn builtin(self) -> printpdf::BuiltinFont {
        use printpdf::BuiltinFont as F;
        match (self.family, self.bold, self.italic) {
            (PdfFamily::Helvetica, false, false) => F::Helvetica,
            (PdfFamily::Helvetica, true, false) => F::HelveticaBold,
            (PdfFamily::Helvetica, false, true) => F::HelveticaOblique,
            (PdfFamily::Helvetica, true, true) => F::HelveticaBoldOblique,
            (PdfFamily::Times, false, false) => F::TimesRoman,
            (PdfFamily::Times, true, false) => F::TimesBold,
            (PdfFamily::Times, false, true) => F::TimesItalic,
            (PdfFamily::Times, true, true) => F::TimesBoldItalic,
            (PdfFamily::Courier, false, false) => F::Courier,
            (PdfFamily::Courier, true, false) => F::CourierBold,
            (PdfFamily::Courier, false, true) => F::CourierOblique,
            (PdfFamily::Courier, true, true) => F::CourierBoldOblique,
        }
    }
}

/// One line of vector text in PDF page space.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfTextLine {
    /// Line content.
    pub text: String,
    /// Baseline start X in points from the left page edge.
    pub x: f64,
    /// Baseline start Y in points from the bottom page edge.
    pub y: f64,
    /// Font size in points.
    pub size: f64,
    /// Counter-clockwise rotation in degrees (PDF convention).
    pub rotation: f64,
    /// Face.
    pub face: PdfFace,
    /// Fill color channels in `[0, 1]`.
    pub color: (f64, f64, f64),
}

/// Map the scene's fully opaque text lines into PDF page space.
///
/// Text with any transparency, from the element's opacity or its fill
/// alpha, is left to the raster layer so it looks the same as the preview.
/// Each line's start is its box-space baseline point rotated about the
/// element origin, then flipped to the bottom-up PDF axis and scaled by
/// [`PT_PER_PX`].
#[must_use]
pub fn pdf_text_lines(scene: &Scene) -> Vec<PdfTextLine> {
    scene
        .vector_text_items()
        .flat_map(|(placement, run)| run_lines(scene.height, placement, run))
        .collect()
}

fn run_lines<'a>(
    canvas_height: f64,
    placement: &'a Placement,
    run: &'a TextRun,
) -> impl Iterator<Item = PdfTextLine> + 'a {
    let (sin, cos) = placement.rotation.to_radians().sin_cos();
    let face = PdfFace::for_font(&run.font_family, run.font_style);
    run.lines
        .iter()
        .filter(|line| !line.text.trim().is_empty())
        .map(move |line| {
            let cx = placement.x + line.x * cos - line.baseline * sin;
            let cy = placement.y + line.x * sin + line.baseline * cos;
            PdfTextLine {
                text: line.text.clone(),
                x: cx * PT_PER_PX,
                y: (canvas_height - cy) * PT_PER_PX,
                size: run.font_size * PT_PER_PX,
                rotation: -placement.rotation,
                face,
                color: run.color.to_unit(),
            }
        })
}

/// Exports a [`Scene`] to various image and document formats.
pub struct SceneExporter {
    config: ExportConfig,
}

impl SceneExporter {
    /// Create a new exporter with the given configuration.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Create an exporter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ExportConfig::default())
    }

    /// Get the exporter configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export a scene to the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene cannot be rendered or encoded.
    pub fn export(
        &self,
        scene: &Scene,
        assets: &AssetCache,
        format: ExportFormat,
    ) -> RenderResult<Vec<u8>> {
        tracing::info!(?format, items = scene.items.len(), "Exporting scene");
        match format {
            ExportFormat::Png => self.render_to_png(scene, assets),
            ExportFormat::Jpeg => self.render_to_jpeg(scene, assets),
            ExportFormat::Svg => Ok(self.render_to_svg(scene, assets).into_bytes()),
            ExportFormat::Pdf => self.render_to_pdf(scene, assets),
        }
    }

    /// Export a scene as a `data:` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene cannot be rendered or encoded.
    pub fn export_data_url(
        &self,
        scene: &Scene,
        assets: &AssetCache,
        format: ExportFormat,
    ) -> RenderResult<String> {
        let bytes = self.export(scene, assets, format)?;
        Ok(encode_data_uri(format.mime(), &bytes))
    }

    /// Compose `template` for one record (never editable) and export it.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene cannot be rendered or encoded.
    pub fn export_record(
        &self,
        template: &Template,
        record: &Record,
        catalog: Option<&ShapeCatalog>,
        assets: &AssetCache,
        format: ExportFormat,
    ) -> RenderResult<Vec<u8>> {
        let scene = compose_record(template, record, catalog, &CompositionOptions::default());
        self.export(&scene, assets, format)
    }

    /// Render one PDF page per record.
    ///
    /// Bindings are resolved separately for every record.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty record list, or an error if
    /// any page cannot be rendered.
    pub fn export_batch(
        &self,
        template: &Template,
        records: &[Record],
        catalog: Option<&ShapeCatalog>,
        assets: &AssetCache,
    ) -> RenderResult<Vec<u8>> {
        if records.is_empty() {
            return Err(card_core::CardError::Validation(
                "No records to export".to_string(),
            )
            .into());
        }
        let scenes: Vec<Scene> = records
            .iter()
            .map(|record| {
                compose_record(template, record, catalog, &CompositionOptions::default())
            })
            .collect();
        tracing::info!(template = %template.name, pages = scenes.len(), "Exporting batch PDF");
        self.render_pages_pdf(&scenes, assets)
    }

    /// Export the scene to PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or encoding fails.
    pub fn render_to_png(&self, scene: &Scene, assets: &AssetCache) -> RenderResult<Vec<u8>> {
        let pixmap = self.rasterize(scene, assets)?;

        pixmap
            .encode_png()
            .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))
    }

    /// Export the scene to JPEG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or encoding fails.
    pub fn render_to_jpeg(&self, scene: &Scene, assets: &AssetCache) -> RenderResult<Vec<u8>> {
        let pixmap = self.rasterize(scene, assets)?;
        let rgb_data = self.flatten(&pixmap);

        let mut buf = std::io::Cursor::new(Vec::new());
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality);
        encoder
            .write_image(
                &rgb_data,
                pixmap.width(),
                pixmap.height(),
                image::ColorType::Rgb8.into(),
            )
            .map_err(|e| RenderError::Export(format!("JPEG encoding failed: {e}")))?;

        Ok(buf.into_inner())
    }

    /// Export the scene to an SVG string.
    #[must_use]
    pub fn render_to_svg(&self, scene: &Scene, assets: &AssetCache) -> String {
        let (out_w, out_h) = self.output_dimensions(scene);
        paint_svg_sized(scene, assets, out_w, out_h)
    }

    /// Export the scene to a single-page PDF.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or PDF generation fails.
    pub fn render_to_pdf(&self, scene: &Scene, assets: &AssetCache) -> RenderResult<Vec<u8>> {
        self.render_pages_pdf(std::slice::from_ref(scene), assets)
    }

    /// Rasterize the layer underneath the PDF text: the scene without the
    /// text emitted as vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterization fails.
    pub fn render_pdf_raster(
        &self,
        scene: &Scene,
        assets: &AssetCache,
    ) -> RenderResult<tiny_skia::Pixmap> {
        self.rasterize(&scene.without_vector_text(), assets)
    }

    /// Export scenes as consecutive pages of one PDF.
    ///
    /// # Errors
    ///
    /// Returns an error if `scenes` is empty, or if rendering or PDF
    /// generation fails.
    #[allow(clippy::cast_possible_truncation)]
    pub fn render_pages_pdf(&self, scenes: &[Scene], assets: &AssetCache) -> RenderResult<Vec<u8>> {
        use printpdf::{
            Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, Pt, Rgb, TextMatrix,
        };

        let Some(first) = scenes.first() else {
            return Err(RenderError::Export("No pages to export".to_string()));
        };
        let page_size = |scene: &Scene| {
            (
                Mm::from(Pt((scene.width * PT_PER_PX) as f32)),
                Mm::from(Pt((scene.height * PT_PER_PX) as f32)),
            )
        };

        let (w, h) = page_size(first);
        let (doc, page1, layer1) = PdfDocument::new(&self.config.title, w, h, "Card");
        let mut fonts: HashMap<PdfFace, IndirectFontRef> = HashMap::new();

        for (page_index, scene) in scenes.iter().enumerate() {
            let layer = if page_index == 0 {
                doc.get_page(page1).get_layer(layer1)
            } else {
                let (w, h) = page_size(scene);
                let (page, layer) = doc.add_page(w, h, "Card");
                doc.get_page(page).get_layer(layer)
            };

            // Pass 1: everything but text, as one full-page image.
            let pixmap = self.render_pdf_raster(scene, assets)?;
            let rgb = self.flatten(&pixmap);
            let buffer =
                printpdf::image_crate::RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb)
                    .ok_or_else(|| RenderError::Export("Raster buffer size mismatch".to_string()))?;
            let image = Image::from_dynamic_image(
                &printpdf::image_crate::DynamicImage::ImageRgb8(buffer),
            );
            // At this dpi the image spans exactly the page.
            let dpi = f64::from(pixmap.width()) / (scene.width * PT_PER_PX) * 72.0;
            image.add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(0.0)),
                    translate_y: Some(Mm(0.0)),
                    dpi: Some(dpi as f32),
                    ..Default::default()
                },
            );

            // Pass 2: vector text.
            for line in pdf_text_lines(scene) {
                let font = match fonts.get(&line.face) {
                    Some(font) => font.clone(),
                    None => {
                        let font = doc
                            .add_builtin_font(line.face.builtin())
                            .map_err(|e| RenderError::Export(format!("PDF font failed: {e}")))?;
                        fonts.insert(line.face, font.clone());
                        font
                    }
                };
                let (r, g, b) = line.color;
                layer.begin_text_section();
                layer.set_fill_color(Color::Rgb(Rgb::new(r as f32, g as f32, b as f32, None)));
                layer.set_font(&font, line.size as f32);
                layer.set_text_matrix(TextMatrix::TranslateRotate(
                    Pt(line.x as f32),
                    Pt(line.y as f32),
                    line.rotation as f32,
                ));
                layer.write_text(line.text.as_str(), &font);
                layer.end_text_section();
            }
            tracing::debug!(page = page_index + 1, "PDF page written");
        }

        doc.save_to_bytes()
            .map_err(|e| RenderError::Export(format!("PDF save failed: {e}")))
    }

    /// Get output dimensions (width, height) in pixels.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn output_dimensions(&self, scene: &Scene) -> (u32, u32) {
        let base_w = self
            .config
            .width
            .unwrap_or_else(|| scene.width.max(1.0).round() as u32);
        let base_h = self
            .config
            .height
            .unwrap_or_else(|| scene.height.max(1.0).round() as u32);

        let scale = if self.config.scale.is_finite() && self.config.scale > 0.0 {
            self.config.scale
        } else {
            1.0
        };
        let out_w = (base_w as f32 * scale).round() as u32;
        let out_h = (base_h as f32 * scale).round() as u32;
        (out_w.max(1), out_h.max(1))
    }

    fn rasterize(&self, scene: &Scene, assets: &AssetCache) -> RenderResult<tiny_skia::Pixmap> {
        let (out_w, out_h) = self.output_dimensions(scene);
        rasterize_svg(&paint_svg_sized(scene, assets, out_w, out_h))
    }

    /// Composite premultiplied pixels over the configured background.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn flatten(&self, pixmap: &tiny_skia::Pixmap) -> Vec<u8> {
        let bg = &self.config.background;
        let mut rgb_data = Vec::with_capacity(pixmap.data().len() / 4 * 3);
        for pixel in pixmap.data().chunks_exact(4) {
            let inv = 1.0 - f32::from(pixel[3]) / 255.0;
            for channel in 0..3 {
                let value = f32::from(bg[channel]).mul_add(inv, f32::from(pixel[channel]));
                rgb_data.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
        rgb_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_core::{Element, ElementKind};

    fn text_template(x: f64, y: f64, rotation: f64) -> Template {
        Template::new("t").with_element(Element::text().at(x, y).with_rotation(rotation))
    }

    fn scene_for(template: &Template, record: &Record) -> Scene {
        compose_record(template, record, None, &CompositionOptions::default())
    }

    #[test]
    fn test_svg_export_empty_scene() {
        let scene = scene_for(&Template::new("t"), &Record::new());
        let exporter = SceneExporter::with_defaults();
        let svg = exporter.render_to_svg(&scene, &AssetCache::new());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("width=\"800\""));
        assert!(svg.contains("height=\"600\""));
    }

    #[test]
    fn test_png_export_produces_valid_bytes() {
        let scene = scene_for(&text_template(10.0, 20.0, 0.0), &Record::new());
        let exporter = SceneExporter::with_defaults();
        let png = exporter
            .render_to_png(&scene, &AssetCache::new())
            .expect("png export");

        // PNG magic bytes: \x89PNG
        assert!(png.len() > 8);
        assert_eq!(&png[0..4], &[137, 80, 78, 71]);
    }

    #[test]
    fn test_jpeg_export_produces_valid_bytes() {
        let scene = scene_for(&text_template(10.0, 20.0, 0.0), &Record::new());
        let exporter = SceneExporter::with_defaults();
        let jpeg = exporter
            .render_to_jpeg(&scene, &AssetCache::new())
            .expect("jpeg export");

        // JPEG magic bytes: FFD8
        assert!(jpeg.len() > 2);
        assert_eq!(jpeg[0], 0xFF);
        assert_eq!(jpeg[1], 0xD8);
    }

    #[test]
    fn test_export_dispatch() {
        let scene = scene_for(&text_template(10.0, 20.0, 0.0), &Record::new());
        let exporter = SceneExporter::with_defaults();
        let assets = AssetCache::new();

        let png = exporter.export(&scene, &assets, ExportFormat::Png).expect("png");
        assert_eq!(&png[0..4], &[137, 80, 78, 71]);

        let jpeg = exporter.export(&scene, &assets, ExportFormat::Jpeg).expect("jpeg");
        assert_eq!(jpeg[0], 0xFF);

        let svg = exporter.export(&scene, &assets, ExportFormat::Svg).expect("svg");
        let svg_str = String::from_utf8(svg).expect("utf8");
        assert!(svg_str.starts_with("<svg"));

        let pdf = exporter.export(&scene, &assets, ExportFormat::Pdf).expect("pdf");
        assert_eq!(&pdf[0..5], b"%PDF-");
    }

    #[test]
    fn test_data_url() {
        let scene = scene_for(&Template::new("t"), &Record::new());
        let url = SceneExporter::with_defaults()
            .export_data_url(&scene, &AssetCache::new(), ExportFormat::Png)
            .expect("data url");
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_scale_factor() {
        let scene = scene_for(&Template::new("t"), &Record::new());
        let exporter = SceneExporter::new(ExportConfig {
            scale: 2.0,
            ..Default::default()
        });

        let svg = exporter.render_to_svg(&scene, &AssetCache::new());
        assert!(svg.contains("width=\"1600\""));
        assert!(svg.contains("height=\"1200\""));
        assert!(svg.contains("viewBox=\"0 0 800 600\""));
    }

    #[test]
    fn test_custom_dimensions() {
        let scene = scene_for(&Template::new("t"), &Record::new());
        let exporter = SceneExporter::new(ExportConfig {
            width: Some(400),
            height: Some(300),
            ..Default::default()
        });

        let svg = exporter.render_to_svg(&scene, &AssetCache::new());
        assert!(svg.contains("width=\"400\""));
        assert!(svg.contains("height=\"300\""));
    }

    #[test]
    fn test_pdf_text_coordinates_unrotated() {
        let scene = scene_for(&text_template(100.0, 200.0, 0.0), &Record::new());
        let lines = pdf_text_lines(&scene);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.text, "Sample Text");
        // Baseline sits 0.8 * 16 below the box top.
        assert!((line.x - 75.0).abs() < 1e-9);
        assert!((line.y - (600.0 - 212.8) * PT_PER_PX).abs() < 1e-9);
        assert!((line.size - 12.0).abs() < 1e-9);
        assert_eq!(line.rotation, 0.0);
        assert_eq!(line.face.family, PdfFamily::Helvetica);
    }

    #[test]
    fn test_pdf_text_coordinates_rotated() {
        let scene = scene_for(&text_template(100.0, 100.0, 90.0), &Record::new());
        let line = &pdf_text_lines(&scene)[0];
        // A clockwise quarter turn moves the baseline offset onto -x.
        assert!((line.x - (100.0 - 12.8) * PT_PER_PX).abs() < 1e-9);
        assert!((line.y - 500.0 * PT_PER_PX).abs() < 1e-9);
        assert_eq!(line.rotation, -90.0);
    }

    #[test]
    fn test_pdf_face_mapping() {
        let bold = FontStyle {
            bold: true,
            italic: false,
        };
        assert_eq!(
            PdfFace::for_font("Times New Roman", bold).builtin(),
            printpdf::BuiltinFont::TimesBold
        );
        assert_eq!(
            PdfFace::for_font("Courier New", FontStyle::default()).builtin(),
            printpdf::BuiltinFont::Courier
        );
        assert_eq!(
            PdfFace::for_font("sans-serif", FontStyle::default()).family,
            PdfFamily::Helvetica
        );
        assert_eq!(
            PdfFace::for_font("Georgia, serif", FontStyle::default()).family,
            PdfFamily::Times
        );
    }

    #[test]
    fn test_pdf_skips_invisible_text() {
        let mut transparent = Element::text().at(100.0, 300.0);
        if let ElementKind::Text(attrs) = &mut transparent.kind {
            attrs.fill = "transparent".to_string();
        }
        let template = Template::new("t")
            .with_element(Element::text().at(100.0, 100.0).with_opacity(0.0))
            .with_element(transparent);
        let scene = scene_for(&template, &Record::new());
        assert!(pdf_text_lines(&scene).is_empty());

        // Nothing shows up in the raster layer either.
        let raster = SceneExporter::with_defaults()
            .render_pdf_raster(&scene, &AssetCache::new())
            .expect("raster");
        assert!(raster.data().iter().all(|&b| b == 255));
    }

    #[test]
    fn test_pdf_translucent_text_is_rasterized() {
        let template = Template::new("t").with_element(Element::text().with_opacity(0.5));
        let scene = scene_for(&template, &Record::new().with("name", "Ada"));
        assert!(pdf_text_lines(&scene).is_empty());
        assert_eq!(scene.without_vector_text().text_items().count(), 1);
    }

    #[test]
    fn test_pdf_raster_excludes_text() {
        let mut element = Element::text().at(0.0, 0.0);
        if let ElementKind::Text(attrs) = &mut element.kind {
            attrs.font_size = 60.0;
            attrs.width = 800.0;
            attrs.height = 600.0;
        }
        let template = Template::new("t").with_element(element);
        let scene = scene_for(&template, &Record::new().with("name", "WWWWWWWW"));
        let exporter = SceneExporter::with_defaults();
        let raster = exporter
            .render_pdf_raster(&scene, &AssetCache::new())
            .expect("raster");
        assert!(raster.data().iter().all(|&b| b == 255));
    }

    #[test]
    fn test_batch_requires_records() {
        let exporter = SceneExporter::with_defaults();
        let err = exporter
            .export_batch(&Template::new("t"), &[], None, &AssetCache::new())
            .expect_err("empty batch");
        assert!(matches!(
            err,
            RenderError::Core(card_core::CardError::Validation(_))
        ));
        assert!(exporter
            .render_pages_pdf(&[], &AssetCache::new())
            .is_err());
    }

    #[test]
    fn test_flatten_composites_premultiplied_pixels() {
        let exporter = SceneExporter::with_defaults();
        let mut pixmap = tiny_skia::Pixmap::new(1, 1).expect("pixmap");
        // Transparent pixel over a white background stays white.
        assert_eq!(exporter.flatten(&pixmap), vec![255, 255, 255]);
        pixmap.fill(tiny_skia::Color::from_rgba8(0, 0, 0, 255));
        assert_eq!(exporter.flatten(&pixmap), vec![0, 0, 0]);
    }
}
