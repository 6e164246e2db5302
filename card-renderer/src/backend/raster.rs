//! Raster surface: paints scenes through resvg into a pixel buffer.
//!
//! This is the interactive editing surface. It paints exactly what the
//! export pipeline rasterizes, so an editable preview and a non-editable
//! export differ only by the decoration layer.

use std::sync::{Arc, OnceLock};

use card_core::Scene;

use super::{check_size, Frame, RenderBackend};
use crate::assets::AssetCache;
use crate::error::{RenderError, RenderResult};
use crate::svg::paint_svg_sized;
use crate::BackendType;

/// System fonts, loaded once per process.
fn font_database() -> Arc<usvg::fontdb::Database> {
    static FONTS: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            tracing::debug!(faces = db.len(), "Loaded system fonts");
            Arc::new(db)
        })
        .clone()
}

/// Rasterize an SVG string to a tiny-skia Pixmap.
///
/// # Errors
///
/// Returns an error if the SVG cannot be parsed or the pixmap allocated.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rasterize_svg(svg_string: &str) -> RenderResult<tiny_skia::Pixmap> {
    let opt = usvg::Options {
        fontdb: font_database(),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg_string, &opt)
        .map_err(|e| RenderError::Export(format!("SVG parsing failed: {e}")))?;

    let px_w = tree.size().width().round() as u32;
    let px_h = tree.size().height().round() as u32;

    let mut pixmap = tiny_skia::Pixmap::new(px_w.max(1), px_h.max(1))
        .ok_or_else(|| RenderError::Export("Failed to create pixmap".to_string()))?;

    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    Ok(pixmap)
}

/// Backend that paints into pixels.
#[derive(Debug, Clone)]
pub struct RasterBackend {
    width: u32,
    height: u32,
}

impl RasterBackend {
    /// Create a surface of the given pixel size.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is empty.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        check_size(width, height)?;
        Ok(Self { width, height })
    }

    /// Paint a scene and return the raw pixmap.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterization fails.
    pub fn render_pixmap(
        &self,
        scene: &Scene,
        assets: &AssetCache,
    ) -> RenderResult<tiny_skia::Pixmap> {
        rasterize_svg(&paint_svg_sized(scene, assets, self.width, self.height))
    }
}

impl RenderBackend for RasterBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Raster
    }

    fn render(&mut self, scene: &Scene, assets: &AssetCache) -> RenderResult<Frame> {
        let pixmap = self.render_pixmap(scene, assets)?;
        let data = pixmap
            .encode_png()
            .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;
        tracing::debug!(
            items = scene.items.len(),
            width = pixmap.width(),
            height = pixmap.height(),
            "Painted raster frame"
        );
        Ok(Frame::Png {
            width: pixmap.width(),
            height: pixmap.height(),
            data,
        })
    }

    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        check_size(width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_core::{compose_record, CompositionOptions, Element, Record, Template};

    fn pixel(pixmap: &tiny_skia::Pixmap, x: u32, y: u32) -> [u8; 4] {
        let p = pixmap.pixel(x, y).expect("pixel in range");
        [p.red(), p.green(), p.blue(), p.alpha()]
    }

    #[test]
    fn test_background_and_rect_pixels() {
        let template = Template::new("t")
            .with_background("#ff0000", None)
            .with_element(Element::rect().at(10.0, 10.0));
        let scene = compose_record(&template, &Record::new(), None, &CompositionOptions::default());
        let backend = RasterBackend::new(800, 600).expect("backend");
        let pixmap = backend.render_pixmap(&scene, &AssetCache::new()).expect("render");

        assert_eq!(pixel(&pixmap, 700, 500), [255, 0, 0, 255]);
        // Inside the rect, clear of its 2px stroke.
        assert_eq!(pixel(&pixmap, 50, 30), [0, 0, 255, 255]);
    }

    #[test]
    fn test_frame_is_png() {
        let scene = compose_record(
            &Template::new("t"),
            &Record::new(),
            None,
            &CompositionOptions::default(),
        );
        let mut backend = RasterBackend::new(80, 60).expect("backend");
        let frame = backend.render(&scene, &AssetCache::new()).expect("render");
        assert_eq!(frame.extension(), "png");
        let Frame::Png {
            width,
            height,
            data,
        } = frame
        else {
            panic!("expected png frame");
        };
        assert_eq!((width, height), (80, 60));
        assert_eq!(&data[0..4], &[137, 80, 78, 71]);
    }

    #[test]
    fn test_empty_surface_rejected() {
        assert!(RasterBackend::new(0, 600).is_err());
    }
}
