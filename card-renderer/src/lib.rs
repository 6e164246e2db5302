//! # Card Renderer
//!
//! Paint backends for composed ID card scenes.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────────────────────┐
//! │  Scene   │──▶│ SVG painter  │──▶│ SVG backend   (markup)      │
//! │(card-core)│  │ + AssetCache │   │ Raster backend (resvg)      │
//! └──────────┘   └──────────────┘   │ Exporter PNG/JPEG/SVG/PDF   │
//!                                    └─────────────────────────────┘
//! ```
//!
//! Every output is painted from the same SVG document, so the interactive
//! surface and the exports cannot drift apart.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod backend;
pub mod error;
#[cfg(feature = "export")]
pub mod export;
pub mod image;
pub mod svg;

pub use assets::{
    AssetCache, AssetCacheConfig, AssetStatus, CacheStats, ImageLoader, LocalLoader, PreloadReport,
};
pub use backend::{Frame, RenderBackend};
pub use error::{RenderError, RenderResult};
#[cfg(feature = "export")]
pub use export::{ExportConfig, ExportFormat, SceneExporter, PT_PER_PX};
pub use image::{ImageFormat, LoadedImage};

use card_core::{compose_record, CompositionOptions, Record, Scene, ShapeCatalog, Template};
use serde::{Deserialize, Serialize};

/// Configuration for the renderer.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Preferred backend (will fall back if unavailable).
    pub preferred_backend: BackendType,
    /// Paint the edit-mode decoration for the selection.
    pub editable: bool,
    /// Selected element index.
    pub selected: Option<usize>,
    /// Output pixels per canvas pixel.
    pub scale: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            preferred_backend: BackendType::Raster,
            editable: false,
            selected: None,
            scale: 1.0,
        }
    }
}

/// Available rendering backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// resvg rasterizer (requires the `export` feature).
    Raster,
    /// SVG markup (always available).
    Svg,
}

/// The main renderer interface.
pub struct Renderer {
    config: RendererConfig,
    backend: Box<dyn RenderBackend>,
    canvas: (u32, u32),
    size: (u32, u32),
    frame_count: u64,
}

impl Renderer {
    /// Create a renderer for a `width`×`height` canvas.
    ///
    /// # Errors
    ///
    /// Returns an error if no suitable backend is available.
    pub fn new(config: RendererConfig, width: u32, height: u32) -> RenderResult<Self> {
        let size = scaled_size(width, height, config.scale);
        let backend = Self::create_backend(&config, size)?;

        Ok(Self {
            config,
            backend,
            canvas: (width, height),
            size,
            frame_count: 0,
        })
    }

    /// Create the appropriate backend based on config and availability.
    fn create_backend(
        config: &RendererConfig,
        (width, height): (u32, u32),
    ) -> RenderResult<Box<dyn RenderBackend>> {
        match config.preferred_backend {
            BackendType::Raster => {
                #[cfg(feature = "export")]
                {
                    match backend::raster::RasterBackend::new(width, height) {
                        Ok(b) => return Ok(Box::new(b)),
                        Err(e) => {
                            tracing::warn!("Raster surface unavailable, falling back: {}", e);
                        }
                    }
                }
                #[cfg(not(feature = "export"))]
                {
                    tracing::warn!("Built without the export feature, falling back to SVG");
                }
                Self::create_backend(
                    &RendererConfig {
                        preferred_backend: BackendType::Svg,
                        ..config.clone()
                    },
                    (width, height),
                )
            }
            BackendType::Svg => {
                backend::check_size(width, height)?;
                Ok(Box::new(backend::svg::SvgBackend::new(width, height)))
            }
        }
    }

    /// Composition options derived from the configuration.
    #[must_use]
    pub fn composition_options(&self) -> CompositionOptions {
        CompositionOptions {
            editable: self.config.editable,
            selected: self.config.selected,
            ..CompositionOptions::default()
        }
        .with_size(f64::from(self.canvas.0), f64::from(self.canvas.1))
    }

    /// Compose `template` for `record` with this renderer's options.
    #[must_use]
    pub fn compose(
        &self,
        template: &Template,
        record: &Record,
        catalog: Option<&ShapeCatalog>,
    ) -> Scene {
        compose_record(template, record, catalog, &self.composition_options())
    }

    /// Render a frame.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn render(&mut self, scene: &Scene, assets: &AssetCache) -> RenderResult<Frame> {
        let frame = self.backend.render(scene, assets)?;
        self.frame_count += 1;
        Ok(frame)
    }

    /// Get the current frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the active backend type.
    #[must_use]
    pub fn active_backend(&self) -> BackendType {
        self.backend.backend_type()
    }

    /// Get the renderer configuration.
    #[must_use]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Output size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Resize the rendering surface to a new canvas size.
    ///
    /// # Errors
    ///
    /// Returns an error if resize fails.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let size = scaled_size(width, height, self.config.scale);
        self.backend.resize(size.0, size.1)?;
        self.canvas = (width, height);
        self.size = size;
        Ok(())
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let scale = if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    };
    (
        (width as f32 * scale).round() as u32,
        (height as f32 * scale).round() as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_core::Element;

    #[test]
    fn test_svg_backend_selected_explicitly() {
        let config = RendererConfig {
            preferred_backend: BackendType::Svg,
            ..RendererConfig::default()
        };
        let renderer = Renderer::new(config, 800, 600).expect("renderer");
        assert_eq!(renderer.active_backend(), BackendType::Svg);
    }

    #[cfg(feature = "export")]
    #[test]
    fn test_raster_backend_by_default() {
        let renderer = Renderer::new(RendererConfig::default(), 800, 600).expect("renderer");
        assert_eq!(renderer.active_backend(), BackendType::Raster);
    }

    #[test]
    fn test_scale_applies_to_surface() {
        let config = RendererConfig {
            preferred_backend: BackendType::Svg,
            scale: 2.0,
            ..RendererConfig::default()
        };
        let mut renderer = Renderer::new(config, 400, 300).expect("renderer");
        assert_eq!(renderer.size(), (800, 600));
        renderer.resize(100, 50).expect("resize");
        assert_eq!(renderer.size(), (200, 100));
        assert!(renderer.resize(0, 0).is_err());
    }

    #[test]
    fn test_editable_config_adds_decoration() {
        let template = Template::new("t").with_element(Element::rect());
        let config = RendererConfig {
            preferred_backend: BackendType::Svg,
            editable: true,
            selected: Some(0),
            ..RendererConfig::default()
        };
        let mut renderer = Renderer::new(config, 800, 600).expect("renderer");
        let scene = renderer.compose(&template, &Record::new(), None);
        assert!(scene.decoration.is_some());

        let frame = renderer.render(&scene, &AssetCache::new()).expect("render");
        assert_eq!(renderer.frame_count(), 1);
        let Frame::Svg(svg) = frame else {
            panic!("expected svg");
        };
        assert!(svg.contains("stroke-dasharray"));
    }
}
