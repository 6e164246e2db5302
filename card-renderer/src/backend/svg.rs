//! Vector surface: paints scenes to SVG documents.

use card_core::Scene;

use super::{check_size, Frame, RenderBackend};
use crate::assets::AssetCache;
use crate::svg::paint_svg_sized;
use crate::{BackendType, RenderResult};

/// Backend that emits SVG markup.
#[derive(Debug, Clone)]
pub struct SvgBackend {
    width: u32,
    height: u32,
}

impl SvgBackend {
    /// Create a surface of the given output size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Current output size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl RenderBackend for SvgBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Svg
    }

    fn render(&mut self, scene: &Scene, assets: &AssetCache) -> RenderResult<Frame> {
        tracing::debug!(
            items = scene.items.len(),
            width = self.width,
            height = self.height,
            "Painting SVG frame"
        );
        Ok(Frame::Svg(paint_svg_sized(
            scene,
            assets,
            self.width,
            self.height,
        )))
    }

    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        check_size(width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }
}
