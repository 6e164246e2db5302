//! Rendering backend implementations.

#[cfg(feature = "export")]
pub mod raster;
pub mod svg;

use card_core::Scene;

use crate::assets::AssetCache;
use crate::{BackendType, RenderResult};

/// One painted frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// SVG document.
    Svg(String),
    /// PNG-encoded pixels.
    Png {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Encoded image.
        data: Vec<u8>,
    },
}

impl Frame {
    /// File extension matching the frame's encoding.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Svg(_) => "svg",
            Self::Png { .. } => "png",
        }
    }

    /// Encoded bytes of the frame.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Svg(svg) => svg.into_bytes(),
            Self::Png { data, .. } => data,
        }
    }
}

/// Trait for rendering backends.
pub trait RenderBackend: Send {
    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Render a scene, reading images from `assets`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, scene: &Scene, assets: &AssetCache) -> RenderResult<Frame>;

    /// Resize the rendering surface.
    ///
    /// # Errors
    ///
    /// Returns an error if resizing fails.
    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()>;
}

/// Validate a surface size.
pub(crate) fn check_size(width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 {
        return Err(crate::RenderError::NoBackend(format!(
            "Surface size {width}x{height} is empty"
        )));
    }
    Ok(())
}
