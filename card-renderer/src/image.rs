//! Image decoding and data URI handling.
//!
//! Every image a scene references is decoded once when it enters the asset
//! cache and is embedded into SVG output as a data URI, so painting never
//! touches the network or the filesystem.

use base64::Engine;

use crate::error::{RenderError, RenderResult};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// GIF (first frame only).
    Gif,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            "image/gif" => Self::Gif,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        if data.starts_with(b"GIF8") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }

    /// MIME type used when embedding.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// A decoded image ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Embeddable bytes (PNG or JPEG).
    pub bytes: Vec<u8>,
    /// Format of `bytes`.
    pub format: ImageFormat,
}

impl LoadedImage {
    /// Decode raw image bytes.
    ///
    /// PNG and JPEG are kept as-is; anything else the decoder understands is
    /// re-encoded as PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be decoded.
    pub fn decode(data: &[u8]) -> RenderResult<Self> {
        let format = ImageFormat::from_magic_bytes(data);

        let img = image::load_from_memory(data)
            .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?;
        let (width, height) = (img.width(), img.height());

        match format {
            ImageFormat::Png | ImageFormat::Jpeg => Ok(Self {
                width,
                height,
                bytes: data.to_vec(),
                format,
            }),
            ImageFormat::WebP | ImageFormat::Gif | ImageFormat::Unknown => {
                let mut buf = std::io::Cursor::new(Vec::new());
                img.write_to(&mut buf, image::ImageFormat::Png)
                    .map_err(|e| RenderError::Resource(format!("Failed to re-encode image: {e}")))?;
                Ok(Self {
                    width,
                    height,
                    bytes: buf.into_inner(),
                    format: ImageFormat::Png,
                })
            }
        }
    }

    /// The image as a `data:` URI.
    #[must_use]
    pub fn data_uri(&self) -> String {
        encode_data_uri(self.format.mime(), &self.bytes)
    }
}

/// Encode bytes as a base64 `data:` URI.
#[must_use]
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Decode the payload of a `data:` URI.
///
/// Supports formats like: `data:image/png;base64,iVBORw0KGgo...`
///
/// # Errors
///
/// Returns an error if the data URI is malformed.
pub fn parse_data_uri(uri: &str) -> RenderResult<Vec<u8>> {
    let uri_data = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URI".to_string()))?;

    // Find the comma separating metadata from data
    let (metadata, encoded_data) = uri_data
        .split_once(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URI: missing comma".to_string()))?;

    if metadata.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(encoded_data.trim())
            .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))
    } else {
        percent_decode(encoded_data)
    }
}

/// Percent-decoding for non-base64 data URIs.
fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = input
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::Resource("Invalid URL encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    Ok(result)
}
