//! Output encoding: raster to PNG/JPEG bytes and data URLs.

use crate::core::error::{KitError, KitResult};
use crate::core::types::{ColorFormat, ImageFormat, RasterImage};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::DynamicImage;
use std::io::Cursor;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Turns a finished raster into encoded bytes.
pub trait Encoder: Send + Sync {
    /// Encode `image` in `format`.
    fn encode(&self, image: &RasterImage, format: ImageFormat) -> KitResult<Vec<u8>>;

    /// Encode `image` and wrap it in a `data:<mime>;base64,...` string.
    fn encode_data_url(&self, image: &RasterImage, format: ImageFormat) -> KitResult<String> {
        let bytes = self.encode(image, format)?;
        Ok(data_url(&bytes, format))
    }
}

/// Build a data URL from already encoded bytes.
pub fn data_url(bytes: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), BASE64.encode(bytes))
}

/// Split a data URL into its format and decoded bytes.
pub fn parse_data_url(url: &str) -> KitResult<(ImageFormat, Vec<u8>)> {
    let invalid = |reason: &str| KitError::Encoding(format!("malformed data URL: {}", reason));
    let rest = url.strip_prefix("data:").ok_or_else(|| invalid("missing 'data:' prefix"))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| invalid("missing ';base64,' marker"))?;
    let format = ImageFormat::parse(mime).ok_or_else(|| invalid("unsupported MIME type"))?;
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| KitError::Encoding(format!("malformed data URL: {}", e)))?;
    Ok((format, bytes))
}

/// Encoder backed by the `image` crate codecs.
#[derive(Debug, Clone, Copy)]
pub struct RasterEncoder {
    jpeg_quality: u8,
}

impl RasterEncoder {
    /// Create an encoder with the default JPEG quality.
    pub fn new() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Set the JPEG quality, clamped to 1..=100.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Configured JPEG quality.
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

impl Default for RasterEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for RasterEncoder {
    fn encode(&self, image: &RasterImage, format: ImageFormat) -> KitResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        let result = match format {
            ImageFormat::Png => {
                let encoder = PngEncoder::new(&mut buffer);
                match image.info().color {
                    // PNG has no float layouts
                    ColorFormat::Rgb32F | ColorFormat::Rgba32F | ColorFormat::Unknown => {
                        DynamicImage::ImageRgba8(image.image().to_rgba8()).write_with_encoder(encoder)
                    }
                    _ => image.image().write_with_encoder(encoder),
                }
            }
            ImageFormat::Jpeg => {
                // JPEG carries no alpha
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
                DynamicImage::ImageRgb8(image.image().to_rgb8()).write_with_encoder(encoder)
            }
        };
        result.map_err(|e| KitError::Encoding(format!("{} encoding failed: {}", format, e)))?;
        Ok(buffer.into_inner())
    }
}
