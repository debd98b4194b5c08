//! Render parameters: output representation, encoding and target size.

use crate::core::error::{KitError, KitResult};
use crate::core::types::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the rendered raster is handed back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RenderType {
    /// The raster itself.
    #[default]
    Image,
    /// A `data:<mime>;base64,...` string.
    DataUrl,
}

impl RenderType {
    /// Every supported render type.
    pub const ALL: [RenderType; 2] = [RenderType::Image, RenderType::DataUrl];

    /// External string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderType::Image => "image",
            RenderType::DataUrl => "data-url",
        }
    }

    /// Parse the external string form. Underscores and case are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('_', "-").as_str() {
            "image" => Some(RenderType::Image),
            "data-url" | "dataurl" => Some(RenderType::DataUrl),
            _ => None,
        }
    }
}

impl fmt::Display for RenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default cap on the pixel count a resize may produce (100 megapixels).
pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 100_000_000;

/// Requested output size. A missing side is derived from the aspect ratio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    /// Target width in pixels
    pub width: Option<u32>,
    /// Target height in pixels
    pub height: Option<u32>,
}

impl Dimensions {
    /// Exact width and height.
    pub fn exact(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }

    /// Fixed width, height from the aspect ratio.
    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            height: None,
        }
    }

    /// Fixed height, width from the aspect ratio.
    pub fn height(height: u32) -> Self {
        Self {
            width: None,
            height: Some(height),
        }
    }

    /// Parse `WxH`, `Wx` or `xH`.
    pub fn parse(raw: &str) -> KitResult<Self> {
        let invalid = || KitError::InvalidRenderParameter(format!("invalid dimensions '{}'", raw));
        let normalized = raw.trim().to_lowercase();
        let (w, h) = normalized.split_once('x').ok_or_else(invalid)?;
        let (w, h) = (w.trim(), h.trim());

        let side = |s: &str| -> KitResult<Option<u32>> {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<u32>().map(Some).map_err(|_| invalid())
            }
        };

        let dimensions = Self {
            width: side(w)?,
            height: side(h)?,
        };
        dimensions.validate()?;
        Ok(dimensions)
    }

    /// At least one side, and no zero sides.
    pub fn validate(&self) -> KitResult<()> {
        match (self.width, self.height) {
            (None, None) => Err(KitError::InvalidRenderParameter(
                "dimensions need a width or a height".to_string(),
            )),
            (Some(0), _) | (_, Some(0)) => Err(KitError::InvalidRenderParameter(
                "dimensions must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Fail when the explicitly requested sides alone exceed `max_pixels`.
    ///
    /// A missing side counts as one pixel; [`Dimensions::resolve_within`]
    /// checks the final size once the source is known.
    pub fn validate_within(&self, max_pixels: u64) -> KitResult<()> {
        self.validate()?;
        check_pixel_count(
            (self.width.unwrap_or(1), self.height.unwrap_or(1)),
            max_pixels,
        )
    }

    /// Like [`Dimensions::resolve`], but fails when the result exceeds `max_pixels`.
    pub fn resolve_within(&self, source: (u32, u32), max_pixels: u64) -> KitResult<(u32, u32)> {
        let resolved = self.resolve(source);
        check_pixel_count(resolved, max_pixels)?;
        Ok(resolved)
    }

    /// Target size for a raster of `source` dimensions.
    pub fn resolve(&self, source: (u32, u32)) -> (u32, u32) {
        let (sw, sh) = (source.0.max(1) as f64, source.1.max(1) as f64);
        let scaled = |v: f64| (v.round() as u32).max(1);
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, scaled(sh * w as f64 / sw)),
            (None, Some(h)) => (scaled(sw * h as f64 / sh), h),
            (None, None) => source,
        }
    }
}

fn check_pixel_count((width, height): (u32, u32), max_pixels: u64) -> KitResult<()> {
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(KitError::InvalidRenderParameter(format!(
            "output size {}x{} is {} pixels, above the limit of {}",
            width, height, pixels, max_pixels
        )));
    }
    Ok(())
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(w) = self.width {
            write!(f, "{}", w)?;
        }
        write!(f, "x")?;
        if let Some(h) = self.height {
            write!(f, "{}", h)?;
        }
        Ok(())
    }
}

/// Parameters of a single render.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RenderRequest {
    /// Output representation
    pub render_type: RenderType,
    /// Encoding for data URLs and saved files
    pub image_format: ImageFormat,
    /// Resize target; `None` keeps the stack's output size
    pub dimensions: Option<Dimensions>,
}

impl RenderRequest {
    /// Create a request with defaults: image, PNG, no resize.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the render type.
    pub fn with_render_type(mut self, render_type: RenderType) -> Self {
        self.render_type = render_type;
        self
    }

    /// Set the image format.
    pub fn with_format(mut self, image_format: ImageFormat) -> Self {
        self.image_format = image_format;
        self
    }

    /// Set the target dimensions.
    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Build a request from external string forms over the defaults.
    pub fn parse(
        render_type: Option<&str>,
        image_format: Option<&str>,
        dimensions: Option<&str>,
    ) -> KitResult<Self> {
        Self::default().parse_over(render_type, image_format, dimensions)
    }

    /// Override fields of `self` from external string forms; `None` keeps the field.
    pub fn parse_over(
        mut self,
        render_type: Option<&str>,
        image_format: Option<&str>,
        dimensions: Option<&str>,
    ) -> KitResult<Self> {
        if let Some(raw) = render_type {
            self.render_type = RenderType::parse(raw).ok_or_else(|| {
                KitError::InvalidRenderParameter(format!(
                    "unknown render type '{}' (expected image or data-url)",
                    raw
                ))
            })?;
        }
        if let Some(raw) = image_format {
            self.image_format = ImageFormat::parse(raw).ok_or_else(|| {
                KitError::InvalidRenderParameter(format!(
                    "unsupported image format '{}' (expected image/png or image/jpeg)",
                    raw
                ))
            })?;
        }
        if let Some(raw) = dimensions {
            self.dimensions = Some(Dimensions::parse(raw)?);
        }
        Ok(self)
    }

    /// Check the request before any raster work.
    pub fn validate(&self) -> KitResult<()> {
        if let Some(dimensions) = &self.dimensions {
            dimensions.validate()?;
        }
        Ok(())
    }

    /// [`RenderRequest::validate`] plus the output pixel cap.
    pub fn validate_within(&self, max_pixels: u64) -> KitResult<()> {
        if let Some(dimensions) = &self.dimensions {
            dimensions.validate_within(max_pixels)?;
        }
        Ok(())
    }
}
