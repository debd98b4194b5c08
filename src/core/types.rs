//! Core value types that flow through the operation pipeline.
//!
//! Option values use a small closed enum so schemas can type-check them and
//! serde can read them straight out of JSON presets and TOML. Rasters are
//! shared behind an `Arc` and never mutated once produced.

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A single option value of a configured operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
}

/// Declared type of an option in an operation's schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Integer,
    Float,
    String,
    Boolean,
}

// ============================================================================
// Value Implementation
// ============================================================================

impl Value {
    /// Get the option type of this value.
    pub fn get_type(&self) -> OptionType {
        match self {
            Value::Integer(_) => OptionType::Integer,
            Value::Float(_) => OptionType::Float,
            Value::String(_) => OptionType::String,
            Value::Boolean(_) => OptionType::Boolean,
        }
    }

    /// Try to get this value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Try to get this value as a float.
    /// Integers are automatically converted to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_string(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Parse a command-line style literal: `true`/`false`, integers, floats,
    /// anything else is kept as a string.
    pub fn parse_literal(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(b) = raw.parse::<bool>() {
            Value::Boolean(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            Value::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::Float(f)
        } else {
            Value::String(raw.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{:.4}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

// ============================================================================
// OptionType Implementation
// ============================================================================

impl OptionType {
    /// Check if a value matches this option type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (OptionType::Integer, Value::Integer(_)) => true,
            (OptionType::Float, Value::Float(_)) => true,
            // Integer can be used where float is expected (implicit conversion)
            (OptionType::Float, Value::Integer(_)) => true,
            (OptionType::String, Value::String(_)) => true,
            (OptionType::Boolean, Value::Boolean(_)) => true,
            _ => false,
        }
    }

    /// Get a human-readable name for this type.
    pub fn display_name(&self) -> &'static str {
        match self {
            OptionType::Integer => "Integer",
            OptionType::Float => "Float",
            OptionType::String => "String",
            OptionType::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Raster Images
// ============================================================================

/// Pixel layout of a raster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    L8,
    La8,
    Rgb8,
    Rgba8,
    L16,
    La16,
    Rgb16,
    Rgba16,
    Rgb32F,
    Rgba32F,
    Unknown,
}

impl ColorFormat {
    /// Whether the layout carries an alpha channel.
    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            ColorFormat::La8
                | ColorFormat::Rgba8
                | ColorFormat::La16
                | ColorFormat::Rgba16
                | ColorFormat::Rgba32F
        )
    }
}

impl From<image::ColorType> for ColorFormat {
    fn from(color: image::ColorType) -> Self {
        match color {
            image::ColorType::L8 => ColorFormat::L8,
            image::ColorType::La8 => ColorFormat::La8,
            image::ColorType::Rgb8 => ColorFormat::Rgb8,
            image::ColorType::Rgba8 => ColorFormat::Rgba8,
            image::ColorType::L16 => ColorFormat::L16,
            image::ColorType::La16 => ColorFormat::La16,
            image::ColorType::Rgb16 => ColorFormat::Rgb16,
            image::ColorType::Rgba16 => ColorFormat::Rgba16,
            image::ColorType::Rgb32F => ColorFormat::Rgb32F,
            image::ColorType::Rgba32F => ColorFormat::Rgba32F,
            _ => ColorFormat::Unknown,
        }
    }
}

/// Raster metadata without the pixel data.
///
/// Validation runs against this so a stack can be checked without touching pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel layout
    pub color: ColorFormat,
}

impl ImageInfo {
    /// Same layout, different dimensions.
    pub fn with_dimensions(self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }
}

/// An immutable in-memory pixel buffer with explicit dimensions and color format.
///
/// Cloning is cheap: the pixels are shared. Operations produce a new
/// `RasterImage` instead of writing into the one they were given.
#[derive(Debug, Clone)]
pub struct RasterImage {
    info: ImageInfo,
    data: Arc<DynamicImage>,
}

impl RasterImage {
    /// Wrap a decoded image.
    pub fn new(image: DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            info: ImageInfo {
                width,
                height,
                color: image.color().into(),
            },
            data: Arc::new(image),
        }
    }

    /// Load an image from a file path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, image::ImageError> {
        Ok(Self::new(image::open(path)?))
    }

    /// Decode an image from an in-memory byte buffer, guessing the format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, image::ImageError> {
        Ok(Self::new(image::load_from_memory(bytes)?))
    }

    /// Raster metadata.
    pub fn info(&self) -> ImageInfo {
        self.info
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Width and height.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    /// Shared reference to the underlying image.
    pub fn image(&self) -> &DynamicImage {
        &self.data
    }

    /// Raw pixel bytes in the image's native layout.
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Take ownership of the underlying image.
    ///
    /// If the image is shared, this will clone it.
    pub fn into_image(self) -> DynamicImage {
        Arc::try_unwrap(self.data).unwrap_or_else(|arc| (*arc).clone())
    }

    /// Whether two rasters share the same pixel allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl PartialEq for RasterImage {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info && (self.ptr_eq(other) || self.as_bytes() == other.as_bytes())
    }
}

impl From<DynamicImage> for RasterImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

// ============================================================================
// ImageFormat
// ============================================================================

/// Output encodings supported by the render step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    #[default]
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ImageFormat {
    /// Every supported format.
    pub const ALL: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

    /// MIME-style identifier used on the external surface.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Parse a MIME type or short name (`png`, `jpeg`, `jpg`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "image/png" | "png" => Some(ImageFormat::Png),
            "image/jpeg" | "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    /// Determine the format from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::parse)
    }

    /// Get the typical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// Convert to image crate's ImageFormat.
    pub fn to_image_format(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type())
    }
}
