//! Configuration for an imgkit session.
//!
//! Loaded from TOML; every section and field has a default, so an empty file
//! is a valid configuration.

use crate::core::error::ConfigError;
use crate::core::types::ImageFormat;
use crate::render::encoder::{RasterEncoder, DEFAULT_JPEG_QUALITY};
use crate::render::engine::RenderOptions;
use crate::render::request::{RenderRequest, RenderType, DEFAULT_MAX_OUTPUT_PIXELS};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KitConfig {
    /// Registry settings
    pub registry: RegistryConfig,

    /// Render defaults
    pub render: RenderConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl KitConfig {
    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: KitConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.render.jpeg_quality) {
            return Err(ConfigError::ValidationError(
                "render.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.render.max_output_pixels == 0 {
            return Err(ConfigError::ValidationError(
                "render.max_output_pixels must be > 0".into(),
            ));
        }
        if self.render.stage_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "render.stage_timeout_ms must be > 0".into(),
            ));
        }
        if self.logging.level_filter().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "logging.level '{}' is not one of off, error, warn, info, debug, trace",
                self.logging.level
            )));
        }
        Ok(())
    }
}

/// Registry settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Reject re-registration of an existing identifier
    pub strict: bool,
}

/// Resampling filter used when a render requests new dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    /// Nearest neighbor
    Nearest,
    /// Linear
    Triangle,
    /// Cubic
    CatmullRom,
    /// Gaussian
    Gaussian,
    /// Lanczos with window 3
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to image crate's FilterType.
    pub fn to_filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Render defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Representation used when a render does not name one
    pub render_type: RenderType,

    /// Encoding used when a render does not name one
    pub image_format: ImageFormat,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Resampling filter for resizes
    pub resize_filter: ResizeFilter,

    /// Largest pixel count a resize may produce
    pub max_output_pixels: u64,

    /// Limit for each of the apply and encode phases
    pub stage_timeout_ms: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_type: RenderType::Image,
            image_format: ImageFormat::Png,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            resize_filter: ResizeFilter::Lanczos3,
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
            stage_timeout_ms: None,
        }
    }
}

impl RenderConfig {
    /// Request carrying the configured defaults.
    pub fn default_request(&self) -> RenderRequest {
        RenderRequest::new()
            .with_render_type(self.render_type)
            .with_format(self.image_format)
    }

    /// Engine options from these settings.
    pub fn render_options(&self) -> RenderOptions {
        let mut options = RenderOptions::new()
            .with_resize_filter(self.resize_filter.to_filter_type())
            .with_max_output_pixels(self.max_output_pixels);
        if let Some(ms) = self.stage_timeout_ms {
            options = options.with_timeout(Duration::from_millis(ms));
        }
        options
    }

    /// Encoder from these settings.
    pub fn encoder(&self) -> RasterEncoder {
        RasterEncoder::new().with_jpeg_quality(self.jpeg_quality)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (off, error, warn, info, debug, trace)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parsed level, if valid.
    pub fn level_filter(&self) -> Option<log::LevelFilter> {
        self.level.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = KitConfig::default();
        assert!(!config.registry.strict);
        assert_eq!(config.render.jpeg_quality, 90);
        assert_eq!(config.render.render_type, RenderType::Image);
        assert_eq!(config.render.image_format, ImageFormat::Png);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = KitConfig::from_toml("").unwrap();
        assert_eq!(config.render.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(config.render.stage_timeout_ms, None);
        assert_eq!(config.render.max_output_pixels, DEFAULT_MAX_OUTPUT_PIXELS);
    }

    #[test]
    fn test_partial_toml() {
        let config = KitConfig::from_toml(
            r#"
            [registry]
            strict = true

            [render]
            render_type = "data-url"
            image_format = "image/jpeg"
            jpeg_quality = 70
            resize_filter = "nearest"
            max_output_pixels = 4000000
            stage_timeout_ms = 5000
            "#,
        )
        .unwrap();

        assert!(config.registry.strict);
        let request = config.render.default_request();
        assert_eq!(request.render_type, RenderType::DataUrl);
        assert_eq!(request.image_format, ImageFormat::Jpeg);
        assert_eq!(config.render.encoder().jpeg_quality(), 70);
        assert_eq!(
            config.render.render_options().stage_timeout,
            Some(Duration::from_millis(5000))
        );
        assert_eq!(config.render.render_options().max_output_pixels, 4_000_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values() {
        let err = KitConfig::from_toml("[render]\njpeg_quality = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = KitConfig::from_toml("[render]\nmax_output_pixels = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = KitConfig::from_toml("[render]\nstage_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = KitConfig::from_toml("[logging]\nlevel = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = KitConfig::from_toml("[render]\nimage_format = \"image/gif\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

        let config = KitConfig::load_from(file.path()).unwrap();
        assert_eq!(config.logging.level_filter(), Some(log::LevelFilter::Debug));

        let missing = KitConfig::load_from(Path::new("/nonexistent/imgkit.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = KitConfig::default();
        let toml = config.to_toml().unwrap();
        let parsed = KitConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed.render.jpeg_quality, config.render.jpeg_quality);
    }
}
