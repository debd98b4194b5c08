//! Color operations: preset filters blended by intensity

use crate::core::error::{InvalidOptionsError, KitResult};
use crate::core::operation::{Category, Operation, OperationMetadata};
use crate::core::options::{Constraint, OptionDefinition, Options};
use crate::core::types::{ColorFormat, ImageInfo, OptionType, RasterImage, Value};
use image::DynamicImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 4x5 color matrix in row-major order.
///
/// Rows produce R, G, B, A; columns weigh R, G, B, A and add an offset in
/// 0..=255 units.
pub type ColorMatrix = [[f32; 5]; 4];

/// Named color presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    Identity,
    Grayscale,
    Sepia,
    Invert,
    Warm,
    Cool,
    Vintage,
}

impl FilterPreset {
    /// Every preset in listing order.
    pub const ALL: [FilterPreset; 7] = [
        FilterPreset::Identity,
        FilterPreset::Grayscale,
        FilterPreset::Sepia,
        FilterPreset::Invert,
        FilterPreset::Warm,
        FilterPreset::Cool,
        FilterPreset::Vintage,
    ];

    /// Option value naming this preset.
    pub fn name(&self) -> &'static str {
        match self {
            FilterPreset::Identity => "identity",
            FilterPreset::Grayscale => "grayscale",
            FilterPreset::Sepia => "sepia",
            FilterPreset::Invert => "invert",
            FilterPreset::Warm => "warm",
            FilterPreset::Cool => "cool",
            FilterPreset::Vintage => "vintage",
        }
    }

    /// Look a preset up by its exact lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// The preset's color matrix.
    pub fn matrix(&self) -> ColorMatrix {
        const ALPHA: [f32; 5] = [0.0, 0.0, 0.0, 1.0, 0.0];
        match self {
            FilterPreset::Identity => [
                [1.0, 0.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0, 0.0],
                ALPHA,
            ],
            // Rec. 601 luma
            FilterPreset::Grayscale => [
                [0.299, 0.587, 0.114, 0.0, 0.0],
                [0.299, 0.587, 0.114, 0.0, 0.0],
                [0.299, 0.587, 0.114, 0.0, 0.0],
                ALPHA,
            ],
            FilterPreset::Sepia => [
                [0.393, 0.769, 0.189, 0.0, 0.0],
                [0.349, 0.686, 0.168, 0.0, 0.0],
                [0.272, 0.534, 0.131, 0.0, 0.0],
                ALPHA,
            ],
            FilterPreset::Invert => [
                [-1.0, 0.0, 0.0, 0.0, 255.0],
                [0.0, -1.0, 0.0, 0.0, 255.0],
                [0.0, 0.0, -1.0, 0.0, 255.0],
                ALPHA,
            ],
            FilterPreset::Warm => [
                [1.1, 0.0, 0.0, 0.0, 10.0],
                [0.0, 1.0, 0.0, 0.0, 5.0],
                [0.0, 0.0, 0.9, 0.0, -10.0],
                ALPHA,
            ],
            FilterPreset::Cool => [
                [0.9, 0.0, 0.0, 0.0, -10.0],
                [0.0, 1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 1.1, 0.0, 10.0],
                ALPHA,
            ],
            FilterPreset::Vintage => [
                [0.6, 0.3, 0.1, 0.0, 20.0],
                [0.2, 0.7, 0.1, 0.0, 10.0],
                [0.2, 0.3, 0.5, 0.0, 0.0],
                ALPHA,
            ],
        }
    }
}

impl fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Applies a named color preset, blended with the input by `intensity`.
#[derive(Debug, Clone)]
pub struct FiltersOperation;

impl FiltersOperation {
    /// Registry key.
    pub const IDENTIFIER: &'static str = "filters";

    fn preset(options: &Options) -> Result<FilterPreset, InvalidOptionsError> {
        let name = options.get_string(Self::IDENTIFIER, "filter")?;
        FilterPreset::from_name(name).ok_or_else(|| {
            InvalidOptionsError::new(
                Self::IDENTIFIER,
                "filter",
                format!("unknown filter preset '{}'", name),
            )
        })
    }

    fn intensity(options: &Options) -> Result<f32, InvalidOptionsError> {
        let intensity = options.get_float(Self::IDENTIFIER, "intensity")?;
        if !(0.0..=1.0).contains(&intensity) {
            return Err(InvalidOptionsError::new(
                Self::IDENTIFIER,
                "intensity",
                format!("{} is outside [0, 1]", intensity),
            ));
        }
        Ok(intensity as f32)
    }
}

impl Operation for FiltersOperation {
    fn metadata(&self) -> OperationMetadata {
        OperationMetadata::builder(Self::IDENTIFIER, "Filters")
            .description("Apply a named color filter preset")
            .category(Category::Color)
            .option(
                OptionDefinition::new("filter", OptionType::String, Value::from("identity"))
                    .with_description("Preset name")
                    .with_constraint(Constraint::OneOf(
                        FilterPreset::ALL.iter().map(|p| Value::from(p.name())).collect(),
                    )),
            )
            .option(
                OptionDefinition::new("intensity", OptionType::Float, Value::Float(1.0))
                    .with_description("Blend between original (0.0) and filtered (1.0)")
                    .with_range(0.0, 1.0),
            )
            .build()
    }

    fn validate(&self, options: &Options, _input: &ImageInfo) -> Result<(), InvalidOptionsError> {
        Self::preset(options)?;
        Self::intensity(options)?;
        Ok(())
    }

    fn apply(&self, input: &RasterImage, options: &Options) -> KitResult<RasterImage> {
        let preset = Self::preset(options)?;
        let intensity = Self::intensity(options)?;
        if preset == FilterPreset::Identity || intensity == 0.0 {
            return Ok(input.clone());
        }

        let matrix = preset.matrix();
        let mut rgba = input.image().to_rgba8();
        let pixels: &mut [u8] = &mut rgba;

        pixels.par_chunks_exact_mut(4).for_each(|px| {
            let src = [px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32];
            for (channel, row) in matrix.iter().enumerate() {
                let filtered = row[0] * src[0]
                    + row[1] * src[1]
                    + row[2] * src[2]
                    + row[3] * src[3]
                    + row[4];
                let blended = src[channel] + (filtered - src[channel]) * intensity;
                px[channel] = blended.round().clamp(0.0, 255.0) as u8;
            }
        });

        Ok(RasterImage::new(DynamicImage::ImageRgba8(rgba)))
    }

    fn output_info(&self, options: &Options, input: &ImageInfo) -> ImageInfo {
        if self.is_noop(options) {
            *input
        } else {
            ImageInfo {
                color: ColorFormat::Rgba8,
                ..*input
            }
        }
    }

    fn is_noop(&self, options: &Options) -> bool {
        matches!(Self::preset(options), Ok(FilterPreset::Identity))
            || matches!(Self::intensity(options), Ok(i) if i == 0.0)
    }
}
