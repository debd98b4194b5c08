//! Transform operations: Rotation, Crop

use crate::core::error::{InvalidOptionsError, KitResult};
use crate::core::operation::{Category, Operation, OperationMetadata};
use crate::core::options::{Constraint, OptionDefinition, Options};
use crate::core::types::{ImageInfo, OptionType, RasterImage, Value};

/// Rotates a raster clockwise by a multiple of 90 degrees.
///
/// Only fixed increments are supported, so dimensions stay integral and no
/// background fill is ever needed.
#[derive(Debug, Clone)]
pub struct RotationOperation;

impl RotationOperation {
    /// Registry key.
    pub const IDENTIFIER: &'static str = "rotation";

    /// Accepted angles in degrees.
    pub const ANGLES: [i64; 4] = [0, 90, 180, 270];

    fn angle(options: &Options) -> Result<i64, InvalidOptionsError> {
        let angle = options.get_integer(Self::IDENTIFIER, "angle")?;
        if Self::ANGLES.contains(&angle) {
            Ok(angle)
        } else {
            Err(InvalidOptionsError::new(
                Self::IDENTIFIER,
                "angle",
                format!("{} is not a multiple of 90 in [0, 270]", angle),
            ))
        }
    }
}

impl Operation for RotationOperation {
    fn metadata(&self) -> OperationMetadata {
        OperationMetadata::builder(Self::IDENTIFIER, "Rotation")
            .description("Rotate the image clockwise by 0, 90, 180 or 270 degrees")
            .category(Category::Transform)
            .option(
                OptionDefinition::new("angle", OptionType::Integer, Value::Integer(0))
                    .with_description("Clockwise rotation in degrees")
                    .with_constraint(Constraint::OneOf(
                        Self::ANGLES.iter().map(|a| Value::Integer(*a)).collect(),
                    )),
            )
            .build()
    }

    fn validate(&self, options: &Options, _input: &ImageInfo) -> Result<(), InvalidOptionsError> {
        Self::angle(options).map(|_| ())
    }

    fn apply(&self, input: &RasterImage, options: &Options) -> KitResult<RasterImage> {
        let rotated = match Self::angle(options)? {
            90 => input.image().rotate90(),
            180 => input.image().rotate180(),
            270 => input.image().rotate270(),
            _ => return Ok(input.clone()),
        };
        Ok(RasterImage::new(rotated))
    }

    fn output_info(&self, options: &Options, input: &ImageInfo) -> ImageInfo {
        match Self::angle(options) {
            Ok(90) | Ok(270) => input.with_dimensions(input.height, input.width),
            _ => *input,
        }
    }

    fn is_noop(&self, options: &Options) -> bool {
        matches!(Self::angle(options), Ok(0))
    }
}

/// Crops a rectangle out of a raster.
///
/// The rectangle must lie inside the raster the operation receives.
#[derive(Debug, Clone)]
pub struct CropOperation;

/// A validated crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl CropOperation {
    /// Registry key.
    pub const IDENTIFIER: &'static str = "crop";

    fn rect(options: &Options, input: &ImageInfo) -> Result<CropRect, InvalidOptionsError> {
        let coordinate = |name: &str, min: i64| -> Result<u32, InvalidOptionsError> {
            let value = options.get_integer(Self::IDENTIFIER, name)?;
            if value < min || value > u32::MAX as i64 {
                return Err(InvalidOptionsError::new(
                    Self::IDENTIFIER,
                    name,
                    format!("{} is outside [{}, {}]", value, min, u32::MAX),
                ));
            }
            Ok(value as u32)
        };

        let rect = CropRect {
            x: coordinate("x", 0)?,
            y: coordinate("y", 0)?,
            width: coordinate("width", 1)?,
            height: coordinate("height", 1)?,
        };

        if rect.x as u64 + rect.width as u64 > input.width as u64 {
            return Err(InvalidOptionsError::new(
                Self::IDENTIFIER,
                "width",
                format!(
                    "x + width = {} exceeds input width {}",
                    rect.x as u64 + rect.width as u64,
                    input.width
                ),
            ));
        }
        if rect.y as u64 + rect.height as u64 > input.height as u64 {
            return Err(InvalidOptionsError::new(
                Self::IDENTIFIER,
                "height",
                format!(
                    "y + height = {} exceeds input height {}",
                    rect.y as u64 + rect.height as u64,
                    input.height
                ),
            ));
        }

        Ok(rect)
    }
}

impl Operation for CropOperation {
    fn metadata(&self) -> OperationMetadata {
        OperationMetadata::builder(Self::IDENTIFIER, "Crop")
            .description("Crop a rectangular region from the image")
            .category(Category::Transform)
            .option(
                OptionDefinition::new("x", OptionType::Integer, Value::Integer(0))
                    .with_description("Left edge X coordinate")
                    .with_constraint(Constraint::NonNegative),
            )
            .option(
                OptionDefinition::new("y", OptionType::Integer, Value::Integer(0))
                    .with_description("Top edge Y coordinate")
                    .with_constraint(Constraint::NonNegative),
            )
            .option(
                OptionDefinition::required("width", OptionType::Integer)
                    .with_description("Crop width")
                    .with_constraint(Constraint::Positive),
            )
            .option(
                OptionDefinition::required("height", OptionType::Integer)
                    .with_description("Crop height")
                    .with_constraint(Constraint::Positive),
            )
            .build()
    }

    fn validate(&self, options: &Options, input: &ImageInfo) -> Result<(), InvalidOptionsError> {
        Self::rect(options, input).map(|_| ())
    }

    fn apply(&self, input: &RasterImage, options: &Options) -> KitResult<RasterImage> {
        let rect = Self::rect(options, &input.info())?;
        if (rect.x, rect.y) == (0, 0) && (rect.width, rect.height) == input.dimensions() {
            return Ok(input.clone());
        }
        let cropped = input.image().crop_imm(rect.x, rect.y, rect.width, rect.height);
        Ok(RasterImage::new(cropped))
    }

    fn output_info(&self, options: &Options, input: &ImageInfo) -> ImageInfo {
        match Self::rect(options, input) {
            Ok(rect) => input.with_dimensions(rect.width, rect.height),
            Err(_) => *input,
        }
    }
}
