//! Core types and traits for the imgkit pipeline.
//!
//! This module contains the foundational pieces every other module builds on:
//! - Option values and raster images
//! - Option schemas and constraints
//! - The `Operation` trait and its metadata
//! - Error types

pub mod types;
pub mod options;
pub mod error;
pub mod operation;

// Re-export commonly used types
pub use types::{ColorFormat, ImageFormat, ImageInfo, OptionType, RasterImage, Value};
pub use options::{Constraint, OptionDefinition, OptionSchema, Options};
pub use error::{ConfigError, InvalidOptionsError, KitError, KitResult};
pub use operation::{Category, Operation, OperationDescriptor, OperationMetadata};
