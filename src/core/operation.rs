//! Operation trait and operation metadata.
//!
//! An operation is one composable image transform. It uses a two-phase design:
//! validation against the raster it will receive, then a pure apply that returns
//! a new raster.

use crate::core::error::{InvalidOptionsError, KitResult};
use crate::core::options::{OptionSchema, Options};
use crate::core::types::{ImageInfo, RasterImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Category for organizing operations in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Geometric changes (rotation, crop)
    Transform,
    /// Color presets and adjustments
    Color,
    /// Custom/user-defined
    #[default]
    Custom,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Transform => "Transform",
            Category::Color => "Color",
            Category::Custom => "Custom",
        }
    }
}

/// Metadata describing an operation kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// Unique identifier used as the registry key (e.g. "crop")
    pub identifier: String,
    /// Human-readable name (e.g. "Crop")
    pub name: String,
    /// Category for listings
    pub category: Category,
    /// Detailed description
    pub description: String,
    /// Declared options
    pub schema: OptionSchema,
}

impl OperationMetadata {
    /// Create a new metadata builder.
    pub fn builder(identifier: impl Into<String>, name: impl Into<String>) -> OperationMetadataBuilder {
        OperationMetadataBuilder::new(identifier, name)
    }
}

/// Builder for OperationMetadata.
pub struct OperationMetadataBuilder {
    identifier: String,
    name: String,
    category: Category,
    description: String,
    schema: OptionSchema,
}

impl OperationMetadataBuilder {
    /// Create a new builder with required fields.
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            category: Category::Custom,
            description: String::new(),
            schema: OptionSchema::new(),
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an option.
    pub fn option(mut self, definition: crate::core::options::OptionDefinition) -> Self {
        self.schema = self.schema.option(definition);
        self
    }

    /// Build the metadata.
    pub fn build(self) -> OperationMetadata {
        OperationMetadata {
            identifier: self.identifier,
            name: self.name,
            category: self.category,
            description: self.description,
            schema: self.schema,
        }
    }
}

/// The core trait for image operations.
///
/// # Design
///
/// 1. **Validation** (`validate`): checks options against the raster the
///    operation will receive at its position in the stack. An earlier rotation
///    or crop changes that raster, so this never looks at the original source.
///
/// 2. **Application** (`apply`): a pure function from input raster and
///    validated options to a new raster. The input is never modified.
///
/// Options handed to both methods already have schema defaults filled in and
/// have passed the schema's type and constraint checks.
///
/// # Thread Safety
///
/// `Send + Sync` bounds let render snapshots move across threads.
pub trait Operation: Send + Sync {
    /// Get the metadata for this operation.
    ///
    /// This is called once during registration and should return consistent values.
    fn metadata(&self) -> OperationMetadata;

    /// Validate options against the upstream raster.
    fn validate(&self, options: &Options, input: &ImageInfo) -> Result<(), InvalidOptionsError>;

    /// Apply the transform, producing a new raster.
    fn apply(&self, input: &RasterImage, options: &Options) -> KitResult<RasterImage>;

    /// Predict the output raster info without touching pixels.
    ///
    /// Default implementation keeps the input dimensions.
    fn output_info(&self, _options: &Options, input: &ImageInfo) -> ImageInfo {
        *input
    }

    /// Whether these options leave the raster unchanged.
    ///
    /// Default implementation reports `false`.
    fn is_noop(&self, _options: &Options) -> bool {
        false
    }
}

/// A registered operation: its metadata captured once, plus the implementation.
///
/// Immutable once created; the registry hands out `Arc`s so render snapshots
/// keep their descriptors alive after an unregister or reset.
#[derive(Clone)]
pub struct OperationDescriptor {
    metadata: OperationMetadata,
    operation: Arc<dyn Operation>,
}

impl OperationDescriptor {
    /// Wrap an operation, capturing its metadata.
    pub fn new(operation: impl Operation + 'static) -> Self {
        Self::from_arc(Arc::new(operation))
    }

    /// Wrap a shared operation, capturing its metadata.
    pub fn from_arc(operation: Arc<dyn Operation>) -> Self {
        Self {
            metadata: operation.metadata(),
            operation,
        }
    }

    /// The registry key.
    pub fn identifier(&self) -> &str {
        &self.metadata.identifier
    }

    /// Full metadata.
    pub fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    /// Declared options.
    pub fn schema(&self) -> &OptionSchema {
        &self.metadata.schema
    }

    /// The implementation.
    pub fn operation(&self) -> &dyn Operation {
        self.operation.as_ref()
    }

    /// Fill defaults and run the schema checks.
    pub fn prepare_options(&self, options: &mut Options) -> Result<(), InvalidOptionsError> {
        self.schema().apply_defaults(options);
        self.schema().validate(self.identifier(), options)
    }

    /// Schema checks followed by the operation's raster-aware validation.
    pub fn validate(&self, options: &Options, input: &ImageInfo) -> Result<(), InvalidOptionsError> {
        self.schema().validate(self.identifier(), options)?;
        self.operation.validate(options, input)
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("identifier", &self.metadata.identifier)
            .field("options", &self.metadata.schema.names())
            .finish()
    }
}

/// An operation that returns its input unchanged.
///
/// Useful for tests and as a template for new operations.
#[derive(Debug, Clone)]
pub struct PassthroughOperation;

impl Operation for PassthroughOperation {
    fn metadata(&self) -> OperationMetadata {
        OperationMetadata::builder("passthrough", "Passthrough")
            .category(Category::Custom)
            .description("Passes the raster through unchanged")
            .build()
    }

    fn validate(&self, _options: &Options, _input: &ImageInfo) -> Result<(), InvalidOptionsError> {
        Ok(())
    }

    fn apply(&self, input: &RasterImage, _options: &Options) -> KitResult<RasterImage> {
        Ok(input.clone())
    }

    fn is_noop(&self, _options: &Options) -> bool {
        true
    }
}
