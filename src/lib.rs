//! # imgkit - Composable Image Editing
//!
//! imgkit applies an ordered stack of image operations to a source raster and
//! renders the result as an in-memory image or an encoded data URL.
//!
//! ## Features
//!
//! - **Operation Stack**: Push, insert, move, replace and reconfigure operations; order is application order
//! - **Per-session Registry**: Built-in `filters`, `rotation` and `crop`, plus any custom [`Operation`](core::Operation)
//! - **Two-phase Validation**: Option schemas checked on push, raster-aware checks at render time
//! - **Async Rendering**: Renders work from an immutable snapshot on the blocking pool, with optional timeouts
//! - **Presets**: Stacks round-trip through JSON
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imgkit::prelude::*;
//!
//! let kit = Kit::new(RasterImage::from_path("input.png")?)?;
//!
//! kit.push("crop", Options::new().with("width", 100).with("height", 100))?;
//! kit.push("rotation", Options::new().with("angle", 90))?;
//! kit.push("filters", Options::new().with("filter", "sepia").with("intensity", 0.6))?;
//!
//! let result = kit.render_with(Some("data-url"), Some("image/jpeg"), Some("64x")).await?;
//! println!("{}", result.output.as_data_url().unwrap());
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Values, rasters, option schemas, the `Operation` trait and errors
//! - [`operations`]: Operation registry and the built-in operations
//! - [`stack`]: The ordered operation stack and JSON presets
//! - [`render`]: Render requests, the render engine and output encoding
//! - [`validation`]: Dry-run validation of a stack against raster dimensions
//! - [`config`]: TOML configuration
//! - [`kit`]: The session facade tying everything together
//!
//! ## Creating Custom Operations
//!
//! ```rust,ignore
//! use imgkit::prelude::*;
//!
//! struct Flip;
//!
//! impl Operation for Flip {
//!     fn metadata(&self) -> OperationMetadata {
//!         OperationMetadata::builder("flip", "Flip")
//!             .category(Category::Transform)
//!             .option(OptionDefinition::new("vertical", OptionType::Boolean, Value::Boolean(false)))
//!             .build()
//!     }
//!
//!     fn validate(&self, _options: &Options, _input: &ImageInfo) -> Result<(), InvalidOptionsError> {
//!         Ok(())
//!     }
//!
//!     fn apply(&self, input: &RasterImage, options: &Options) -> KitResult<RasterImage> {
//!         let image = if options.get_bool("flip", "vertical")? {
//!             input.image().flipv()
//!         } else {
//!             input.image().fliph()
//!         };
//!         Ok(RasterImage::new(image))
//!     }
//! }
//!
//! kit.register(Flip)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod kit;
pub mod operations;
pub mod render;
pub mod stack;
pub mod validation;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use imgkit::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{ColorFormat, ImageFormat, ImageInfo, OptionType, RasterImage, Value};

    // Options
    pub use crate::core::options::{Constraint, OptionDefinition, OptionSchema, Options};

    // Operation trait and metadata
    pub use crate::core::operation::{Category, Operation, OperationDescriptor, OperationMetadata};

    // Errors
    pub use crate::core::error::{
        ConfigError, InvalidOptionsError, KitError, KitResult, ValidationIssue, ValidationReport,
    };

    // Operations
    pub use crate::operations::builtin::{CropOperation, FilterPreset, FiltersOperation, RotationOperation};
    pub use crate::operations::registry::{OperationRegistry, RegistryBuilder};

    // Stack
    pub use crate::stack::{ConfiguredOperation, OperationStack, SerializedStack};

    // Rendering
    pub use crate::render::{
        Dimensions, Encoder, RasterEncoder, RenderEngine, RenderOptions, RenderOutput, RenderPlan,
        RenderRequest, RenderResult, RenderState, RenderStats, RenderType,
    };

    // Validation
    pub use crate::validation::StackValidator;

    // Session
    pub use crate::config::KitConfig;
    pub use crate::kit::{Kit, KitBuilder};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
