//! Rendering: walking a stack snapshot over a source raster and encoding the result.

pub mod encoder;
pub mod engine;
pub mod request;
pub mod tracker;

pub use encoder::{data_url, parse_data_url, Encoder, RasterEncoder};
pub use engine::{RenderEngine, RenderOptions, RenderOutput, RenderPlan, RenderResult};
pub use request::{Dimensions, RenderRequest, RenderType};
pub use tracker::{RenderCallback, RenderState, RenderStats, RenderTracker};
