//! Stack validation without touching pixels.

pub mod pipeline;

pub use pipeline::StackValidator;
