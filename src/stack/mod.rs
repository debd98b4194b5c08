//! The user's ordered list of configured operations.

pub mod serialization;
pub mod structure;

pub use serialization::SerializedStack;
pub use structure::{ConfiguredOperation, OperationStack};
