//! Operation kinds: the registry and the built-in set.

pub mod builtin;
pub mod registry;

pub use builtin::{CropOperation, FilterPreset, FiltersOperation, RotationOperation};
pub use registry::{OperationRegistry, RegistryBuilder};
