//! Built-in operations.
//!
//! - Color: preset filters
//! - Transform: rotation, crop

pub mod color;
pub mod transform;

pub use color::{ColorMatrix, FilterPreset, FiltersOperation};
pub use transform::{CropOperation, RotationOperation};

use crate::core::operation::OperationDescriptor;
use crate::operations::registry::OperationRegistry;

/// Identifiers of the default operations, in registration order.
pub const DEFAULT_IDENTIFIERS: [&str; 3] = [
    FiltersOperation::IDENTIFIER,
    RotationOperation::IDENTIFIER,
    CropOperation::IDENTIFIER,
];

/// Register all built-in operations.
pub fn register_all(registry: &mut OperationRegistry) {
    registry.insert(OperationDescriptor::new(FiltersOperation));
    registry.insert(OperationDescriptor::new(RotationOperation));
    registry.insert(OperationDescriptor::new(CropOperation));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_order() {
        let mut registry = OperationRegistry::new();
        register_all(&mut registry);
        assert_eq!(
            registry.identifiers().collect::<Vec<_>>(),
            DEFAULT_IDENTIFIERS.to_vec()
        );
    }
}
