//! Operation registry for managing available operation kinds.

use crate::core::error::{KitError, KitResult};
use crate::core::operation::{Category, Operation, OperationDescriptor};
use indexmap::IndexMap;
use log::debug;
use std::sync::Arc;

/// Registry for all available operation kinds of one session.
///
/// Entries are kept in registration order. In the default mode a second
/// registration under an existing identifier replaces the first; in strict mode
/// it fails with [`KitError::DuplicateOperation`].
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    /// Descriptors indexed by identifier.
    operations: IndexMap<String, Arc<OperationDescriptor>>,
    /// Reject re-registration instead of replacing.
    strict: bool,
}

impl OperationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            operations: IndexMap::new(),
            strict: false,
        }
    }

    /// Create a registry pre-populated with the built-in operations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::operations::builtin::register_all(&mut registry);
        registry
    }

    /// Enable or disable strict registration.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Whether re-registration fails instead of replacing.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Register a descriptor.
    pub fn register(&mut self, descriptor: OperationDescriptor) -> KitResult<()> {
        let identifier = descriptor.identifier().to_string();
        if self.strict && self.operations.contains_key(&identifier) {
            return Err(KitError::DuplicateOperation(identifier));
        }
        self.insert(descriptor);
        Ok(())
    }

    /// Register an operation implementation.
    pub fn register_operation<O>(&mut self, operation: O) -> KitResult<()>
    where
        O: Operation + 'static,
    {
        self.register(OperationDescriptor::new(operation))
    }

    /// Insert without the strict-mode check.
    pub(crate) fn insert(&mut self, descriptor: OperationDescriptor) {
        let identifier = descriptor.identifier().to_string();
        debug!("Registering operation '{}'", identifier);
        // A replaced entry keeps its original position.
        self.operations.insert(identifier, Arc::new(descriptor));
    }

    /// Unregister an operation. Returns whether an entry was removed.
    pub fn unregister(&mut self, identifier: &str) -> bool {
        let removed = self.operations.shift_remove(identifier).is_some();
        if removed {
            debug!("Unregistered operation '{}'", identifier);
        }
        removed
    }

    /// Look up a descriptor.
    pub fn resolve(&self, identifier: &str) -> KitResult<Arc<OperationDescriptor>> {
        self.operations
            .get(identifier)
            .cloned()
            .ok_or_else(|| KitError::UnknownOperation(identifier.to_string()))
    }

    /// Look up a descriptor without producing an error.
    pub fn get(&self, identifier: &str) -> Option<&Arc<OperationDescriptor>> {
        self.operations.get(identifier)
    }

    /// Drop every entry and register the built-in defaults again.
    pub fn reset(&mut self) {
        self.operations.clear();
        crate::operations::builtin::register_all(self);
        debug!("Registry reset to {} default operation(s)", self.operations.len());
    }

    /// Check if an operation is registered.
    pub fn contains(&self, identifier: &str) -> bool {
        self.operations.contains_key(identifier)
    }

    /// Get all registered identifiers in registration order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(|s| s.as_str())
    }

    /// Get all registered descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<OperationDescriptor>> {
        self.operations.values()
    }

    /// Get identifiers of operations in a category.
    pub fn by_category(&self, category: Category) -> Vec<&str> {
        self.operations
            .values()
            .filter(|d| d.metadata().category == category)
            .map(|d| d.identifier())
            .collect()
    }

    /// Get the total number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Builder for creating a customized registry.
pub struct RegistryBuilder {
    registry: OperationRegistry,
    include_builtins: bool,
    extra: Vec<OperationDescriptor>,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            registry: OperationRegistry::new(),
            include_builtins: true,
            extra: Vec::new(),
        }
    }

    /// Include or exclude built-in operations.
    pub fn with_builtins(mut self, include: bool) -> Self {
        self.include_builtins = include;
        self
    }

    /// Enable strict registration.
    pub fn strict(mut self, strict: bool) -> Self {
        self.registry.set_strict(strict);
        self
    }

    /// Register a custom operation after the built-ins.
    pub fn register<O>(mut self, operation: O) -> Self
    where
        O: Operation + 'static,
    {
        self.extra.push(OperationDescriptor::new(operation));
        self
    }

    /// Build the registry.
    pub fn build(mut self) -> KitResult<OperationRegistry> {
        if self.include_builtins {
            crate::operations::builtin::register_all(&mut self.registry);
        }
        for descriptor in self.extra {
            self.registry.register(descriptor)?;
        }
        Ok(self.registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
