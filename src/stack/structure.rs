//! The ordered operation stack.

use crate::core::error::{KitError, KitResult};
use crate::core::options::Options;
use crate::operations::registry::OperationRegistry;
use log::debug;
use serde::{Deserialize, Serialize};

/// An operation chosen by the user: identifier plus option values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredOperation {
    /// Registry key of the operation kind.
    pub identifier: String,
    /// Option values; schema defaults are filled in once the identifier resolves.
    #[serde(default)]
    pub options: Options,
}

impl ConfiguredOperation {
    /// Create a configured operation.
    pub fn new(identifier: impl Into<String>, options: Options) -> Self {
        Self {
            identifier: identifier.into(),
            options,
        }
    }

    /// Create a configured operation with no explicit options.
    pub fn bare(identifier: impl Into<String>) -> Self {
        Self::new(identifier, Options::new())
    }

    /// Fill defaults and check options against the schema, if the identifier resolves.
    ///
    /// Unknown identifiers are accepted as-is and fail at render time instead.
    pub fn prepare(&mut self, registry: &OperationRegistry) -> KitResult<()> {
        if let Some(descriptor) = registry.get(&self.identifier) {
            descriptor.prepare_options(&mut self.options)?;
        } else {
            debug!(
                "Operation '{}' is not registered; deferring validation to render",
                self.identifier
            );
        }
        Ok(())
    }
}

/// Ordered sequence of configured operations. Insertion order is application order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStack {
    entries: Vec<ConfiguredOperation>,
}

impl OperationStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; it is applied last.
    pub fn push(&mut self, mut entry: ConfiguredOperation, registry: &OperationRegistry) -> KitResult<()> {
        entry.prepare(registry)?;
        debug!("Pushed '{}' at index {}", entry.identifier, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Insert an entry at `index` in `[0, len]`.
    pub fn insert_at(
        &mut self,
        index: usize,
        mut entry: ConfiguredOperation,
        registry: &OperationRegistry,
    ) -> KitResult<()> {
        if index > self.entries.len() {
            return Err(self.out_of_range(index));
        }
        entry.prepare(registry)?;
        debug!("Inserted '{}' at index {}", entry.identifier, index);
        self.entries.insert(index, entry);
        Ok(())
    }

    /// Remove and return the entry at `index`.
    pub fn remove_at(&mut self, index: usize) -> KitResult<ConfiguredOperation> {
        self.check_index(index)?;
        let removed = self.entries.remove(index);
        debug!("Removed '{}' from index {}", removed.identifier, index);
        Ok(removed)
    }

    /// Move the entry at `from` so it ends up at `to`.
    pub fn move_to(&mut self, from: usize, to: usize) -> KitResult<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let entry = self.entries.remove(from);
            debug!("Moved '{}' from index {} to {}", entry.identifier, from, to);
            self.entries.insert(to, entry);
        }
        Ok(())
    }

    /// Replace the entry at `index`, returning the previous one.
    pub fn replace(
        &mut self,
        index: usize,
        mut entry: ConfiguredOperation,
        registry: &OperationRegistry,
    ) -> KitResult<ConfiguredOperation> {
        self.check_index(index)?;
        entry.prepare(registry)?;
        debug!("Replaced index {} with '{}'", index, entry.identifier);
        Ok(std::mem::replace(&mut self.entries[index], entry))
    }

    /// Merge `options` into the entry at `index`; given values win.
    ///
    /// The entry is left untouched if the merged options fail validation.
    pub fn set_options(
        &mut self,
        index: usize,
        options: Options,
        registry: &OperationRegistry,
    ) -> KitResult<()> {
        self.check_index(index)?;
        let mut updated = self.entries[index].clone();
        updated.options.merge(options);
        updated.prepare(registry)?;
        debug!("Updated options of '{}' at index {}", updated.identifier, index);
        self.entries[index] = updated;
        Ok(())
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            debug!("Cleared {} stack entr(ies)", self.entries.len());
        }
        self.entries.clear();
    }

    /// Owned, ordered copy of the entries.
    pub fn to_list(&self) -> Vec<ConfiguredOperation> {
        self.entries.clone()
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&ConfiguredOperation> {
        self.entries.get(index)
    }

    /// Iterate in application order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfiguredOperation> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_index(&self, index: usize) -> KitResult<()> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(self.out_of_range(index))
        }
    }

    fn out_of_range(&self, index: usize) -> KitError {
        KitError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        }
    }
}

impl FromIterator<ConfiguredOperation> for OperationStack {
    /// Collect entries as-is, without schema checks.
    fn from_iter<I: IntoIterator<Item = ConfiguredOperation>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Value;

    fn registry() -> OperationRegistry {
        OperationRegistry::with_builtins()
    }

    fn identifiers(stack: &OperationStack) -> Vec<String> {
        stack.iter().map(|e| e.identifier.clone()).collect()
    }

    #[test]
    fn test_push_fills_defaults() {
        let registry = registry();
        let mut stack = OperationStack::new();
        stack
            .push(ConfiguredOperation::new("crop", Options::new().with("width", 10).with("height", 5)), &registry)
            .unwrap();

        let entry = stack.get(0).unwrap();
        assert_eq!(entry.options.get("x"), Some(&Value::Integer(0)));
        assert_eq!(entry.options.get("y"), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_push_rejects_bad_options() {
        let registry = registry();
        let mut stack = OperationStack::new();

        let err = stack
            .push(ConfiguredOperation::new("rotation", Options::new().with("angle", 45)), &registry)
            .unwrap_err();
        assert!(matches!(err, KitError::InvalidOperationOptions(ref e) if e.option == "angle"));

        let err = stack
            .push(ConfiguredOperation::bare("crop"), &registry)
            .unwrap_err();
        assert!(matches!(err, KitError::InvalidOperationOptions(_)));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_push_unknown_is_deferred() {
        let registry = registry();
        let mut stack = OperationStack::new();
        stack
            .push(ConfiguredOperation::new("vignette", Options::new().with("radius", 3)), &registry)
            .unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.get(0).unwrap().options.len(), 1);
    }

    #[test]
    fn test_index_bounds() {
        let registry = registry();
        let mut stack = OperationStack::new();

        // insert_at accepts len, others do not
        stack.insert_at(0, ConfiguredOperation::bare("rotation"), &registry).unwrap();
        stack.insert_at(1, ConfiguredOperation::bare("filters"), &registry).unwrap();
        assert!(matches!(
            stack.insert_at(3, ConfiguredOperation::bare("rotation"), &registry),
            Err(KitError::IndexOutOfRange { index: 3, len: 2 })
        ));
        assert!(matches!(stack.remove_at(2), Err(KitError::IndexOutOfRange { .. })));
        assert!(matches!(stack.move_to(0, 2), Err(KitError::IndexOutOfRange { .. })));
        assert!(matches!(
            stack.replace(2, ConfiguredOperation::bare("rotation"), &registry),
            Err(KitError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            stack.set_options(5, Options::new(), &registry),
            Err(KitError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_move_and_remove() {
        let registry = registry();
        let mut stack = OperationStack::new();
        for id in ["filters", "rotation", "crop_later"] {
            stack.push(ConfiguredOperation::bare(id), &registry).unwrap();
        }

        stack.move_to(0, 2).unwrap();
        assert_eq!(identifiers(&stack), vec!["rotation", "crop_later", "filters"]);

        stack.move_to(2, 0).unwrap();
        assert_eq!(identifiers(&stack), vec!["filters", "rotation", "crop_later"]);

        let removed = stack.remove_at(1).unwrap();
        assert_eq!(removed.identifier, "rotation");
        assert_eq!(identifiers(&stack), vec!["filters", "crop_later"]);
    }

    #[test]
    fn test_set_options_is_atomic() {
        let registry = registry();
        let mut stack = OperationStack::new();
        stack
            .push(ConfiguredOperation::new("rotation", Options::new().with("angle", 90)), &registry)
            .unwrap();

        stack
            .set_options(0, Options::new().with("angle", 180), &registry)
            .unwrap();
        assert_eq!(stack.get(0).unwrap().options.get("angle"), Some(&Value::Integer(180)));

        assert!(stack
            .set_options(0, Options::new().with("angle", 33), &registry)
            .is_err());
        assert_eq!(stack.get(0).unwrap().options.get("angle"), Some(&Value::Integer(180)));
    }

    #[test]
    fn test_to_list_is_a_copy() {
        let registry = registry();
        let mut stack = OperationStack::new();
        stack.push(ConfiguredOperation::bare("rotation"), &registry).unwrap();

        let snapshot = stack.to_list();
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].identifier, "rotation");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn move_and_back_restores_order(len in 1usize..8, from in 0usize..8, to in 0usize..8) {
                let (from, to) = (from % len, to % len);
                let mut stack: OperationStack = (0..len)
                    .map(|i| ConfiguredOperation::new("rotation", Options::new().with("angle", (i % 4) as i64 * 90)))
                    .collect();
                let before = stack.to_list();

                stack.move_to(from, to).unwrap();
                prop_assert_eq!(stack.len(), len);
                prop_assert_eq!(&stack.get(to).unwrap().options, &before[from].options);

                stack.move_to(to, from).unwrap();
                prop_assert_eq!(stack.to_list(), before);
                prop_assert!(stack.move_to(len, 0).is_err());
            }
        }
    }
}
