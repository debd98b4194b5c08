//! Stack presets for saving and loading.

use crate::stack::structure::{ConfiguredOperation, OperationStack};
use serde::{Deserialize, Serialize};

/// Serializable representation of an operation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedStack {
    /// Preset format version
    pub version: String,
    /// Entries in application order
    pub operations: Vec<ConfiguredOperation>,
}

impl SerializedStack {
    /// Current format version.
    pub const VERSION: &'static str = "1.0.0";

    /// Create an empty preset.
    pub fn new() -> Self {
        Self {
            version: Self::VERSION.to_string(),
            operations: Vec::new(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to compact JSON (no whitespace).
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Default for SerializedStack {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&OperationStack> for SerializedStack {
    fn from(stack: &OperationStack) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            operations: stack.to_list(),
        }
    }
}
