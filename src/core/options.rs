//! Option schemas and option values for operations.
//!
//! Every operation declares its options up front: a name, a type, an optional
//! default and a list of constraints. The schema alone is enough to check a
//! configured operation when it is pushed onto the stack; checks that depend on
//! the raster (crop bounds, for instance) belong to the operation itself.

use crate::core::error::InvalidOptionsError;
use crate::core::types::{OptionType, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Definition of a single operation option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDefinition {
    /// Unique name within the operation
    pub name: String,
    /// Type of the option
    pub option_type: OptionType,
    /// Default value; `None` marks the option as required
    pub default_value: Option<Value>,
    /// Description for documentation
    pub description: String,
    /// Constraints for validation
    pub constraints: Vec<Constraint>,
}

/// Constraints that can be applied to option values.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Constraint {
    /// Numeric value must be within range [min, max]
    Range { min: f64, max: f64 },
    /// Numeric value must be >= min
    MinValue(f64),
    /// Numeric value must be <= max
    MaxValue(f64),
    /// Value must equal one of the listed options
    OneOf(Vec<Value>),
    /// Number must be positive (> 0)
    Positive,
    /// Number must be non-negative (>= 0)
    NonNegative,
    /// Custom constraint with validation function
    /// Note: The closure is skipped during serialization
    #[serde(skip)]
    Custom {
        name: String,
        description: String,
        validator: Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>,
    },
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Constraint::MinValue(v) => f.debug_tuple("MinValue").field(v).finish(),
            Constraint::MaxValue(v) => f.debug_tuple("MaxValue").field(v).finish(),
            Constraint::OneOf(v) => f.debug_tuple("OneOf").field(v).finish(),
            Constraint::Positive => write!(f, "Positive"),
            Constraint::NonNegative => write!(f, "NonNegative"),
            Constraint::Custom {
                name, description, ..
            } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("description", description)
                .field("validator", &"<closure>")
                .finish(),
        }
    }
}

// ============================================================================
// OptionDefinition Builder Pattern
// ============================================================================

impl OptionDefinition {
    /// Create an option with a default value.
    pub fn new(name: impl Into<String>, option_type: OptionType, default_value: Value) -> Self {
        Self {
            name: name.into(),
            option_type,
            default_value: Some(default_value),
            description: String::new(),
            constraints: Vec::new(),
        }
    }

    /// Create an option the caller must always supply.
    pub fn required(name: impl Into<String>, option_type: OptionType) -> Self {
        Self {
            name: name.into(),
            option_type,
            default_value: None,
            description: String::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a range constraint.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Whether the caller must supply this option.
    pub fn is_required(&self) -> bool {
        self.default_value.is_none()
    }

    /// Validate a value against this option's type and constraints.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if !self.option_type.matches(value) {
            return Err(format!(
                "expected {}, got {}",
                self.option_type,
                value.get_type()
            ));
        }

        for constraint in &self.constraints {
            constraint.validate(value)?;
        }

        Ok(())
    }
}

// ============================================================================
// Constraint Validation
// ============================================================================

impl Constraint {
    /// Validate a value against this constraint.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            Constraint::Range { min, max } => {
                if let Some(num) = value.as_float() {
                    if num < *min || num > *max {
                        return Err(format!("value {} is out of range [{}, {}]", num, min, max));
                    }
                }
            }

            Constraint::MinValue(min) => {
                if let Some(num) = value.as_float() {
                    if num < *min {
                        return Err(format!("value {} is below minimum {}", num, min));
                    }
                }
            }

            Constraint::MaxValue(max) => {
                if let Some(num) = value.as_float() {
                    if num > *max {
                        return Err(format!("value {} is above maximum {}", num, max));
                    }
                }
            }

            Constraint::OneOf(options) => {
                let matches = options.iter().any(|opt| match (opt.as_float(), value.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => opt == value,
                });
                if !matches {
                    let allowed: Vec<String> = options.iter().map(|o| o.to_string()).collect();
                    return Err(format!(
                        "value {} is not one of [{}]",
                        value,
                        allowed.join(", ")
                    ));
                }
            }

            Constraint::Positive => {
                if let Some(num) = value.as_float() {
                    if num <= 0.0 {
                        return Err(format!("value {} must be positive", num));
                    }
                }
            }

            Constraint::NonNegative => {
                if let Some(num) = value.as_float() {
                    if num < 0.0 {
                        return Err(format!("value {} must be non-negative", num));
                    }
                }
            }

            Constraint::Custom {
                name, validator, ..
            } => {
                validator(value).map_err(|e| format!("{}: {}", name, e))?;
            }
        }

        Ok(())
    }

    /// Get a human-readable description of this constraint.
    pub fn description(&self) -> String {
        match self {
            Constraint::Range { min, max } => format!("Must be between {} and {}", min, max),
            Constraint::MinValue(min) => format!("Must be at least {}", min),
            Constraint::MaxValue(max) => format!("Must be at most {}", max),
            Constraint::OneOf(options) => {
                let allowed: Vec<String> = options.iter().map(|o| o.to_string()).collect();
                format!("One of: {}", allowed.join(", "))
            }
            Constraint::Positive => "Must be positive".to_string(),
            Constraint::NonNegative => "Must be non-negative".to_string(),
            Constraint::Custom { description, .. } => description.clone(),
        }
    }
}

// ============================================================================
// Option Schema
// ============================================================================

/// Ordered set of option definitions declared by an operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionSchema {
    definitions: IndexMap<String, OptionDefinition>,
}

impl OptionSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option definition; a later definition with the same name wins.
    pub fn option(mut self, definition: OptionDefinition) -> Self {
        self.definitions.insert(definition.name.clone(), definition);
        self
    }

    /// Find an option by name.
    pub fn get(&self, name: &str) -> Option<&OptionDefinition> {
        self.definitions.get(name)
    }

    /// All option definitions in declaration order.
    pub fn definitions(&self) -> impl Iterator<Item = &OptionDefinition> {
        self.definitions.values()
    }

    /// All option names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(|k| k.as_str()).collect()
    }

    /// Number of declared options.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the schema declares no options.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Fill unset options from their declared defaults.
    pub fn apply_defaults(&self, options: &mut Options) {
        for definition in self.definitions.values() {
            if let Some(default) = &definition.default_value {
                if !options.contains(&definition.name) {
                    options.set(definition.name.clone(), default.clone());
                }
            }
        }
    }

    /// Check options against this schema.
    ///
    /// Rejects unknown option names, missing required options, type mismatches
    /// and constraint violations. `operation` names the owner in the error.
    pub fn validate(&self, operation: &str, options: &Options) -> Result<(), InvalidOptionsError> {
        for (name, value) in options.iter() {
            let definition = self.definitions.get(name).ok_or_else(|| {
                InvalidOptionsError::new(
                    operation,
                    name,
                    format!("unknown option (expected one of: {})", self.names().join(", ")),
                )
            })?;
            definition
                .validate(value)
                .map_err(|reason| InvalidOptionsError::new(operation, name, reason))?;
        }

        for definition in self.definitions.values() {
            if definition.is_required() && !options.contains(&definition.name) {
                return Err(InvalidOptionsError::new(
                    operation,
                    &definition.name,
                    "option is required",
                ));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Options
// ============================================================================

/// Concrete option values of a configured operation, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(IndexMap<String, Value>);

impl Options {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Merge `other` into `self`; values in `other` win.
    pub fn merge(&mut self, other: Options) {
        self.0.extend(other.0);
    }

    /// Raw lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether an option is set.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterate over name/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of set options.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no options are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // ========================================================================
    // Typed Getters
    // ========================================================================

    fn require(&self, operation: &str, name: &str) -> Result<&Value, InvalidOptionsError> {
        self.0
            .get(name)
            .ok_or_else(|| InvalidOptionsError::new(operation, name, "option is not set"))
    }

    /// Get an option as an integer.
    pub fn get_integer(&self, operation: &str, name: &str) -> Result<i64, InvalidOptionsError> {
        self.require(operation, name)?
            .as_integer()
            .ok_or_else(|| InvalidOptionsError::new(operation, name, "expected Integer"))
    }

    /// Get an option as a float.
    pub fn get_float(&self, operation: &str, name: &str) -> Result<f64, InvalidOptionsError> {
        self.require(operation, name)?
            .as_float()
            .ok_or_else(|| InvalidOptionsError::new(operation, name, "expected Float"))
    }

    /// Get an option as a string.
    pub fn get_string(&self, operation: &str, name: &str) -> Result<&str, InvalidOptionsError> {
        self.require(operation, name)?
            .as_string()
            .ok_or_else(|| InvalidOptionsError::new(operation, name, "expected String"))
    }

    /// Get an option as a boolean.
    pub fn get_bool(&self, operation: &str, name: &str) -> Result<bool, InvalidOptionsError> {
        self.require(operation, name)?
            .as_bool()
            .ok_or_else(|| InvalidOptionsError::new(operation, name, "expected Boolean"))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
