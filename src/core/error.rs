//! Error types for imgkit.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Name the failing operation, option and stack position where known
//! - Be reported to the immediate caller, never swallowed or retried
//! - Support automatic conversion into the top-level [`KitError`]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for imgkit.
///
/// Every fallible call on the kit, the registry, the stack or the render engine
/// reports one of these variants.
#[derive(Error, Debug)]
pub enum KitError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid render parameter: {0}")]
    InvalidRenderParameter(String),

    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    #[error(transparent)]
    InvalidOperationOptions(#[from] InvalidOptionsError),

    #[error("Operation '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("Index {index} is out of range for a stack of {len} operation(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Render stage '{stage}' timed out after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    #[error("Render task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An operation's options failed its own validator.
///
/// Carries the operation identifier, the offending option and the reason.
/// `stage` is the stack position when the failure surfaced during a render.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Invalid option '{option}' for operation '{operation}'{}: {reason}", stage_suffix(.stage))]
pub struct InvalidOptionsError {
    /// Identifier of the operation whose options were rejected.
    pub operation: String,
    /// Name of the offending option.
    pub option: String,
    /// Why the value was rejected.
    pub reason: String,
    /// Stack index of the failing entry, if known.
    pub stage: Option<usize>,
}

fn stage_suffix(stage: &Option<usize>) -> String {
    match stage {
        Some(index) => format!(" at stage {}", index),
        None => String::new(),
    }
}

impl InvalidOptionsError {
    /// Create a new error without stage information.
    pub fn new(
        operation: impl Into<String>,
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            option: option.into(),
            reason: reason.into(),
            stage: None,
        }
    }

    /// Attach the stack index at which the error surfaced.
    pub fn at_stage(mut self, stage: usize) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> String {
        format!("Adjust '{}' on '{}': {}", self.option, self.operation, self.reason)
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl KitError {
    /// Whether this error was raised before any raster work started.
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            KitError::InvalidRenderParameter(_) | KitError::InvalidConfiguration(_)
        )
    }

    /// Stack index of the stage that failed, if the error carries one.
    pub fn stage(&self) -> Option<usize> {
        match self {
            KitError::InvalidOperationOptions(err) => err.stage,
            _ => None,
        }
    }
}

/// Result type alias for imgkit operations.
pub type KitResult<T> = Result<T, KitError>;

// ============================================================================
// Validation Report
// ============================================================================

/// Outcome of a dry-run validation of the operation stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether validation passed without errors.
    pub success: bool,
    /// List of errors found.
    pub errors: Vec<ValidationIssue>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<ValidationIssue>,
    /// Predicted output dimensions when validation succeeded.
    pub output_dimensions: Option<(u32, u32)>,
}

/// A single finding from stack validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stack index of the entry.
    pub index: usize,
    /// Operation identifier of the entry.
    pub operation: String,
    /// What is wrong.
    pub message: String,
    /// How to address it.
    pub suggestion: Option<String>,
}

impl ValidationReport {
    /// Create a new empty report (success).
    pub fn new() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            output_dimensions: None,
        }
    }

    /// Add an error to the report.
    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.success = false;
        self.errors.push(issue);
    }

    /// Add a warning to the report.
    pub fn add_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Check if the stack can be rendered.
    pub fn can_render(&self) -> bool {
        self.success
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        if self.success {
            if self.warnings.is_empty() {
                "✓ Stack is valid and ready to render".to_string()
            } else {
                format!("✓ Stack is valid with {} warning(s)", self.warnings.len())
            }
        } else {
            format!("✗ Validation failed with {} error(s)", self.errors.len())
        }
    }

    /// Get detailed error messages with suggestions.
    pub fn detailed_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|issue| {
                let mut msg = format!("{}. [{}] {}", issue.index, issue.operation, issue.message);
                if let Some(fix) = &issue.suggestion {
                    msg.push_str(&format!("\n   → Suggestion: {}", fix));
                }
                msg
            })
            .collect()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_options_display() {
        let err = InvalidOptionsError::new("crop", "width", "exceeds source width 100");
        assert_eq!(
            err.to_string(),
            "Invalid option 'width' for operation 'crop': exceeds source width 100"
        );

        let err = err.at_stage(2);
        assert!(err.to_string().contains("at stage 2"));
        assert!(err.suggested_fix().contains("width"));
    }

    #[test]
    fn test_kit_error_stage() {
        let err: KitError = InvalidOptionsError::new("crop", "x", "negative").at_stage(1).into();
        assert_eq!(err.stage(), Some(1));
        assert!(KitError::InvalidRenderParameter("bmp".into()).is_parameter_error());
        assert_eq!(KitError::UnknownOperation("blur".into()).stage(), None);
    }

    #[test]
    fn test_validation_report() {
        let mut report = ValidationReport::new();
        assert!(report.can_render());

        report.add_error(ValidationIssue {
            index: 0,
            operation: "crop".to_string(),
            message: "too wide".to_string(),
            suggestion: Some("shrink it".to_string()),
        });
        assert!(!report.can_render());
        assert_eq!(report.detailed_errors().len(), 1);
        assert!(report.detailed_errors()[0].contains("shrink it"));
    }
}
