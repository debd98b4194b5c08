//! Dry-run validation of a stack snapshot.

use crate::core::error::{ValidationIssue, ValidationReport};
use crate::core::types::ImageInfo;
use crate::render::engine::RenderPlan;
use log::debug;
use std::time::Instant;

/// Walks a captured plan against raster metadata only.
///
/// Dimensions are propagated through each operation's `output_info`, so every
/// stage is checked against the raster it would actually receive. The walk
/// stops at the first error because later dimensions are unknown from there on.
#[derive(Debug, Clone, Copy)]
pub struct StackValidator {
    warn_on_noop: bool,
}

impl StackValidator {
    /// Create a validator that reports no-op stages as warnings.
    pub fn new() -> Self {
        Self { warn_on_noop: true }
    }

    /// Enable or disable no-op warnings.
    pub fn with_noop_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_noop = enabled;
        self
    }

    /// Validate `plan` against a source described by `source`.
    pub fn validate(&self, plan: &RenderPlan, source: ImageInfo) -> ValidationReport {
        let start = Instant::now();
        let mut report = ValidationReport::new();
        let mut current = source;

        for stage in plan.stages() {
            let identifier = &stage.entry.identifier;
            let Some(descriptor) = &stage.descriptor else {
                report.add_error(ValidationIssue {
                    index: stage.index,
                    operation: identifier.clone(),
                    message: format!("Unknown operation '{}'", identifier),
                    suggestion: Some("Register the operation or remove the entry".to_string()),
                });
                break;
            };

            let mut options = stage.entry.options.clone();
            descriptor.schema().apply_defaults(&mut options);

            if let Err(err) = descriptor.validate(&options, &current) {
                let err = err.at_stage(stage.index);
                report.add_error(ValidationIssue {
                    index: stage.index,
                    operation: identifier.clone(),
                    message: err.to_string(),
                    suggestion: Some(err.suggested_fix()),
                });
                break;
            }

            let operation = descriptor.operation();
            if self.warn_on_noop && operation.is_noop(&options) {
                report.add_warning(ValidationIssue {
                    index: stage.index,
                    operation: identifier.clone(),
                    message: "Stage leaves the image unchanged".to_string(),
                    suggestion: Some("Remove the entry or change its options".to_string()),
                });
            }

            current = operation.output_info(&options, &current);
        }

        if report.success {
            report.output_dimensions = Some((current.width, current.height));
        }

        debug!(
            "Validated {} stage(s) in {}ms: {}",
            plan.len(),
            start.elapsed().as_millis(),
            report.summary()
        );
        report
    }
}

impl Default for StackValidator {
    fn default() -> Self {
        Self::new()
    }
}
