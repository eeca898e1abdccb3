//! Validation utilities.

use crate::{FieldError, SchedulerError};
use validator::{Validate, ValidationErrors};

/// Extension trait for validation.
pub trait ValidateExt: Validate {
    /// Validates the struct and returns a `SchedulerError` on failure.
    fn validate_request(&self) -> Result<(), SchedulerError> {
        self.validate().map_err(validation_errors_to_scheduler_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Converts `validator::ValidationErrors` to `SchedulerError`.
#[must_use]
pub fn validation_errors_to_scheduler_error(errors: ValidationErrors) -> SchedulerError {
    let field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: (*field).to_string(),
                message: error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), |m| m.to_string()),
                code: error.code.to_string(),
            })
        })
        .collect();

    let message = field_errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");

    SchedulerError::Validation(message)
}

/// Common validation functions shared by domain entities.
pub mod rules {
    use validator::ValidationError;

    /// Validates that a string is not blank (not empty after trimming).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("not_blank"));
        }
        Ok(())
    }

    /// Validates a cron expression has the expected 5-field shape.
    ///
    /// Full grammar validation happens when the expression is parsed by
    /// the `cron` crate; this only rejects obviously malformed input early.
    pub fn valid_cron_expression(value: &str) -> Result<(), ValidationError> {
        if value.split_whitespace().count() != 5 {
            return Err(ValidationError::new("cron_must_have_five_fields"));
        }
        Ok(())
    }
}
