//! Field validation for model descriptions
//!
//! Model constructors and [`Validate`] implementations use these helpers so
//! that every rejected field produces the same error shape.

/// Validation result for model configuration
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors that can occur while validating a model description
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Field '{field}' must be {constraint}")]
    ConstraintViolation { field: String, constraint: String },
}

/// Trait for validating a model description before it joins a line
pub trait Validate {
    /// Check that all field values are valid and consistent with each other.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if validation fails.
    fn validate(&self) -> ValidationResult<()> {
        Ok(())
    }
}

/// Helper for validating that a value is positive
pub fn validate_positive<T: PartialOrd + Default + std::fmt::Display>(field: &str, value: T) -> ValidationResult<()> {
    if value <= T::default() {
        Err(ValidationError::ConstraintViolation {
            field: field.to_string(),
            constraint: "positive".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Helper for validating that a name is usable: not empty and not only whitespace
pub fn validate_non_empty(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "cannot be empty".to_string(),
        })
    } else {
        Ok(())
    }
}
