//! Error types for the simulation kernel

use thiserror::Error;

/// Errors raised by the kernel's component registry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("Component not found with ID: {id}")]
    ComponentNotFound { id: String },

    #[error("Component type mismatch: expected {expected}")]
    TypeMismatch { expected: String },
}

/// Rejected distribution parameters.
///
/// Raised eagerly when a distribution is constructed or validated, never
/// while sampling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("parameter `{name}` must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("parameter `{name}` must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("parameter `{name}` must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("`{lower}` ({lower_value}) must not exceed `{upper}` ({upper_value})")]
    Inverted {
        lower: &'static str,
        lower_value: f64,
        upper: &'static str,
        upper_value: f64,
    },

    #[error("`{0}` requires at least one value")]
    Empty(&'static str),

    #[error("`{0}` never draws a positive value")]
    NeverPositive(&'static str),

    #[error("sampler rejected parameters: {0}")]
    Rejected(String),
}
