//! Error types for building and running lines

use crate::builder::ValidationError;
use line_core::DistributionError;
use thiserror::Error;

/// Configuration errors raised while assembling or starting a line.
///
/// All of them surface before the first event runs; a line that starts
/// simulating runs to its horizon.
#[derive(Debug, Error)]
pub enum LineError {
    #[error("a model named '{0}' is already registered")]
    DuplicateName(String),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("'{station}' references unknown buffer '{buffer}'")]
    UnresolvedBufferReference { station: String, buffer: String },

    #[error("buffer '{buffer}' already has {role} '{existing}', cannot also wire '{station}'")]
    BufferAlreadyWired {
        buffer: String,
        role: &'static str,
        existing: String,
        station: String,
    },

    #[error("buffer '{name}' needs a positive capacity, got {capacity}")]
    InvalidCapacity { name: String, capacity: usize },

    #[error("invalid distribution parameters for '{model}': {source}")]
    InvalidDistributionParameters {
        model: String,
        #[source]
        source: DistributionError,
    },

    #[error("line has already been simulated")]
    AlreadySimulated,

    #[error("malformed line description: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LineError {
    pub(crate) fn invalid_model(model: &str) -> impl FnOnce(ValidationError) -> LineError + '_ {
        move |err| LineError::InvalidModel(format!("'{model}': {err}"))
    }

    pub(crate) fn distribution(model: &str) -> impl FnOnce(DistributionError) -> LineError + '_ {
        move |source| LineError::InvalidDistributionParameters {
            model: model.to_string(),
            source,
        }
    }
}
