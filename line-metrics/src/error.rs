//! Error types for statistics export

use thiserror::Error;

/// Errors raised while exporting reports
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Export error: {0}")]
    ExportError(String),
}
