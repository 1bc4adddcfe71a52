//! Error type for the case data layer.
//!
//! Loading and validating a [`Network`](crate::Network) reports through
//! [`GatError`]; formulation crates wrap it in their own error enums.

use thiserror::Error;

/// Errors raised while reading or validating case data.
#[derive(Error, Debug)]
pub enum GatError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network structure errors (unknown buses, bad topology)
    #[error("Network error: {0}")]
    Network(String),
}

/// Convenience type alias for Results using GatError.
pub type GatResult<T> = Result<T, GatError>;

impl From<serde_json::Error> for GatError {
    fn from(err: serde_json::Error) -> Self {
        GatError::Parse(err.to_string())
    }
}
