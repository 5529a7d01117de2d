//! @ai:module:intent Define error types for the metrics pipeline
//! @ai:module:layer domain
//! @ai:module:public_api Error, Result
//! @ai:module:stateless true

use std::path::PathBuf;
use thiserror::Error;

/// @ai:intent Unified error type for all pipeline operations
///
/// Run-local and row-local failures (unparseable metric file, excluded run,
/// out-of-domain derivation) are absorbed into counters and defaults and
/// never appear here; only structural failures are surfaced.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed schema: {0}")]
    Schema(String),

    #[error("Invalid derivation spec '{name}': {message}")]
    Spec { name: String, message: String },

    #[error("Table alignment failed: {0}")]
    Alignment(String),

    #[error("CSV error at {path}:{line}: {message}")]
    Csv {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// @ai:intent Build a schema error from anything displayable
    /// @ai:effects pure
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    /// @ai:intent Build a derivation spec error for a named quantity
    /// @ai:effects pure
    pub fn spec(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Spec {
            name: name.into(),
            message: message.into(),
        }
    }
}
