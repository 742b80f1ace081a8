//! Error types for marga-nav

use thiserror::Error;

/// marga-nav error type
#[derive(Error, Debug)]
pub enum MargaError {
    /// Invalid configuration or argument at a public entry point.
    #[error("Usage error: {0}")]
    Usage(String),

    /// Malformed map input.
    #[error("Input error: {0}")]
    Input(String),

    /// Cell access outside the grid dimensions.
    #[error("Cell ({x}, {y}) is out of bounds")]
    OutOfBounds {
        /// Requested column index
        x: usize,
        /// Requested row index
        y: usize,
    },

    /// Underlying file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for MargaError {
    fn from(e: toml::de::Error) -> Self {
        MargaError::Usage(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MargaError>;
