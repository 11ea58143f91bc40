//! Error types for soundbridge-common
//!
//! Defines shared error types using thiserror for clear error propagation.

use thiserror::Error;

/// Error type for shared infrastructure (configuration, file access)
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the shared Error
pub type Result<T> = std::result::Result<T, Error>;
