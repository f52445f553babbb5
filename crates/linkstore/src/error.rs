//! Storage error types

use thiserror::Error;

/// Errors from document store operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("document parse error: {0}")]
    Corrupt(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
