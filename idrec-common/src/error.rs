//! Common error types for idrec

use thiserror::Error;

/// Common result type for idrec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across idrec services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored row could not be mapped onto the contact model
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
