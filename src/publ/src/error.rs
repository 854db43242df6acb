//! Error types for path resolution and authorization

use thiserror::Error;

/// Bearer token failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token could not be decoded
    #[error("Invalid token")]
    Malformed,

    /// Token signature does not match the site secret
    #[error("Invalid token signature")]
    BadSignature,

    /// Token lifetime has passed
    #[error("Token expired")]
    Expired,
}

/// Publishing core errors
#[derive(Debug, Error)]
pub enum PublError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Group configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Bearer token rejected
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for publishing operations
pub type Result<T> = std::result::Result<T, PublError>;
