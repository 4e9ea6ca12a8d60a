//! Error types for account store operations

/// Errors from account store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account store request failed: {0}")]
    Http(String),

    #[error("account store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("account store response parse error: {0}")]
    Parse(String),

    #[error("account not found: {0}")]
    NotFound(String),
}

/// Result alias for account store operations.
pub type Result<T> = std::result::Result<T, Error>;
