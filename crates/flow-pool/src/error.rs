//! Error types for pool operations

use crate::upstream::UpstreamError;

/// Errors from pool operations.
///
/// All three variants are fatal from the caller's perspective;
/// `NoAccountsAvailable` and `AllAccountsFailed` are capacity errors while
/// `Fatal` means the request itself cannot succeed on any account.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no accounts available: {0}")]
    NoAccountsAvailable(String),

    #[error("all accounts failed after {attempted} attempts: {}", last_message(.last))]
    AllAccountsFailed {
        attempted: usize,
        last: Option<UpstreamError>,
    },

    #[error("upstream request failed: {0}")]
    Fatal(UpstreamError),
}

fn last_message(last: &Option<UpstreamError>) -> String {
    match last {
        Some(e) => e.to_string(),
        None => String::from("no eligible accounts"),
    }
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
