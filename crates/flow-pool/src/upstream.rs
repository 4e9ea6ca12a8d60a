//! Structured upstream errors and retry classification
//!
//! Errors are constructed at the point the upstream call is made, carrying
//! the numeric status or typed kind observed there. Retry classification is
//! then a pure function of the variant; the executor never inspects message
//! strings.

use thiserror::Error;

/// Resource-exhaustion markers in upstream error bodies.
///
/// Google-style APIs report quota exhaustion as a structured status string
/// inside the error body rather than a dedicated HTTP code, so the body is
/// sniffed once, at the call site, when the typed error is built.
const RESOURCE_EXHAUSTED_PATTERNS: &[&str] = &[
    "RESOURCE_EXHAUSTED",
    "resource exhausted",
    "quota exceeded",
    "out of quota",
];

/// HTTP statuses worth retrying on a different account.
const RETRYABLE_STATUSES: &[u16] = &[401, 403, 429, 500, 502];

/// Failure of one upstream call against one account.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Non-success HTTP status without a recognized exhaustion marker.
    #[error("upstream returned {code}: {message}")]
    Status { code: u16, message: String },

    /// Account quota exhausted upstream (structured exhaustion marker).
    #[error("upstream resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Status poll rejected with 403/404 — the account lost access to the
    /// operation. Retryable-shaped so a future multi-candidate poll path
    /// needs no classification change.
    #[error("operation access lost ({code}): {message}")]
    AccessLost { code: u16, message: String },

    /// Transport-level failure (connect, TLS, timeout) before any status
    /// was observed.
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// 2xx response whose body is not the expected structured format
    /// (e.g. an HTML error page in place of JSON).
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    /// Upstream accepted the request but returned no task identifier —
    /// a protocol mismatch, not an account problem.
    #[error("upstream response missing task id: {0}")]
    MissingTaskId(String),

    /// Every reference image upload failed; generation cannot fall back to
    /// text-only.
    #[error("reference image uploads failed: {0}")]
    ReferenceUploadFailed(String),

    /// The request itself is unusable; retrying on another account cannot
    /// help.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Retry classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The same request might succeed on a different account.
    Retryable,
    /// Aborts the dispatch immediately; no other account is attempted.
    Fatal,
}

impl UpstreamError {
    /// Build the typed error for a non-success HTTP response.
    ///
    /// Sniffs the body for structured exhaustion markers so that the
    /// classification downstream stays a pure function of the variant.
    pub fn from_status(code: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let lower = body.to_lowercase();
        for pattern in RESOURCE_EXHAUSTED_PATTERNS {
            if lower.contains(&pattern.to_lowercase()) {
                return UpstreamError::ResourceExhausted(truncate(&body, 200));
            }
        }
        UpstreamError::Status {
            code,
            message: truncate(&body, 200),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            UpstreamError::Status { code, .. } if RETRYABLE_STATUSES.contains(code) => {
                ErrorClass::Retryable
            }
            UpstreamError::ResourceExhausted(_)
            | UpstreamError::AccessLost { .. }
            | UpstreamError::Transport(_) => ErrorClass::Retryable,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// Clip a body snapshot for error messages and diagnostics.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
