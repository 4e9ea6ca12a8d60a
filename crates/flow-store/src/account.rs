//! Provider account model
//!
//! Field names follow the backing store's wire format (camelCase). Token
//! refresh is owned by the administrative process that writes accounts; this
//! service only reads credentials and patches usage counters.

use serde::{Deserialize, Serialize};

/// One provider identity/credential set with its own consumption quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,

    /// Bearer token for upstream generation calls.
    pub access_token: String,

    /// Session cookies forwarded alongside the token (some upstream routes
    /// require both).
    #[serde(default)]
    pub auth_cookies: Option<String>,

    /// Upstream project the account generates under. Accounts without one
    /// cannot fulfill generation requests and are skipped by the executor.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Quota-consuming operations completed since the last pool reset.
    #[serde(default)]
    pub usage_count: u32,

    /// Advisory quota ceiling. Soft limit: concurrent dispatches may
    /// overshoot it by the number of in-flight requests.
    #[serde(default = "default_usage_limit")]
    pub usage_limit: u32,

    #[serde(default = "default_active")]
    pub is_active: bool,

    /// RFC 3339 timestamp maintained by the store; used for recency ordering.
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_usage_limit() -> u32 {
    100
}

fn default_active() -> bool {
    true
}

impl Account {
    /// Whether the account carries usable credentials.
    pub fn has_credentials(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Whether the account still has quota headroom.
    pub fn under_quota(&self) -> bool {
        self.usage_count < self.usage_limit
    }
}
