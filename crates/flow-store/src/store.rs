//! The narrow read/patch interface the pool consumes
//!
//! The store is the only shared mutable resource in the system. Access is
//! independent read/patch calls with no transactions: concurrent dispatches
//! may both read the same under-quota account and both increment it, which
//! is an accepted best-effort quota, not a hard cap.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn AccountStore>`).

use std::future::Future;
use std::pin::Pin;

use crate::account::Account;
use crate::error::Result;

/// Abstraction over the backing account data store.
pub trait AccountStore: Send + Sync {
    /// List accounts that are active and carry credentials, ordered
    /// most-recently-updated first (insertion order as the tie-break).
    fn list_active(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Account>>> + Send + '_>>;

    /// Patch one account's usage counter to an absolute value.
    fn set_usage<'a>(
        &'a self,
        account_id: &'a str,
        usage_count: u32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Bulk-reset `usageCount` to 0 for every active account (pool-wide
    /// quota rollover).
    fn reset_usage(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
