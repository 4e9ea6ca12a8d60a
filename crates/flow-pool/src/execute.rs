//! Failover execution over an ordered candidate list
//!
//! Drives one operation against each candidate account in turn until one
//! succeeds. Attempts are strictly sequential — at most one account fulfills
//! a logical request, and candidates are never raced in parallel, so a
//! single request can never trigger duplicate billable generation.

use std::future::Future;
use std::sync::Arc;

use flow_store::{Account, AccountStore};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::kind::OperationKind;
use crate::upstream::UpstreamError;

/// Generic retry driver over an account ordering.
pub struct Executor {
    store: Arc<dyn AccountStore>,
}

impl Executor {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Run `op` against each account in order until one succeeds.
    ///
    /// Accounts without a `project_id` are skipped — they cannot carry
    /// generation traffic. For quota-consuming kinds, the account's usage
    /// counter is patched fire-and-forget *before* awaiting the attempt; a
    /// failed patch never aborts the attempt, and a failed attempt may still
    /// have consumed a unit (optimistic accounting).
    ///
    /// Retryable failures advance to the next candidate; any other failure
    /// is raised immediately so a malformed request is not replayed against
    /// the whole pool. Exhausting the list (including an empty or
    /// all-ineligible list) yields `AllAccountsFailed` with the last error.
    pub async fn execute<T, F, Fut>(
        &self,
        accounts: Vec<Account>,
        kind: OperationKind,
        op: F,
    ) -> Result<T>
    where
        F: Fn(Account) -> Fut,
        Fut: Future<Output = std::result::Result<T, UpstreamError>>,
    {
        let mut attempted = 0usize;
        let mut last: Option<UpstreamError> = None;

        for account in accounts {
            if account.project_id.is_none() {
                debug!(
                    account_id = %account.id,
                    "skipping account without project id"
                );
                continue;
            }

            if kind.consumes_quota() {
                let store = self.store.clone();
                let account_id = account.id.clone();
                let next_usage = account.usage_count.saturating_add(1);
                tokio::spawn(async move {
                    if let Err(e) = store.set_usage(&account_id, next_usage).await {
                        warn!(account_id, error = %e, "usage increment failed");
                    }
                });
            }

            attempted += 1;
            metrics::counter!("dispatch_attempts_total", "kind" => kind.as_str()).increment(1);

            let account_id = account.id.clone();
            match op(account).await {
                Ok(value) => {
                    debug!(account_id, kind = kind.as_str(), attempt = attempted, "attempt succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        account_id,
                        kind = kind.as_str(),
                        error = %e,
                        "attempt failed, failing over to next account"
                    );
                    last = Some(e);
                }
                Err(e) => {
                    error!(
                        account_id,
                        kind = kind.as_str(),
                        error = %e,
                        "fatal upstream error, aborting dispatch"
                    );
                    return Err(Error::Fatal(e));
                }
            }
        }

        Err(Error::AllAccountsFailed { attempted, last })
    }
}
