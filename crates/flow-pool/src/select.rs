//! Quota-filtered, shuffled account selection
//!
//! Builds the candidate ordering one dispatch will iterate. The shuffle is
//! the load-spreading mechanism: concurrent callers each get an independent
//! random ordering instead of piling onto the store's first row. There is no
//! sticky session affinity.

use std::sync::Arc;

use flow_store::{Account, AccountStore};
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Builds per-dispatch account orderings from a fresh store read.
pub struct Selector {
    store: Arc<dyn AccountStore>,
}

impl Selector {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Produce the ordered candidate list for one operation.
    ///
    /// With `ignore_quota` the full active list is returned unshuffled —
    /// status polls are account-pinned and not quota-consuming, so they must
    /// see saturated accounts too.
    ///
    /// Otherwise the list is filtered to under-quota accounts and shuffled.
    /// When every account is saturated, a pool-wide usage reset is kicked
    /// off fire-and-forget and the full set proceeds projected to usage 0;
    /// the persisted reset never blocks the dispatch.
    pub async fn select(&self, ignore_quota: bool) -> Result<Vec<Account>> {
        let accounts = self
            .store
            .list_active()
            .await
            .map_err(|e| Error::NoAccountsAvailable(format!("account store fetch failed: {e}")))?;

        let accounts: Vec<Account> = accounts
            .into_iter()
            .filter(|a| a.is_active && a.has_credentials())
            .collect();

        if accounts.is_empty() {
            return Err(Error::NoAccountsAvailable(
                "no active accounts with credentials in the store".into(),
            ));
        }

        if ignore_quota {
            return Ok(accounts);
        }

        let mut eligible: Vec<Account> = accounts
            .iter()
            .filter(|a| a.under_quota())
            .cloned()
            .collect();

        if eligible.is_empty() {
            info!(
                accounts = accounts.len(),
                "every account saturated, rolling over pool usage counters"
            );
            metrics::counter!("pool_quota_resets_total").increment(1);

            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.reset_usage().await {
                    warn!(error = %e, "pool-wide usage reset failed");
                }
            });

            eligible = accounts
                .into_iter()
                .map(|mut a| {
                    a.usage_count = 0;
                    a
                })
                .collect();
        }

        eligible.shuffle(&mut rand::rng());
        Ok(eligible)
    }
}
