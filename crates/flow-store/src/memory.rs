//! In-memory account store
//!
//! Mirrors the REST store's observable behavior for tests and local
//! development: recency ordering, activity/credential filtering, usage
//! patching, and pool-wide reset. A tokio Mutex serializes writers; reads
//! clone the current state so callers never hold the lock across awaits.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::debug;

use crate::account::Account;
use crate::error::{Error, Result};
use crate::store::AccountStore;

/// Account store held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<Vec<Account>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a set of accounts (insertion order preserved).
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
        }
    }

    /// Add or replace an account by id.
    pub async fn upsert(&self, account: Account) {
        let mut accounts = self.accounts.lock().await;
        if let Some(existing) = accounts.iter_mut().find(|a| a.id == account.id) {
            *existing = account;
        } else {
            accounts.push(account);
        }
    }

    /// Snapshot one account by id.
    pub async fn get(&self, account_id: &str) -> Option<Account> {
        let accounts = self.accounts.lock().await;
        accounts.iter().find(|a| a.id == account_id).cloned()
    }

    /// Current usage counter for an account (test observability).
    pub async fn usage_of(&self, account_id: &str) -> Option<u32> {
        self.get(account_id).await.map(|a| a.usage_count)
    }
}

impl AccountStore for MemoryStore {
    fn list_active(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Account>>> + Send + '_>> {
        Box::pin(async move {
            let accounts = self.accounts.lock().await;
            let mut active: Vec<Account> = accounts
                .iter()
                .filter(|a| a.is_active && a.has_credentials())
                .cloned()
                .collect();
            // Stable sort keeps insertion order among equal timestamps;
            // accounts without a timestamp sort last.
            active.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(active)
        })
    }

    fn set_usage<'a>(
        &'a self,
        account_id: &'a str,
        usage_count: u32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut accounts = self.accounts.lock().await;
            let account = accounts
                .iter_mut()
                .find(|a| a.id == account_id)
                .ok_or_else(|| Error::NotFound(account_id.to_string()))?;
            account.usage_count = usage_count;
            debug!(account_id, usage_count, "patched usage counter");
            Ok(())
        })
    }

    fn reset_usage(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut accounts = self.accounts.lock().await;
            for account in accounts.iter_mut().filter(|a| a.is_active) {
                account.usage_count = 0;
            }
            debug!("reset usage counters for all active accounts");
            Ok(())
        })
    }
}
