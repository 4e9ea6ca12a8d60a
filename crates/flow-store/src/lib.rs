//! Account store boundary for provider accounts
//!
//! The backing data store is an external service reached over HTTP; it is the
//! single source of truth for provider accounts (credentials plus quota
//! counters). This crate defines the `Account` model, the narrow read/patch
//! `AccountStore` interface the pool consumes, and two implementations:
//! `RestStore` for the real network store and `MemoryStore` for tests and
//! local development.
//!
//! Account lifecycle:
//! 1. An administrative process creates/edits accounts in the backing store
//! 2. Each dispatch performs a fresh `list_active` read (no in-process cache)
//! 3. The failover executor patches `usageCount` after quota-consuming calls
//! 4. The selector bulk-resets all counters when the whole pool is exhausted

pub mod account;
pub mod error;
pub mod memory;
pub mod rest;
pub mod store;

pub use account::Account;
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use rest::RestStore;
pub use store::AccountStore;
