//! Account pool and failover execution engine
//!
//! Routes each generation request across a pool of provider accounts so that
//! a rate-limited, revoked, or temporarily broken account never surfaces to
//! the caller while any other account can still serve. The account store is
//! the single source of truth; the pool reads a fresh candidate list per
//! dispatch and keeps no cross-request state.
//!
//! Dispatch lifecycle:
//! 1. `Selector::select` builds a quota-filtered, shuffled candidate ordering
//!    (or resets the whole pool when every account is saturated)
//! 2. `Executor::execute` drives one operation over the candidates in order,
//!    first success wins, retryable failures advance to the next account
//! 3. Quota-consuming kinds get a fire-and-forget usage increment before the
//!    attempt resolves (optimistic accounting, soft limit)
//! 4. Fatal upstream errors abort immediately so malformed requests are not
//!    replayed against the entire pool

pub mod error;
pub mod execute;
pub mod health;
pub mod kind;
pub mod select;
pub mod upstream;

pub use error::{Error, Result};
pub use execute::Executor;
pub use health::pool_summary;
pub use kind::OperationKind;
pub use select::Selector;
pub use upstream::{ErrorClass, UpstreamError};
