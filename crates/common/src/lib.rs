//! Shared types for the media generation gateway

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
