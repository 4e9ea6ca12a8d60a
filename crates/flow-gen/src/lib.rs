//! Upstream generation adapters and job resolution
//!
//! Everything between the account pool and the upstream generation APIs:
//! the `FlowClient` adapters (upload, generate, upscale, status fetch), the
//! model routing decision table, status normalization into `JobStatus`, and
//! the `Dispatcher` that drives one failover execution per caller request.
//!
//! A generation is asynchronous end to end: `Dispatcher::create_generation`
//! returns a pinned `OperationHandle`, and the caller polls
//! `Dispatcher::check_status` with it until a terminal `JobStatus` arrives.

pub mod client;
pub mod dispatch;
pub mod routing;
pub mod status;
pub mod types;

pub use client::FlowClient;
pub use dispatch::Dispatcher;
pub use types::{AspectRatio, GenerationInput, JobStatus, OperationHandle};
