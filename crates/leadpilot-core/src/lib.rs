//! Execution engine core: queue draining, session pooling, and the pluggable
//! product contracts.
//!
//! This crate contains the "engine room" of leadpilot:
//! - `retry` -- one canonical backoff policy and a generic retry wrapper
//! - `session` -- browser driver seam and the per-worker session pool
//! - `registry` -- explicit product registry (workflow key -> product factory)
//! - `product` / `step` / `transform` -- the pluggable unit contracts
//! - `context` -- per-execution context handed to products
//! - `artifact` -- per-item result/error/screenshot capture
//! - `store` -- repository traits for runs, credentials, and flow state
//! - `executor` -- the per-item lifecycle with the no-error-escapes backstop
//! - `queue` -- bounded-concurrency worker pool and queue manager

pub mod artifact;
pub mod context;
pub mod executor;
pub mod product;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod session;
pub mod step;
pub mod store;
pub mod transform;
