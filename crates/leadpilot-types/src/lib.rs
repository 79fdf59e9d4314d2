//! Shared domain types for leadpilot.
//!
//! This crate contains the core domain types used across the leadpilot
//! platform: Lead, QueueItem, Run/RunItem, ExecutionResult, credentials, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! secrecy.

pub mod config;
pub mod credentials;
pub mod error;
pub mod form;
pub mod lead;
pub mod product;
pub mod queue;
pub mod result;
pub mod run;
