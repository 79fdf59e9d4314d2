//! Observability setup for LeadPilot.

pub mod tracing_setup;
