//! Infrastructure implementations for the LeadPilot engine.
//!
//! SQLite-backed persistence (runs, flow state, credentials), the HTTP-level
//! browser driver, and the configuration loader. Everything here implements
//! seams defined in `leadpilot-core`.

pub mod browser;
pub mod config;
pub mod sqlite;
