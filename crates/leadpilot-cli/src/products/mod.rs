//! Built-in products shipped with the CLI.
//!
//! Deployments register their own platform products here (or through a
//! wrapper binary); the stock build ships one reference product against the
//! Acme Insure demo portal.

pub mod acme;

use leadpilot_core::registry::ProductRegistry;

/// Register every built-in product.
pub fn register_builtin(registry: &ProductRegistry) {
    registry.register(acme::AcmeLiability::new);
}
