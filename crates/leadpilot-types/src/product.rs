//! Product metadata types.

use serde::{Deserialize, Serialize};

/// Static metadata describing a registered product (one platform x one
/// offering). Returned by the registry without instantiating the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMetadata {
    /// Registry key (e.g. "acme/home").
    pub key: String,
    /// Human-readable name.
    pub name: String,
    /// Target platform identifier, used to resolve credentials.
    pub platform: String,
    /// Product implementation version.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
