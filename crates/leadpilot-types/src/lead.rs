//! Lead domain types.
//!
//! A lead is the prospective customer's data consumed by a product workflow.
//! The engine only ever sees a denormalized snapshot frozen at enqueue time;
//! it never reaches back into the lead database mid-run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A denormalized lead snapshot, immutable once enqueued.
///
/// Field names mirror what the target platform forms consume. Anything a
/// specific platform needs beyond the common fields travels in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// UUIDv7 assigned at ingestion.
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    /// Platform-specific fields not covered by the common schema.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl Lead {
    /// Full display name ("First Last").
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_roundtrips_through_json() {
        let lead = Lead {
            id: Uuid::now_v7(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: None,
            date_of_birth: Some("1815-12-10".to_string()),
            postal_code: Some("10115".to_string()),
            city: None,
            street: None,
            extra: HashMap::new(),
            captured_at: Utc::now(),
        };

        let json = serde_json::to_string(&lead).unwrap();
        let back: Lead = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, lead.id);
        assert_eq!(back.full_name(), "Ada Lovelace");
        // absent optionals are omitted from the wire form
        assert!(!json.contains("phone"));
    }
}
