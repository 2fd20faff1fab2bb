//! Telemetry types for maji-billing.
//!
//! Meters push live readings into a record keyed by the owning user. Every change to that
//! record is mirrored into an append-only log under the user's meter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LogEntryId, MeterId, UserId};

/// Raw telemetry fields as reported by a device.
pub type TelemetryFields = serde_json::Map<String, serde_json::Value>;

/// Links an app user to their meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    /// The app user.
    pub user_id: UserId,

    /// The user's meter, once registered.
    pub meter_id: Option<MeterId>,

    /// Contact phone, normalized.
    pub phone: Option<String>,

    /// When the profile last changed.
    pub updated_at: DateTime<Utc>,
}

impl AccountProfile {
    /// Create a profile.
    #[must_use]
    pub fn new(user_id: UserId, meter_id: Option<MeterId>, phone: Option<String>) -> Self {
        Self {
            user_id,
            meter_id,
            phone,
            updated_at: Utc::now(),
        }
    }
}

/// The latest live reading for a user's device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRecord {
    /// The user the device belongs to.
    pub user_id: UserId,

    /// Raw fields from the device.
    pub fields: TelemetryFields,

    /// When the record was written.
    pub updated_at: DateTime<Utc>,
}

/// One mirrored telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryLogEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: LogEntryId,

    /// The meter the reading belongs to.
    pub meter_id: MeterId,

    /// The user whose live record changed.
    pub user_id: UserId,

    /// Raw fields from the device.
    pub fields: TelemetryFields,

    /// When the entry was mirrored.
    pub synced_at: DateTime<Utc>,
}

impl TelemetryLogEntry {
    /// Create a log entry stamped now.
    #[must_use]
    pub fn new(meter_id: MeterId, user_id: UserId, fields: TelemetryFields) -> Self {
        Self {
            id: LogEntryId::generate(),
            meter_id,
            user_id,
            fields,
            synced_at: Utc::now(),
        }
    }

    /// Flatten into a single JSON object: the raw fields plus `meterId`, `userId` and
    /// `syncedAt`. Device fields with the same names are overwritten.
    #[must_use]
    pub fn to_flat_json(&self) -> serde_json::Value {
        let mut map = self.fields.clone();
        map.insert("id".into(), self.id.to_string().into());
        map.insert("meterId".into(), self.meter_id.as_str().into());
        map.insert("userId".into(), self.user_id.as_str().into());
        map.insert("syncedAt".into(), self.synced_at.to_rfc3339().into());
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_json_keeps_device_fields() {
        let fields = json!({ "flowRate": 2.5, "valveOpen": true })
            .as_object()
            .cloned()
            .unwrap();
        let entry = TelemetryLogEntry::new(
            MeterId::new("MTR1").unwrap(),
            UserId::new("user-1").unwrap(),
            fields,
        );

        let flat = entry.to_flat_json();
        assert_eq!(flat["flowRate"], 2.5);
        assert_eq!(flat["valveOpen"], true);
        assert_eq!(flat["meterId"], "MTR1");
        assert_eq!(flat["userId"], "user-1");
        assert!(flat["syncedAt"].is_string());
    }

    #[test]
    fn server_fields_override_device_fields() {
        let fields = json!({ "meterId": "spoofed" }).as_object().cloned().unwrap();
        let entry = TelemetryLogEntry::new(
            MeterId::new("MTR1").unwrap(),
            UserId::new("user-1").unwrap(),
            fields,
        );
        assert_eq!(entry.to_flat_json()["meterId"], "MTR1");
    }
}
