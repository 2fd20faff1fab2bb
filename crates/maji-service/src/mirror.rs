//! Telemetry mirror.
//!
//! Every change to a user's live record is copied into the append-only log of the user's meter.
//! The mirror never fails its trigger: unresolvable users are logged and skipped.

use std::sync::Arc;

use maji_core::{TelemetryFields, TelemetryLogEntry, UserId};
use maji_store::{Store, StoreError};

/// Mirrors live telemetry into per-meter logs.
#[derive(Clone)]
pub struct TelemetryMirror {
    store: Arc<dyn Store>,
}

impl TelemetryMirror {
    /// Create a mirror over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// React to a live-record change. `None` or an empty payload is a deletion and does nothing.
    ///
    /// Returns the appended entry, if any.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails while reading the profile or appending.
    pub fn on_live_change(
        &self,
        user_id: &UserId,
        fields: Option<&TelemetryFields>,
    ) -> Result<Option<TelemetryLogEntry>, StoreError> {
        let Some(fields) = fields.filter(|f| !f.is_empty()) else {
            tracing::debug!(user_id = %user_id, "Live record removed, nothing to mirror");
            return Ok(None);
        };

        let Some(meter_id) = self
            .store
            .get_profile(user_id)?
            .and_then(|profile| profile.meter_id)
        else {
            tracing::warn!(user_id = %user_id, "No meter registered for user, skipping mirror");
            return Ok(None);
        };

        let entry = TelemetryLogEntry::new(meter_id, user_id.clone(), fields.clone());
        self.store.append_telemetry(&entry)?;

        tracing::debug!(
            user_id = %user_id,
            meter_id = %entry.meter_id,
            entry_id = %entry.id,
            fields = entry.fields.len(),
            "Telemetry mirrored"
        );
        Ok(Some(entry))
    }
}
