//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Payment requests, keyed by `checkout_request_id`.
    pub const PAYMENTS: &str = "payments";

    /// Index: payments by meter, keyed by `meter_id || 0x00 || created_at_ms || checkout_id`.
    /// Value is empty (index only).
    pub const PAYMENTS_BY_METER: &str = "payments_by_meter";

    /// Meter balances, keyed by `meter_id`.
    pub const BALANCES: &str = "balances";

    /// Alerts, keyed by `alert_id` (ULID).
    pub const ALERTS: &str = "alerts";

    /// Index: alerts by meter, keyed by `meter_id || 0x00 || alert_id`.
    /// Value is empty (index only).
    pub const ALERTS_BY_METER: &str = "alerts_by_meter";

    /// Account profiles, keyed by `user_id`.
    pub const PROFILES: &str = "profiles";

    /// Live telemetry records, keyed by `user_id`.
    pub const LIVE_RECORDS: &str = "live_records";

    /// Mirrored telemetry, keyed by `meter_id || 0x00 || entry_id`.
    pub const TELEMETRY_LOGS: &str = "telemetry_logs";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::PAYMENTS,
        cf::PAYMENTS_BY_METER,
        cf::BALANCES,
        cf::ALERTS,
        cf::ALERTS_BY_METER,
        cf::PROFILES,
        cf::LIVE_RECORDS,
        cf::TELEMETRY_LOGS,
    ]
}
