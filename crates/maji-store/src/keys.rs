//! Key encoding utilities for `RocksDB`.
//!
//! String ids never contain control characters, so `0x00` is a safe separator between a meter
//! id and the suffix of an index key. ULID and timestamp suffixes are big-endian, so keys under
//! one meter prefix sort by creation time.

use chrono::{DateTime, Utc};

use maji_core::{AlertId, CheckoutRequestId, LogEntryId, MeterId, UserId};

const SEPARATOR: u8 = 0x00;

/// Create a prefix for iterating all index entries of a meter.
#[must_use]
pub fn meter_prefix(meter_id: &MeterId) -> Vec<u8> {
    let mut key = Vec::with_capacity(meter_id.as_str().len() + 1);
    key.extend_from_slice(meter_id.as_ref());
    key.push(SEPARATOR);
    key
}

/// First key after every entry of a meter's prefix, for reverse iteration.
#[must_use]
pub fn meter_prefix_end(meter_id: &MeterId) -> Vec<u8> {
    let mut key = meter_prefix(meter_id);
    if let Some(last) = key.last_mut() {
        *last = SEPARATOR + 1;
    }
    key
}

/// Create a payment key from a checkout request ID.
#[must_use]
pub fn payment_key(checkout_request_id: &CheckoutRequestId) -> Vec<u8> {
    checkout_request_id.as_ref().to_vec()
}

/// Create a meter-payment index key.
///
/// Format: `meter_id || 0x00 || created_at_ms (8 bytes) || checkout_request_id`
#[must_use]
pub fn meter_payment_key(
    meter_id: &MeterId,
    created_at: DateTime<Utc>,
    checkout_request_id: &CheckoutRequestId,
) -> Vec<u8> {
    let millis = u64::try_from(created_at.timestamp_millis()).unwrap_or(0);
    let mut key = meter_prefix(meter_id);
    key.extend_from_slice(&millis.to_be_bytes());
    key.extend_from_slice(checkout_request_id.as_ref());
    key
}

/// Extract the checkout request ID from a meter-payment index key.
#[must_use]
pub fn extract_checkout_id_from_meter_key(
    key: &[u8],
    meter_id: &MeterId,
) -> Option<CheckoutRequestId> {
    let start = meter_prefix(meter_id).len() + 8;
    let raw = key.get(start..)?;
    CheckoutRequestId::new(std::str::from_utf8(raw).ok()?).ok()
}

/// Create a balance key from a meter ID.
#[must_use]
pub fn balance_key(meter_id: &MeterId) -> Vec<u8> {
    meter_id.as_ref().to_vec()
}

/// Create an alert key from an alert ID.
#[must_use]
pub fn alert_key(alert_id: &AlertId) -> Vec<u8> {
    alert_id.to_bytes().to_vec()
}

/// Create a meter-alert index key.
///
/// Format: `meter_id || 0x00 || alert_id (16 bytes)`
#[must_use]
pub fn meter_alert_key(meter_id: &MeterId, alert_id: &AlertId) -> Vec<u8> {
    let mut key = meter_prefix(meter_id);
    key.extend_from_slice(&alert_id.to_bytes());
    key
}

/// Extract the alert ID from the trailing 16 bytes of a meter-alert index key.
#[must_use]
pub fn extract_alert_id_from_meter_key(key: &[u8]) -> Option<AlertId> {
    let start = key.len().checked_sub(16)?;
    let bytes: [u8; 16] = key.get(start..)?.try_into().ok()?;
    Some(AlertId::from_bytes(bytes))
}

/// Create a profile or live-record key from a user ID.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_ref().to_vec()
}

/// Create a telemetry log key.
///
/// Format: `meter_id || 0x00 || entry_id (16 bytes)`
#[must_use]
pub fn telemetry_key(meter_id: &MeterId, entry_id: &LogEntryId) -> Vec<u8> {
    let mut key = meter_prefix(meter_id);
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meter(id: &str) -> MeterId {
        MeterId::new(id).unwrap()
    }

    #[test]
    fn prefix_does_not_match_longer_meter_ids() {
        let short = meter_prefix(&meter("MTR1"));
        let key = meter_alert_key(&meter("MTR10"), &AlertId::generate());
        assert!(!key.starts_with(&short));
    }

    #[test]
    fn prefix_end_sorts_after_every_entry() {
        let m = meter("MTR1");
        let end = meter_prefix_end(&m);
        let key = meter_alert_key(&m, &AlertId::from_bytes([0xff; 16]));
        assert!(key.as_slice() < end.as_slice());
        assert!(!end.starts_with(&meter_prefix(&m)));
    }

    #[test]
    fn payment_index_orders_by_time() {
        let m = meter("MTR1");
        let id = CheckoutRequestId::new("ws_CO_1").unwrap();
        let earlier = meter_payment_key(&m, Utc::now() - chrono::Duration::minutes(5), &id);
        let later = meter_payment_key(&m, Utc::now(), &id);
        assert!(earlier < later);
    }

    #[test]
    fn extracts_checkout_id() {
        let m = meter("MTR1");
        let id = CheckoutRequestId::new("ws_CO_191220191020363925").unwrap();
        let key = meter_payment_key(&m, Utc::now(), &id);
        assert_eq!(extract_checkout_id_from_meter_key(&key, &m), Some(id));
    }

    #[test]
    fn extracts_alert_id() {
        let m = meter("MTR1");
        let id = AlertId::generate();
        let key = meter_alert_key(&m, &id);
        assert_eq!(extract_alert_id_from_meter_key(&key), Some(id));
        assert_eq!(extract_alert_id_from_meter_key(&[1, 2, 3]), None);
    }
}
