//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use maji_core::{
    AccountProfile, Alert, AlertId, CheckoutRequestId, ClientBalance, LiveRecord, MeterId,
    PaymentRequest, Settlement, Tariff, TelemetryLogEntry, ThresholdPolicy, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{apply_credit, CreditOutcome, SettleOutcome, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Held for the whole read-modify-write of compound operations.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_value<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Walk a meter's keys in a column family, newest first.
    ///
    /// The visitor returns `false` to stop early.
    fn scan_meter_reverse<F>(&self, cf_name: &str, meter_id: &MeterId, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        let cf = self.cf(cf_name)?;
        let prefix = keys::meter_prefix(meter_id);
        let end = keys::meter_prefix_end(meter_id);

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&end, Direction::Reverse));

        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                if &key[..] < prefix.as_slice() {
                    break;
                }
                continue;
            }
            if !visit(&key[..], &value[..])? {
                break;
            }
        }
        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Payment Operations
    // =========================================================================

    fn insert_payment(&self, payment: &PaymentRequest) -> Result<()> {
        let _guard = self.lock()?;
        if self.get_payment(&payment.checkout_request_id)?.is_some() {
            return Err(StoreError::duplicate(
                "payment",
                &payment.checkout_request_id,
            ));
        }

        let cf_payments = self.cf(cf::PAYMENTS)?;
        let cf_by_meter = self.cf(cf::PAYMENTS_BY_METER)?;

        let payment_key = keys::payment_key(&payment.checkout_request_id);
        let meter_key = keys::meter_payment_key(
            &payment.meter_id,
            payment.created_at,
            &payment.checkout_request_id,
        );
        let value = Self::serialize(payment)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_payments, &payment_key, &value);
        batch.put_cf(&cf_by_meter, &meter_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_payment(
        &self,
        checkout_request_id: &CheckoutRequestId,
    ) -> Result<Option<PaymentRequest>> {
        self.get_value(cf::PAYMENTS, &keys::payment_key(checkout_request_id))
    }

    fn list_payments_by_meter(
        &self,
        meter_id: &MeterId,
        limit: usize,
    ) -> Result<Vec<PaymentRequest>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        self.scan_meter_reverse(cf::PAYMENTS_BY_METER, meter_id, |key, _| {
            if let Some(id) = keys::extract_checkout_id_from_meter_key(key, meter_id) {
                ids.push(id);
            }
            Ok(ids.len() < limit)
        })?;

        let mut payments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(payment) = self.get_payment(&id)? {
                payments.push(payment);
            }
        }
        Ok(payments)
    }

    fn settle_payment(
        &self,
        checkout_request_id: &CheckoutRequestId,
        settlement: Settlement,
    ) -> Result<SettleOutcome> {
        let _guard = self.lock()?;
        let Some(mut payment) = self.get_payment(checkout_request_id)? else {
            return Ok(SettleOutcome::NotFound);
        };
        if !payment.settle(settlement, Utc::now()) {
            return Ok(SettleOutcome::AlreadySettled(payment));
        }

        self.put_value(
            cf::PAYMENTS,
            &keys::payment_key(checkout_request_id),
            &payment,
        )?;
        Ok(SettleOutcome::Settled(payment))
    }

    // =========================================================================
    // Balance Operations
    // =========================================================================

    fn get_balance(&self, meter_id: &MeterId) -> Result<Option<ClientBalance>> {
        self.get_value(cf::BALANCES, &keys::balance_key(meter_id))
    }

    fn credit_top_up(
        &self,
        checkout_request_id: &CheckoutRequestId,
        tariff: &Tariff,
    ) -> Result<CreditOutcome> {
        let _guard = self.lock()?;
        let payment = self
            .get_payment(checkout_request_id)?
            .ok_or_else(|| StoreError::not_found("payment", checkout_request_id))?;
        let existing = self.get_balance(&payment.meter_id)?;

        let outcome = apply_credit(payment, existing, tariff, Utc::now());
        if let CreditOutcome::Credited {
            payment, balance, ..
        } = &outcome
        {
            let cf_payments = self.cf(cf::PAYMENTS)?;
            let cf_balances = self.cf(cf::BALANCES)?;

            let payment_value = Self::serialize(payment)?;
            let balance_value = Self::serialize(balance)?;

            // Write atomically
            let mut batch = WriteBatch::default();
            batch.put_cf(
                &cf_payments,
                keys::payment_key(&payment.checkout_request_id),
                &payment_value,
            );
            batch.put_cf(
                &cf_balances,
                keys::balance_key(&balance.meter_id),
                &balance_value,
            );

            self.db
                .write(batch)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Ok(outcome)
    }

    fn debit_consumption(
        &self,
        meter_id: &MeterId,
        quantity: f64,
        policy: &ThresholdPolicy,
    ) -> Result<ClientBalance> {
        let _guard = self.lock()?;
        let mut balance = self
            .get_balance(meter_id)?
            .ok_or_else(|| StoreError::not_found("balance", meter_id))?;

        balance.apply_debit(quantity, policy, Utc::now());
        self.put_value(cf::BALANCES, &keys::balance_key(meter_id), &balance)?;
        Ok(balance)
    }

    // =========================================================================
    // Alert Operations
    // =========================================================================

    fn put_alert(&self, alert: &Alert) -> Result<()> {
        let cf_alerts = self.cf(cf::ALERTS)?;
        let cf_by_meter = self.cf(cf::ALERTS_BY_METER)?;
        let value = Self::serialize(alert)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_alerts, keys::alert_key(&alert.id), &value);
        batch.put_cf(
            &cf_by_meter,
            keys::meter_alert_key(&alert.meter_id, &alert.id),
            [],
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_alert(&self, alert_id: &AlertId) -> Result<Option<Alert>> {
        self.get_value(cf::ALERTS, &keys::alert_key(alert_id))
    }

    fn resolve_alert(&self, alert_id: &AlertId) -> Result<Alert> {
        let _guard = self.lock()?;
        let mut alert = self
            .get_alert(alert_id)?
            .ok_or_else(|| StoreError::not_found("alert", alert_id))?;

        if !alert.resolved {
            alert.resolve(Utc::now());
            self.put_value(cf::ALERTS, &keys::alert_key(alert_id), &alert)?;
        }
        Ok(alert)
    }

    fn list_alerts_by_meter(
        &self,
        meter_id: &MeterId,
        unresolved_only: bool,
        limit: usize,
    ) -> Result<Vec<Alert>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut alerts = Vec::new();
        self.scan_meter_reverse(cf::ALERTS_BY_METER, meter_id, |key, _| {
            let Some(id) = keys::extract_alert_id_from_meter_key(key) else {
                return Ok(true);
            };
            if let Some(alert) = self.get_alert(&id)? {
                if !unresolved_only || !alert.resolved {
                    alerts.push(alert);
                }
            }
            Ok(alerts.len() < limit)
        })?;
        Ok(alerts)
    }

    // =========================================================================
    // Telemetry Operations
    // =========================================================================

    fn put_profile(&self, profile: &AccountProfile) -> Result<()> {
        self.put_value(cf::PROFILES, &keys::user_key(&profile.user_id), profile)
    }

    fn get_profile(&self, user_id: &UserId) -> Result<Option<AccountProfile>> {
        self.get_value(cf::PROFILES, &keys::user_key(user_id))
    }

    fn put_live_record(&self, record: &LiveRecord) -> Result<()> {
        self.put_value(cf::LIVE_RECORDS, &keys::user_key(&record.user_id), record)
    }

    fn get_live_record(&self, user_id: &UserId) -> Result<Option<LiveRecord>> {
        self.get_value(cf::LIVE_RECORDS, &keys::user_key(user_id))
    }

    fn delete_live_record(&self, user_id: &UserId) -> Result<bool> {
        let _guard = self.lock()?;
        let existed = self.get_live_record(user_id)?.is_some();
        if existed {
            let cf = self.cf(cf::LIVE_RECORDS)?;
            self.db
                .delete_cf(&cf, keys::user_key(user_id))
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Ok(existed)
    }

    fn append_telemetry(&self, entry: &TelemetryLogEntry) -> Result<()> {
        self.put_value(
            cf::TELEMETRY_LOGS,
            &keys::telemetry_key(&entry.meter_id, &entry.id),
            entry,
        )
    }

    fn list_telemetry(&self, meter_id: &MeterId, limit: usize) -> Result<Vec<TelemetryLogEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        self.scan_meter_reverse(cf::TELEMETRY_LOGS, meter_id, |_, value| {
            entries.push(Self::deserialize(value)?);
            Ok(entries.len() < limit)
        })?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maji_core::{AlertKind, BalanceStatus, PaymentStatus};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn meter(id: &str) -> MeterId {
        MeterId::new(id).unwrap()
    }

    fn pending(id: &str, meter_id: &str, amount: f64) -> PaymentRequest {
        PaymentRequest::pending(
            CheckoutRequestId::new(id).unwrap(),
            format!("mr-{id}"),
            None,
            "254712345678".into(),
            amount,
            meter(meter_id),
        )
    }

    fn settlement(result_code: i64) -> Settlement {
        Settlement {
            result_code,
            result_desc: "done".into(),
            receipt_number: None,
            confirmed_amount: None,
            payer_phone: None,
            transaction_date: None,
            raw: serde_json::json!({ "ResultCode": result_code }),
        }
    }

    #[test]
    fn payment_settles_once_and_persists_audit() {
        let (store, _dir) = create_test_store();
        store.insert_payment(&pending("ws_CO_1", "MTR1", 100.0)).unwrap();
        let id = CheckoutRequestId::new("ws_CO_1").unwrap();

        let first = store.settle_payment(&id, settlement(0)).unwrap();
        assert!(matches!(first, SettleOutcome::Settled(_)));

        let second = store.settle_payment(&id, settlement(1032)).unwrap();
        let SettleOutcome::AlreadySettled(payment) = second else {
            panic!("expected already settled");
        };
        assert_eq!(payment.status, PaymentStatus::Success);

        let stored = store.get_payment(&id).unwrap().unwrap();
        assert_eq!(stored.settlement.unwrap().raw["ResultCode"], 0);
    }

    #[test]
    fn credit_and_debit_roundtrip_through_disk() {
        let (store, _dir) = create_test_store();
        store.insert_payment(&pending("ws_CO_1", "MTR1", 100.0)).unwrap();
        let id = CheckoutRequestId::new("ws_CO_1").unwrap();
        store.settle_payment(&id, settlement(0)).unwrap();

        let outcome = store.credit_top_up(&id, &Tariff::default()).unwrap();
        assert!(matches!(outcome, CreditOutcome::Credited { .. }));
        let again = store.credit_top_up(&id, &Tariff::default()).unwrap();
        assert!(matches!(again, CreditOutcome::AlreadyProcessed(_)));

        let balance = store
            .debit_consumption(&meter("MTR1"), 95.0, &ThresholdPolicy::default())
            .unwrap();
        assert_eq!(balance.remaining_quantity, 5.0);
        assert_eq!(balance.status, BalanceStatus::Warning);
        assert!(store.get_payment(&id).unwrap().unwrap().processed);
    }

    #[test]
    fn payments_by_meter_are_isolated_and_newest_first() {
        let (store, _dir) = create_test_store();
        let mut older = pending("ws_CO_a", "MTR1", 10.0);
        older.created_at -= chrono::Duration::minutes(5);
        store.insert_payment(&older).unwrap();
        store.insert_payment(&pending("ws_CO_b", "MTR1", 20.0)).unwrap();
        store.insert_payment(&pending("ws_CO_c", "MTR10", 30.0)).unwrap();

        let listed = store.list_payments_by_meter(&meter("MTR1"), 10).unwrap();
        let ids: Vec<_> = listed
            .iter()
            .map(|p| p.checkout_request_id.as_str())
            .collect();
        assert_eq!(ids, vec!["ws_CO_b", "ws_CO_a"]);

        assert_eq!(store.list_payments_by_meter(&meter("MTR1"), 1).unwrap().len(), 1);
        assert_eq!(store.list_payments_by_meter(&meter("MTR10"), 10).unwrap().len(), 1);
    }

    #[test]
    fn alerts_resolve_and_filter() {
        let (store, _dir) = create_test_store();
        let alert = Alert::new(meter("MTR1"), AlertKind::LowBalance, 4.0);
        store.put_alert(&alert).unwrap();

        assert_eq!(store.list_alerts_by_meter(&meter("MTR1"), true, 10).unwrap().len(), 1);
        store.resolve_alert(&alert.id).unwrap();
        assert!(store.list_alerts_by_meter(&meter("MTR1"), true, 10).unwrap().is_empty());
        assert_eq!(store.list_alerts_by_meter(&meter("MTR1"), false, 10).unwrap().len(), 1);
    }

    #[test]
    fn telemetry_log_lists_per_meter() {
        let (store, _dir) = create_test_store();
        let user = UserId::new("user-1").unwrap();
        for reading in 0..3 {
            let fields = serde_json::json!({ "reading": reading })
                .as_object()
                .cloned()
                .unwrap();
            store
                .append_telemetry(&TelemetryLogEntry::new(meter("MTR1"), user.clone(), fields))
                .unwrap();
        }

        assert_eq!(store.list_telemetry(&meter("MTR1"), 10).unwrap().len(), 3);
        assert_eq!(store.list_telemetry(&meter("MTR1"), 2).unwrap().len(), 2);
        assert!(store.list_telemetry(&meter("MTR2"), 10).unwrap().is_empty());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            store
                .put_profile(&AccountProfile::new(
                    UserId::new("user-1").unwrap(),
                    Some(meter("MTR1")),
                    None,
                ))
                .unwrap();
        }
        let store = RocksStore::open(dir.path()).unwrap();
        let profile = store
            .get_profile(&UserId::new("user-1").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(profile.meter_id, Some(meter("MTR1")));
    }
}
