//! In-memory storage implementation.
//!
//! All tables live behind one mutex, so every trait method is a single critical section.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use maji_core::{
    AccountProfile, Alert, AlertId, CheckoutRequestId, ClientBalance, LiveRecord, LogEntryId,
    MeterId, PaymentRequest, Settlement, Tariff, TelemetryLogEntry, ThresholdPolicy, UserId,
};

use crate::error::{Result, StoreError};
use crate::{apply_credit, CreditOutcome, SettleOutcome, Store};

#[derive(Default)]
struct Tables {
    payments: HashMap<CheckoutRequestId, PaymentRequest>,
    balances: HashMap<MeterId, ClientBalance>,
    alerts: BTreeMap<AlertId, Alert>,
    profiles: HashMap<UserId, AccountProfile>,
    live_records: HashMap<UserId, LiveRecord>,
    telemetry: HashMap<MeterId, BTreeMap<LogEntryId, TelemetryLogEntry>>,
}

/// Mutex-guarded in-memory storage.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    // =========================================================================
    // Payment Operations
    // =========================================================================

    fn insert_payment(&self, payment: &PaymentRequest) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.payments.contains_key(&payment.checkout_request_id) {
            return Err(StoreError::duplicate(
                "payment",
                &payment.checkout_request_id,
            ));
        }
        tables
            .payments
            .insert(payment.checkout_request_id.clone(), payment.clone());
        Ok(())
    }

    fn get_payment(
        &self,
        checkout_request_id: &CheckoutRequestId,
    ) -> Result<Option<PaymentRequest>> {
        Ok(self.lock()?.payments.get(checkout_request_id).cloned())
    }

    fn list_payments_by_meter(
        &self,
        meter_id: &MeterId,
        limit: usize,
    ) -> Result<Vec<PaymentRequest>> {
        let tables = self.lock()?;
        let mut payments: Vec<_> = tables
            .payments
            .values()
            .filter(|p| &p.meter_id == meter_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.checkout_request_id.cmp(&a.checkout_request_id))
        });
        payments.truncate(limit);
        Ok(payments)
    }

    fn settle_payment(
        &self,
        checkout_request_id: &CheckoutRequestId,
        settlement: Settlement,
    ) -> Result<SettleOutcome> {
        let mut tables = self.lock()?;
        let Some(payment) = tables.payments.get_mut(checkout_request_id) else {
            return Ok(SettleOutcome::NotFound);
        };
        if payment.settle(settlement, Utc::now()) {
            Ok(SettleOutcome::Settled(payment.clone()))
        } else {
            Ok(SettleOutcome::AlreadySettled(payment.clone()))
        }
    }

    // =========================================================================
    // Balance Operations
    // =========================================================================

    fn get_balance(&self, meter_id: &MeterId) -> Result<Option<ClientBalance>> {
        Ok(self.lock()?.balances.get(meter_id).cloned())
    }

    fn credit_top_up(
        &self,
        checkout_request_id: &CheckoutRequestId,
        tariff: &Tariff,
    ) -> Result<CreditOutcome> {
        let mut tables = self.lock()?;
        let payment = tables
            .payments
            .get(checkout_request_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("payment", checkout_request_id))?;
        let existing = tables.balances.get(&payment.meter_id).cloned();

        let outcome = apply_credit(payment, existing, tariff, Utc::now());
        if let CreditOutcome::Credited {
            payment, balance, ..
        } = &outcome
        {
            tables
                .payments
                .insert(payment.checkout_request_id.clone(), payment.clone());
            tables
                .balances
                .insert(balance.meter_id.clone(), balance.clone());
        }
        Ok(outcome)
    }

    fn debit_consumption(
        &self,
        meter_id: &MeterId,
        quantity: f64,
        policy: &ThresholdPolicy,
    ) -> Result<ClientBalance> {
        let mut tables = self.lock()?;
        let balance = tables
            .balances
            .get_mut(meter_id)
            .ok_or_else(|| StoreError::not_found("balance", meter_id))?;
        balance.apply_debit(quantity, policy, Utc::now());
        Ok(balance.clone())
    }

    // =========================================================================
    // Alert Operations
    // =========================================================================

    fn put_alert(&self, alert: &Alert) -> Result<()> {
        self.lock()?.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    fn get_alert(&self, alert_id: &AlertId) -> Result<Option<Alert>> {
        Ok(self.lock()?.alerts.get(alert_id).cloned())
    }

    fn resolve_alert(&self, alert_id: &AlertId) -> Result<Alert> {
        let mut tables = self.lock()?;
        let alert = tables
            .alerts
            .get_mut(alert_id)
            .ok_or_else(|| StoreError::not_found("alert", alert_id))?;
        alert.resolve(Utc::now());
        Ok(alert.clone())
    }

    fn list_alerts_by_meter(
        &self,
        meter_id: &MeterId,
        unresolved_only: bool,
        limit: usize,
    ) -> Result<Vec<Alert>> {
        let tables = self.lock()?;
        Ok(tables
            .alerts
            .values()
            .rev()
            .filter(|a| &a.meter_id == meter_id)
            .filter(|a| !unresolved_only || !a.resolved)
            .take(limit)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Telemetry Operations
    // =========================================================================

    fn put_profile(&self, profile: &AccountProfile) -> Result<()> {
        self.lock()?
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    fn get_profile(&self, user_id: &UserId) -> Result<Option<AccountProfile>> {
        Ok(self.lock()?.profiles.get(user_id).cloned())
    }

    fn put_live_record(&self, record: &LiveRecord) -> Result<()> {
        self.lock()?
            .live_records
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    fn get_live_record(&self, user_id: &UserId) -> Result<Option<LiveRecord>> {
        Ok(self.lock()?.live_records.get(user_id).cloned())
    }

    fn delete_live_record(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.lock()?.live_records.remove(user_id).is_some())
    }

    fn append_telemetry(&self, entry: &TelemetryLogEntry) -> Result<()> {
        self.lock()?
            .telemetry
            .entry(entry.meter_id.clone())
            .or_default()
            .insert(entry.id, entry.clone());
        Ok(())
    }

    fn list_telemetry(&self, meter_id: &MeterId, limit: usize) -> Result<Vec<TelemetryLogEntry>> {
        let tables = self.lock()?;
        Ok(tables
            .telemetry
            .get(meter_id)
            .map(|log| log.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use maji_core::{AlertKind, BalanceStatus, PaymentStatus};

    use super::*;

    fn meter() -> MeterId {
        MeterId::new("MTR1").unwrap()
    }

    fn pending(id: &str, amount: f64) -> PaymentRequest {
        PaymentRequest::pending(
            CheckoutRequestId::new(id).unwrap(),
            format!("mr-{id}"),
            Some(UserId::new("user-1").unwrap()),
            "254712345678".into(),
            amount,
            meter(),
        )
    }

    fn paid() -> Settlement {
        Settlement {
            result_code: 0,
            result_desc: "The service request is processed successfully.".into(),
            receipt_number: Some("NLJ7RT61SV".into()),
            confirmed_amount: None,
            payer_phone: None,
            transaction_date: None,
            raw: serde_json::Value::Null,
        }
    }

    fn settle_and_credit(store: &MemoryStore, id: &str, amount: f64) -> CreditOutcome {
        store.insert_payment(&pending(id, amount)).unwrap();
        let checkout = CheckoutRequestId::new(id).unwrap();
        store.settle_payment(&checkout, paid()).unwrap();
        store.credit_top_up(&checkout, &Tariff::default()).unwrap()
    }

    #[test]
    fn duplicate_payment_rejected() {
        let store = MemoryStore::new();
        store.insert_payment(&pending("ws_CO_1", 100.0)).unwrap();
        let err = store.insert_payment(&pending("ws_CO_1", 100.0)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[test]
    fn settle_unknown_payment() {
        let store = MemoryStore::new();
        let id = CheckoutRequestId::new("missing").unwrap();
        assert_eq!(
            store.settle_payment(&id, paid()).unwrap(),
            SettleOutcome::NotFound
        );
    }

    #[test]
    fn first_credit_opens_balance() {
        let store = MemoryStore::new();
        let outcome = settle_and_credit(&store, "ws_CO_1", 100.0);

        let CreditOutcome::Credited { balance, quantity, payment } = outcome else {
            panic!("expected credit");
        };
        assert_eq!(quantity, 100.0);
        assert_eq!(balance.remaining_quantity, 100.0);
        assert_eq!(balance.total_purchased, 100.0);
        assert_eq!(balance.status, BalanceStatus::Active);
        assert!(payment.processed);
        assert_eq!(payment.status, PaymentStatus::Success);

        let stored = store.get_balance(&meter()).unwrap().unwrap();
        assert_eq!(stored, balance);
    }

    #[test]
    fn credit_is_applied_once() {
        let store = MemoryStore::new();
        settle_and_credit(&store, "ws_CO_1", 100.0);
        let id = CheckoutRequestId::new("ws_CO_1").unwrap();

        let again = store.credit_top_up(&id, &Tariff::default()).unwrap();
        assert!(matches!(again, CreditOutcome::AlreadyProcessed(_)));
        assert_eq!(
            store.get_balance(&meter()).unwrap().unwrap().remaining_quantity,
            100.0
        );
    }

    #[test]
    fn pending_payment_is_not_creditable() {
        let store = MemoryStore::new();
        store.insert_payment(&pending("ws_CO_1", 100.0)).unwrap();
        let id = CheckoutRequestId::new("ws_CO_1").unwrap();
        let outcome = store.credit_top_up(&id, &Tariff::default()).unwrap();
        assert!(matches!(outcome, CreditOutcome::NotCreditable(_)));
        assert!(store.get_balance(&meter()).unwrap().is_none());
    }

    #[test]
    fn credit_unknown_payment_is_not_found() {
        let store = MemoryStore::new();
        let id = CheckoutRequestId::new("missing").unwrap();
        let err = store.credit_top_up(&id, &Tariff::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn debit_then_credit_keeps_accumulators() {
        let store = MemoryStore::new();
        settle_and_credit(&store, "ws_CO_1", 100.0);

        let balance = store
            .debit_consumption(&meter(), 95.0, &ThresholdPolicy::default())
            .unwrap();
        assert_eq!(balance.remaining_quantity, 5.0);
        assert_eq!(balance.status, BalanceStatus::Warning);

        settle_and_credit(&store, "ws_CO_2", 50.0);
        let balance = store.get_balance(&meter()).unwrap().unwrap();
        assert_eq!(balance.remaining_quantity, 55.0);
        assert_eq!(balance.total_purchased, 150.0);
        assert_eq!(balance.consumption_total, 95.0);
        assert_eq!(balance.status, BalanceStatus::Active);
    }

    #[test]
    fn concurrent_debits_lose_nothing() {
        let store = Arc::new(MemoryStore::new());
        settle_and_credit(&store, "ws_CO_1", 1000.0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .debit_consumption(&meter(), 1.0, &ThresholdPolicy::default())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let balance = store.get_balance(&meter()).unwrap().unwrap();
        assert_eq!(balance.remaining_quantity, 800.0);
        assert_eq!(balance.consumption_total, 200.0);
    }

    #[test]
    fn payments_listed_newest_first() {
        let store = MemoryStore::new();
        let mut older = pending("ws_CO_old", 10.0);
        older.created_at -= chrono::Duration::minutes(10);
        store.insert_payment(&older).unwrap();
        store.insert_payment(&pending("ws_CO_new", 20.0)).unwrap();

        let listed = store.list_payments_by_meter(&meter(), 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].checkout_request_id.as_str(), "ws_CO_new");
        assert_eq!(store.list_payments_by_meter(&meter(), 1).unwrap().len(), 1);
    }

    #[test]
    fn alerts_filter_and_resolve() {
        let store = MemoryStore::new();
        let first = Alert::new(meter(), AlertKind::LowBalance, 5.0);
        let second = Alert::new(meter(), AlertKind::WaterShutoff, 0.0);
        store.put_alert(&first).unwrap();
        store.put_alert(&second).unwrap();

        let resolved = store.resolve_alert(&first.id).unwrap();
        assert!(resolved.resolved);

        let unresolved = store.list_alerts_by_meter(&meter(), true, 10).unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].id, second.id);
        assert_eq!(store.list_alerts_by_meter(&meter(), false, 10).unwrap().len(), 2);

        let missing = store.resolve_alert(&AlertId::generate()).unwrap_err();
        assert!(matches!(missing, StoreError::NotFound { .. }));
    }

    #[test]
    fn live_record_lifecycle() {
        let store = MemoryStore::new();
        let user = UserId::new("user-1").unwrap();
        let record = LiveRecord {
            user_id: user.clone(),
            fields: serde_json::Map::new(),
            updated_at: Utc::now(),
        };
        store.put_live_record(&record).unwrap();
        assert!(store.get_live_record(&user).unwrap().is_some());
        assert!(store.delete_live_record(&user).unwrap());
        assert!(!store.delete_live_record(&user).unwrap());
    }
}
