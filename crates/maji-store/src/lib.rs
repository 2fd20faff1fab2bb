//! Storage layer for maji-billing.
//!
//! This crate provides persistent storage for payments, meter balances, alerts, account
//! profiles and mirrored telemetry.
//!
//! # Backends
//!
//! - [`MemoryStore`]: a mutex-guarded in-memory store, always available. Used by tests and
//!   by the service when built without `RocksDB`.
//! - `RocksStore`: `RocksDB` with column families, behind the `rocksdb-backend` feature.
//!
//! # Compound operations
//!
//! Settling a payment, crediting a top-up, debiting consumption and resolving an alert are
//! read-modify-write operations. Every backend runs each of them inside one critical section,
//! so concurrent writers to the same meter cannot lose updates.
//!
//! # Example
//!
//! ```
//! use maji_core::{MeterId, ThresholdPolicy};
//! use maji_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let meter = MeterId::new("MTR1").unwrap();
//! assert!(store.get_balance(&meter).unwrap().is_none());
//! assert!(store
//!     .debit_consumption(&meter, 5.0, &ThresholdPolicy::default())
//!     .is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use maji_core::{
    AccountProfile, Alert, AlertId, CheckoutRequestId, ClientBalance, LiveRecord, MeterId,
    PaymentRequest, Settlement, Tariff, TelemetryLogEntry, ThresholdPolicy, UserId,
};

/// Outcome of applying a provider result to a payment.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// The payment moved from `Pending` to a terminal status.
    Settled(PaymentRequest),

    /// The payment was already terminal; nothing changed.
    AlreadySettled(PaymentRequest),

    /// No payment with this checkout ID exists.
    NotFound,
}

/// Outcome of crediting a settled payment to its meter.
#[derive(Debug, Clone, PartialEq)]
pub enum CreditOutcome {
    /// The payment was marked processed and the balance credited.
    Credited {
        /// The payment after the credit.
        payment: PaymentRequest,
        /// The balance after the credit.
        balance: ClientBalance,
        /// Units credited.
        quantity: f64,
    },

    /// The payment had already been credited; nothing changed.
    AlreadyProcessed(PaymentRequest),

    /// The payment is pending or failed and cannot be credited.
    NotCreditable(PaymentRequest),
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Payment Operations
    // =========================================================================

    /// Insert a new payment request.
    ///
    /// This also maintains the meter index.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if a payment with the same checkout ID exists.
    fn insert_payment(&self, payment: &PaymentRequest) -> Result<()>;

    /// Get a payment by checkout request ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_payment(&self, checkout_request_id: &CheckoutRequestId)
        -> Result<Option<PaymentRequest>>;

    /// List payments for a meter, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_payments_by_meter(&self, meter_id: &MeterId, limit: usize)
        -> Result<Vec<PaymentRequest>>;

    /// Move a pending payment to its terminal status and store the settlement for audit.
    ///
    /// The status flip and the audit fields are written together. A payment that is already
    /// terminal is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn settle_payment(
        &self,
        checkout_request_id: &CheckoutRequestId,
        settlement: Settlement,
    ) -> Result<SettleOutcome>;

    // =========================================================================
    // Balance Operations
    // =========================================================================

    /// Get the balance of a meter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_balance(&self, meter_id: &MeterId) -> Result<Option<ClientBalance>>;

    /// Credit a successful payment to its meter exactly once.
    ///
    /// Marking the payment processed and crediting the balance happen atomically. The balance
    /// is created on the first credit for a meter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the payment doesn't exist.
    fn credit_top_up(
        &self,
        checkout_request_id: &CheckoutRequestId,
        tariff: &Tariff,
    ) -> Result<CreditOutcome>;

    /// Debit consumed units from a meter and classify the result.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the meter has no balance.
    fn debit_consumption(
        &self,
        meter_id: &MeterId,
        quantity: f64,
        policy: &ThresholdPolicy,
    ) -> Result<ClientBalance>;

    // =========================================================================
    // Alert Operations
    // =========================================================================

    /// Insert an alert.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_alert(&self, alert: &Alert) -> Result<()>;

    /// Get an alert by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_alert(&self, alert_id: &AlertId) -> Result<Option<Alert>>;

    /// Mark an alert resolved and return it. Resolving twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the alert doesn't exist.
    fn resolve_alert(&self, alert_id: &AlertId) -> Result<Alert>;

    /// List alerts for a meter, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_alerts_by_meter(
        &self,
        meter_id: &MeterId,
        unresolved_only: bool,
        limit: usize,
    ) -> Result<Vec<Alert>>;

    // =========================================================================
    // Telemetry Operations
    // =========================================================================

    /// Insert or replace an account profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_profile(&self, profile: &AccountProfile) -> Result<()>;

    /// Get an account profile by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_profile(&self, user_id: &UserId) -> Result<Option<AccountProfile>>;

    /// Insert or replace a user's live telemetry record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_live_record(&self, record: &LiveRecord) -> Result<()>;

    /// Get a user's live telemetry record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_live_record(&self, user_id: &UserId) -> Result<Option<LiveRecord>>;

    /// Delete a user's live telemetry record. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_live_record(&self, user_id: &UserId) -> Result<bool>;

    /// Append a mirrored telemetry entry to its meter's log.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_telemetry(&self, entry: &TelemetryLogEntry) -> Result<()>;

    /// List a meter's telemetry log, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_telemetry(&self, meter_id: &MeterId, limit: usize)
        -> Result<Vec<TelemetryLogEntry>>;
}

/// Apply a credit to an already-loaded payment and balance.
///
/// Backends call this inside their critical section and persist the payment and balance of a
/// `Credited` outcome together.
pub(crate) fn apply_credit(
    mut payment: PaymentRequest,
    existing: Option<ClientBalance>,
    tariff: &Tariff,
    now: DateTime<Utc>,
) -> CreditOutcome {
    if payment.processed {
        return CreditOutcome::AlreadyProcessed(payment);
    }
    if !payment.awaiting_credit() {
        return CreditOutcome::NotCreditable(payment);
    }

    let quantity = tariff.quantity_for(payment.creditable_amount());
    payment.mark_processed(quantity, now);

    let balance = match existing {
        Some(mut balance) => {
            if balance.user_id.is_none() {
                balance.user_id.clone_from(&payment.user_id);
            }
            balance.apply_credit(quantity, now);
            balance
        }
        None => ClientBalance::opened(
            payment.meter_id.clone(),
            payment.user_id.clone(),
            payment.phone.clone(),
            quantity,
            now,
        ),
    };

    CreditOutcome::Credited {
        payment,
        balance,
        quantity,
    }
}
