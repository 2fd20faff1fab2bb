//! Balance reconciliation.
//!
//! The ledger turns settled payments into meter credits, debits consumption reports, and raises
//! threshold alerts. Exactly-once crediting is enforced by the store: a payment is credited
//! only while `processed == false`, and the flag flip and balance credit are one write.

use std::sync::Arc;

use maji_core::{
    Alert, AlertKind, CheckoutRequestId, ClientBalance, MeterId, PaymentRequest, PaymentStatus,
    Settlement, Tariff, ThresholdPolicy,
};
use maji_store::{CreditOutcome, SettleOutcome, Store, StoreError};

/// What happened to an inbound STK result.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// No payment matches the checkout ID.
    UnknownPayment,

    /// The payment failed or was cancelled.
    Failed(PaymentRequest),

    /// The payment succeeded and the meter was credited.
    Credited {
        /// The meter balance after the credit.
        balance: ClientBalance,
        /// Units credited.
        quantity: f64,
    },

    /// The result had already been applied; nothing changed.
    Duplicate(PaymentRequest),
}

/// Applies payments and consumption to meter balances.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    tariff: Tariff,
    policy: ThresholdPolicy,
}

impl Ledger {
    /// Create a ledger over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tariff: Tariff, policy: ThresholdPolicy) -> Self {
        Self {
            store,
            tariff,
            policy,
        }
    }

    /// The configured tariff.
    #[must_use]
    pub const fn tariff(&self) -> &Tariff {
        &self.tariff
    }

    /// The configured threshold policy.
    #[must_use]
    pub const fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Apply an STK result: settle the payment, then credit it if it succeeded.
    ///
    /// A payment that is already `Success` but not yet processed is credited again on a
    /// replayed callback, so a crash between settling and crediting recovers on the provider's
    /// retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn apply_callback(
        &self,
        checkout_request_id: &CheckoutRequestId,
        settlement: Settlement,
    ) -> Result<CallbackOutcome, StoreError> {
        let payment = match self.store.settle_payment(checkout_request_id, settlement)? {
            SettleOutcome::NotFound => {
                tracing::warn!(
                    checkout_request_id = %checkout_request_id,
                    "Callback for unknown payment"
                );
                return Ok(CallbackOutcome::UnknownPayment);
            }
            SettleOutcome::Settled(payment) => {
                tracing::info!(
                    checkout_request_id = %checkout_request_id,
                    meter_id = %payment.meter_id,
                    status = %payment.status.as_str(),
                    "Payment settled"
                );
                payment
            }
            SettleOutcome::AlreadySettled(payment) => {
                tracing::info!(
                    checkout_request_id = %checkout_request_id,
                    status = %payment.status.as_str(),
                    processed = payment.processed,
                    "Payment already settled"
                );
                payment
            }
        };

        if !payment.awaiting_credit() {
            return Ok(match payment.status {
                PaymentStatus::Failed => CallbackOutcome::Failed(payment),
                PaymentStatus::Success | PaymentStatus::Pending => {
                    CallbackOutcome::Duplicate(payment)
                }
            });
        }

        self.credit(checkout_request_id)
    }

    /// Credit a successful payment to its meter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the payment doesn't exist.
    pub fn credit(
        &self,
        checkout_request_id: &CheckoutRequestId,
    ) -> Result<CallbackOutcome, StoreError> {
        match self.store.credit_top_up(checkout_request_id, &self.tariff)? {
            CreditOutcome::Credited {
                balance, quantity, ..
            } => {
                tracing::info!(
                    checkout_request_id = %checkout_request_id,
                    meter_id = %balance.meter_id,
                    quantity = quantity,
                    remaining = balance.remaining_quantity,
                    status = %balance.status.as_str(),
                    "Top-up credited"
                );
                if balance.remaining_quantity <= 0.0 {
                    self.emit_alert(&Alert::new(
                        balance.meter_id.clone(),
                        AlertKind::WaterShutoff,
                        balance.remaining_quantity,
                    ));
                }
                Ok(CallbackOutcome::Credited { balance, quantity })
            }
            CreditOutcome::AlreadyProcessed(payment) => {
                tracing::info!(
                    checkout_request_id = %checkout_request_id,
                    "Top-up already credited"
                );
                Ok(CallbackOutcome::Duplicate(payment))
            }
            CreditOutcome::NotCreditable(payment) => Ok(CallbackOutcome::Failed(payment)),
        }
    }

    /// Debit a consumption report and raise the alert its new status calls for.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the meter has no balance.
    pub fn record_consumption(
        &self,
        meter_id: &MeterId,
        quantity: f64,
    ) -> Result<ClientBalance, StoreError> {
        let balance = self
            .store
            .debit_consumption(meter_id, quantity, &self.policy)?;

        tracing::info!(
            meter_id = %meter_id,
            consumed = quantity,
            remaining = balance.remaining_quantity,
            status = %balance.status.as_str(),
            "Consumption recorded"
        );

        if let Some(alert) = Alert::for_status(meter_id, balance.status, balance.remaining_quantity)
        {
            self.emit_alert(&alert);
        }
        Ok(balance)
    }

    /// Persist an alert. Failures are logged and never fail the caller.
    fn emit_alert(&self, alert: &Alert) {
        match self.store.put_alert(alert) {
            Ok(()) => tracing::warn!(
                meter_id = %alert.meter_id,
                alert_id = %alert.id,
                kind = %alert.kind.as_str(),
                remaining = alert.remaining_quantity,
                "Alert raised"
            ),
            Err(e) => tracing::error!(
                meter_id = %alert.meter_id,
                kind = %alert.kind.as_str(),
                error = %e,
                "Failed to store alert"
            ),
        }
    }
}
