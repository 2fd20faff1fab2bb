//! Payment request types for maji-billing.
//!
//! A `PaymentRequest` is created when the provider accepts an STK push and is settled exactly
//! once when the provider's callback arrives. Settled successful payments are then credited to
//! the meter balance, also exactly once, gated on `processed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::{CheckoutRequestId, MeterId, UserId};

/// Result code the provider uses for a completed payment.
pub const RESULT_CODE_SUCCESS: i64 = 0;

/// A push-payment request and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Provider-issued correlation ID (`CheckoutRequestID`).
    pub checkout_request_id: CheckoutRequestId,

    /// Provider-issued merchant request ID.
    pub merchant_request_id: String,

    /// The app user who started the top-up, if known.
    pub user_id: Option<UserId>,

    /// Normalized payer phone number.
    pub phone: String,

    /// Submitted amount (whole currency units).
    pub amount: f64,

    /// The meter being topped up.
    pub meter_id: MeterId,

    /// Current status.
    pub status: PaymentStatus,

    /// Units credited to the meter. Zero until processed.
    pub quantity_purchased: f64,

    /// Whether the balance credit has been applied.
    pub processed: bool,

    /// Callback data kept for audit, set on settlement.
    pub settlement: Option<Settlement>,

    /// When the request was accepted by the provider.
    pub created_at: DateTime<Utc>,

    /// When the request last changed.
    pub updated_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// Create a pending payment request.
    #[must_use]
    pub fn pending(
        checkout_request_id: CheckoutRequestId,
        merchant_request_id: String,
        user_id: Option<UserId>,
        phone: String,
        amount: f64,
        meter_id: MeterId,
    ) -> Self {
        let now = Utc::now();
        Self {
            checkout_request_id,
            merchant_request_id,
            user_id,
            phone,
            amount,
            meter_id,
            status: PaymentStatus::Pending,
            quantity_purchased: 0.0,
            processed: false,
            settlement: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the payment has reached a terminal status.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self.status, PaymentStatus::Pending)
    }

    /// Whether the payment succeeded but has not been credited yet.
    #[must_use]
    pub const fn awaiting_credit(&self) -> bool {
        matches!(self.status, PaymentStatus::Success) && !self.processed
    }

    /// The amount to credit: the provider-confirmed amount when known, otherwise the
    /// submitted amount.
    #[must_use]
    pub fn creditable_amount(&self) -> f64 {
        self.settlement
            .as_ref()
            .and_then(|s| s.confirmed_amount)
            .unwrap_or(self.amount)
    }

    /// Apply a settlement. Returns `false` and leaves the record untouched if already settled.
    pub fn settle(&mut self, settlement: Settlement, now: DateTime<Utc>) -> bool {
        if self.is_settled() {
            return false;
        }
        self.status = settlement.status();
        self.settlement = Some(settlement);
        self.updated_at = now;
        true
    }

    /// Record the credited quantity. Returns `false` if already processed.
    pub fn mark_processed(&mut self, quantity: f64, now: DateTime<Utc>) -> bool {
        if self.processed {
            return false;
        }
        self.processed = true;
        self.quantity_purchased = quantity;
        self.updated_at = now;
        true
    }
}

/// Status of a payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Push sent; waiting for the callback.
    Pending,
    /// Customer paid.
    Success,
    /// Customer cancelled, timed out or the payment failed.
    Failed,
}

impl PaymentStatus {
    /// Get the status name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }
}

/// The provider's final result for a payment, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    /// Provider result code. Zero means paid.
    pub result_code: i64,

    /// Provider result description.
    pub result_desc: String,

    /// M-Pesa receipt number.
    pub receipt_number: Option<String>,

    /// Amount confirmed by the provider.
    pub confirmed_amount: Option<f64>,

    /// Phone number that paid, as reported by the provider.
    pub payer_phone: Option<String>,

    /// Provider transaction date (`YYYYMMDDHHmmss`).
    pub transaction_date: Option<String>,

    /// The raw callback body.
    pub raw: serde_json::Value,
}

impl Settlement {
    /// Terminal status implied by the result code.
    #[must_use]
    pub const fn status(&self) -> PaymentStatus {
        if self.result_code == RESULT_CODE_SUCCESS {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        }
    }
}

/// Validate a top-up amount and round it to whole currency units.
///
/// # Errors
///
/// Returns `BillingError::InvalidAmount` if the amount is not finite, not positive, or rounds to
/// zero.
pub fn round_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(BillingError::InvalidAmount(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    let rounded = amount.round();
    if rounded < 1.0 {
        return Err(BillingError::InvalidAmount(format!(
            "amount {amount} rounds to zero"
        )));
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PaymentRequest {
        PaymentRequest::pending(
            CheckoutRequestId::new("ws_CO_1").unwrap(),
            "mr-1".into(),
            None,
            "254712345678".into(),
            100.0,
            MeterId::new("MTR1").unwrap(),
        )
    }

    fn settlement(result_code: i64, confirmed_amount: Option<f64>) -> Settlement {
        Settlement {
            result_code,
            result_desc: "done".into(),
            receipt_number: None,
            confirmed_amount,
            payer_phone: None,
            transaction_date: None,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn settles_exactly_once() {
        let mut payment = pending();
        assert!(payment.settle(settlement(0, None), Utc::now()));
        assert_eq!(payment.status, PaymentStatus::Success);
        assert!(!payment.settle(settlement(1032, None), Utc::now()));
        assert_eq!(payment.status, PaymentStatus::Success);
    }

    #[test]
    fn non_zero_result_code_fails() {
        let mut payment = pending();
        payment.settle(settlement(1032, None), Utc::now());
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(!payment.awaiting_credit());
    }

    #[test]
    fn credits_confirmed_amount_when_present() {
        let mut payment = pending();
        assert_eq!(payment.creditable_amount(), 100.0);
        payment.settle(settlement(0, Some(99.0)), Utc::now());
        assert_eq!(payment.creditable_amount(), 99.0);
    }

    #[test]
    fn processed_flag_flips_once() {
        let mut payment = pending();
        payment.settle(settlement(0, None), Utc::now());
        assert!(payment.awaiting_credit());
        assert!(payment.mark_processed(100.0, Utc::now()));
        assert!(!payment.mark_processed(200.0, Utc::now()));
        assert_eq!(payment.quantity_purchased, 100.0);
        assert!(!payment.awaiting_credit());
    }

    #[test]
    fn amount_rounding() {
        assert_eq!(round_amount(99.6), Ok(100.0));
        assert_eq!(round_amount(10.0), Ok(10.0));
        assert!(round_amount(0.0).is_err());
        assert!(round_amount(-5.0).is_err());
        assert!(round_amount(0.4).is_err());
        assert!(round_amount(f64::NAN).is_err());
    }
}
