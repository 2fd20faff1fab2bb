//! Meter balance types for maji-billing.
//!
//! A `ClientBalance` is the prepaid water balance of one meter. Credits come from confirmed
//! M-Pesa payments, debits from consumption reports, and every change re-evaluates the
//! meter's status against a [`ThresholdPolicy`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::{AlertKind, MeterId, UserId};

/// Default low-balance threshold in water units.
pub const DEFAULT_LOW_BALANCE_THRESHOLD: f64 = 10.0;

/// The prepaid balance of a single meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientBalance {
    /// The meter this balance belongs to.
    pub meter_id: MeterId,

    /// The app user who first topped up this meter, if known.
    pub user_id: Option<UserId>,

    /// Normalized payer phone number.
    pub phone: String,

    /// Units left. Goes negative when consumption overshoots the balance.
    pub remaining_quantity: f64,

    /// Lifetime units credited.
    pub total_purchased: f64,

    /// Lifetime units consumed.
    pub consumption_total: f64,

    /// Size of the most recent consumption report.
    pub last_consumption: Option<f64>,

    /// Status after the most recent change.
    pub status: BalanceStatus,

    /// When the last top-up was credited.
    pub last_top_up: Option<DateTime<Utc>>,

    /// When the balance was last changed.
    pub last_updated: DateTime<Utc>,

    /// When the balance was created (first successful payment).
    pub created_at: DateTime<Utc>,
}

impl ClientBalance {
    /// Open a balance with its first credit.
    #[must_use]
    pub fn opened(
        meter_id: MeterId,
        user_id: Option<UserId>,
        phone: String,
        quantity: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            meter_id,
            user_id,
            phone,
            remaining_quantity: quantity,
            total_purchased: quantity,
            consumption_total: 0.0,
            last_consumption: None,
            status: BalanceStatus::after_credit(quantity),
            last_top_up: Some(now),
            last_updated: now,
            created_at: now,
        }
    }

    /// Add purchased units.
    ///
    /// Crediting never produces `Warning`: the status is `Active` when units remain and
    /// `Depleted` otherwise.
    pub fn apply_credit(&mut self, quantity: f64, now: DateTime<Utc>) -> BalanceStatus {
        self.remaining_quantity += quantity;
        self.total_purchased += quantity;
        self.status = BalanceStatus::after_credit(self.remaining_quantity);
        self.last_top_up = Some(now);
        self.last_updated = now;
        self.status
    }

    /// Subtract consumed units and classify the result.
    pub fn apply_debit(
        &mut self,
        quantity: f64,
        policy: &ThresholdPolicy,
        now: DateTime<Utc>,
    ) -> BalanceStatus {
        self.remaining_quantity -= quantity;
        self.consumption_total += quantity;
        self.last_consumption = Some(quantity);
        self.status = policy.classify(self.remaining_quantity);
        self.last_updated = now;
        self.status
    }
}

/// Status of a meter balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    /// Water flows normally.
    Active,

    /// Balance is at or below the low-balance threshold.
    Warning,

    /// Balance is exhausted; the meter should shut off.
    Depleted,
}

impl BalanceStatus {
    /// Status after a credit: `Active` if any units remain, otherwise `Depleted`.
    #[must_use]
    pub fn after_credit(remaining: f64) -> Self {
        if remaining > 0.0 {
            Self::Active
        } else {
            Self::Depleted
        }
    }

    /// The alert this status raises, if any.
    #[must_use]
    pub const fn alert_kind(self) -> Option<AlertKind> {
        match self {
            Self::Active => None,
            Self::Warning => Some(AlertKind::LowBalance),
            Self::Depleted => Some(AlertKind::WaterShutoff),
        }
    }

    /// Get the status name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Warning => "warning",
            Self::Depleted => "depleted",
        }
    }
}

/// Threshold evaluation for debits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// Balances at or below this many units (and above zero) are in `Warning`.
    pub low_balance_threshold: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            low_balance_threshold: DEFAULT_LOW_BALANCE_THRESHOLD,
        }
    }
}

impl ThresholdPolicy {
    /// Build a validated policy.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Configuration` if the threshold is negative or not finite.
    pub fn new(low_balance_threshold: f64) -> Result<Self> {
        if !low_balance_threshold.is_finite() || low_balance_threshold < 0.0 {
            return Err(BillingError::Configuration(format!(
                "low balance threshold must be a non-negative number, got {low_balance_threshold}"
            )));
        }
        Ok(Self {
            low_balance_threshold,
        })
    }

    /// Classify a remaining quantity.
    #[must_use]
    pub fn classify(&self, remaining: f64) -> BalanceStatus {
        if remaining <= 0.0 {
            BalanceStatus::Depleted
        } else if remaining <= self.low_balance_threshold {
            BalanceStatus::Warning
        } else {
            BalanceStatus::Active
        }
    }
}

/// Validate a consumption quantity reported by a device.
///
/// # Errors
///
/// Returns `BillingError::InvalidQuantity` for negative or non-finite values. Zero is accepted.
pub fn validate_consumption(quantity: f64) -> Result<f64> {
    if !quantity.is_finite() {
        return Err(BillingError::InvalidQuantity(
            "consumption must be a finite number".into(),
        ));
    }
    if quantity < 0.0 {
        return Err(BillingError::InvalidQuantity(format!(
            "consumption cannot be negative, got {quantity}"
        )));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(remaining: f64) -> ClientBalance {
        let mut balance = ClientBalance::opened(
            MeterId::new("MTR1").unwrap(),
            None,
            "254712345678".into(),
            0.0,
            Utc::now(),
        );
        balance.remaining_quantity = remaining;
        balance
    }

    #[test]
    fn threshold_boundaries() {
        let policy = ThresholdPolicy::new(10.0).unwrap();
        assert_eq!(policy.classify(10.0), BalanceStatus::Warning);
        assert_eq!(policy.classify(10.5), BalanceStatus::Active);
        assert_eq!(policy.classify(0.1), BalanceStatus::Warning);
        assert_eq!(policy.classify(0.0), BalanceStatus::Depleted);
        assert_eq!(policy.classify(-3.0), BalanceStatus::Depleted);
    }

    #[test]
    fn zero_threshold_never_warns() {
        let policy = ThresholdPolicy::new(0.0).unwrap();
        assert_eq!(policy.classify(0.01), BalanceStatus::Active);
        assert_eq!(policy.classify(0.0), BalanceStatus::Depleted);
    }

    #[test]
    fn rejects_negative_threshold() {
        assert!(ThresholdPolicy::new(-1.0).is_err());
        assert!(ThresholdPolicy::new(f64::INFINITY).is_err());
    }

    #[test]
    fn debit_moves_remaining_by_exact_delta() {
        let mut b = balance(100.0);
        let status = b.apply_debit(95.0, &ThresholdPolicy::default(), Utc::now());
        assert_eq!(b.remaining_quantity, 5.0);
        assert_eq!(b.consumption_total, 95.0);
        assert_eq!(b.last_consumption, Some(95.0));
        assert_eq!(status, BalanceStatus::Warning);
    }

    #[test]
    fn debit_past_zero_goes_negative_and_depletes() {
        let mut b = balance(3.0);
        let status = b.apply_debit(5.0, &ThresholdPolicy::default(), Utc::now());
        assert_eq!(b.remaining_quantity, -2.0);
        assert_eq!(status, BalanceStatus::Depleted);
    }

    #[test]
    fn credit_reactivates_without_warning() {
        let mut b = balance(-2.0);
        b.status = BalanceStatus::Depleted;
        let status = b.apply_credit(5.0, Utc::now());
        assert_eq!(b.remaining_quantity, 3.0);
        assert_eq!(b.total_purchased, 5.0);
        assert_eq!(status, BalanceStatus::Active);
    }

    #[test]
    fn credit_that_leaves_deficit_stays_depleted() {
        let mut b = balance(-10.0);
        assert_eq!(b.apply_credit(4.0, Utc::now()), BalanceStatus::Depleted);
        assert_eq!(b.remaining_quantity, -6.0);
    }

    #[test]
    fn status_alert_kinds() {
        assert_eq!(BalanceStatus::Active.alert_kind(), None);
        assert_eq!(BalanceStatus::Warning.alert_kind(), Some(AlertKind::LowBalance));
        assert_eq!(BalanceStatus::Depleted.alert_kind(), Some(AlertKind::WaterShutoff));
    }

    #[test]
    fn consumption_validation() {
        assert_eq!(validate_consumption(0.0), Ok(0.0));
        assert_eq!(validate_consumption(12.5), Ok(12.5));
        assert!(validate_consumption(-0.5).is_err());
        assert!(validate_consumption(f64::NAN).is_err());
    }
}
