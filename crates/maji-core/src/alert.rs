//! Alerts raised by threshold evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AlertId, BalanceStatus, MeterId};

/// An append-only alert about a meter's balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert ID (ULID for time-ordering).
    pub id: AlertId,

    /// The meter the alert is about.
    pub meter_id: MeterId,

    /// What happened.
    pub kind: AlertKind,

    /// Human-readable message.
    pub message: String,

    /// Urgency.
    pub priority: AlertPriority,

    /// Remaining units when the alert was raised.
    pub remaining_quantity: f64,

    /// Whether an operator has dealt with the alert.
    pub resolved: bool,

    /// When the alert was raised.
    pub created_at: DateTime<Utc>,

    /// When the alert was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Create a new unresolved alert.
    #[must_use]
    pub fn new(meter_id: MeterId, kind: AlertKind, remaining_quantity: f64) -> Self {
        let message = match kind {
            AlertKind::LowBalance => {
                format!("Low water balance: {remaining_quantity} units remaining")
            }
            AlertKind::WaterShutoff => "Water units depleted - flow stopped".to_string(),
        };

        Self {
            id: AlertId::generate(),
            meter_id,
            kind,
            message,
            priority: kind.priority(),
            remaining_quantity,
            resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// The alert a balance status raises, if any.
    #[must_use]
    pub fn for_status(meter_id: &MeterId, status: BalanceStatus, remaining: f64) -> Option<Self> {
        status
            .alert_kind()
            .map(|kind| Self::new(meter_id.clone(), kind, remaining))
    }

    /// Mark the alert resolved. Resolving twice keeps the first timestamp.
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(now);
        }
    }
}

/// Kind of alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Balance fell to or below the low-balance threshold.
    LowBalance,

    /// Balance is exhausted; water should be shut off.
    WaterShutoff,
}

impl AlertKind {
    /// Priority for this kind of alert.
    #[must_use]
    pub const fn priority(self) -> AlertPriority {
        match self {
            Self::LowBalance => AlertPriority::Medium,
            Self::WaterShutoff => AlertPriority::High,
        }
    }

    /// Get the kind name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowBalance => "low_balance",
            Self::WaterShutoff => "water_shutoff",
        }
    }
}

/// Alert urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    /// Needs attention soon.
    Medium,
    /// Needs attention now.
    High,
}
