//! Request and response types for the maji client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maji_core::{AlertKind, AlertPriority, BalanceStatus, PaymentStatus};

/// Top-up request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    /// Payer phone in any local or international format.
    pub phone_number: String,
    /// Amount in currency units; rounded to a whole number by the service.
    pub amount: f64,
    /// Meter to credit.
    pub meter_number: String,
    /// App user initiating the top-up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Accepted top-up. The meter is credited once the customer confirms on their phone.
#[derive(Debug, Clone, Deserialize)]
pub struct TopUpResponse {
    /// Always true.
    pub success: bool,
    /// Correlation ID of the pending payment.
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    /// M-Pesa merchant request ID.
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    /// M-Pesa description.
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    /// Message to show the customer.
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

/// Consumption report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    /// Reporting meter.
    pub meter_number: String,
    /// Units consumed since the last report.
    pub water_used: f64,
}

/// Consumption result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    /// Always true.
    pub success: bool,
    /// The meter debited.
    pub meter_number: String,
    /// Units left.
    pub remaining_quantity: f64,
    /// Status after the debit.
    pub status: BalanceStatus,
}

/// A meter's balance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterStatus {
    /// The meter.
    pub meter_id: String,
    /// First user to top up the meter.
    pub user_id: Option<String>,
    /// Payer phone.
    pub phone: String,
    /// Units left.
    pub remaining_quantity: f64,
    /// Lifetime units credited.
    pub total_purchased: f64,
    /// Lifetime units consumed.
    pub consumption_total: f64,
    /// Most recent consumption report.
    pub last_consumption: Option<f64>,
    /// Current status.
    pub status: BalanceStatus,
    /// Last credit time.
    pub last_top_up: Option<DateTime<Utc>>,
    /// Last change time.
    pub last_updated: DateTime<Utc>,
}

/// A payment in a meter's history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// M-Pesa correlation ID.
    pub transaction_id: String,
    /// Initiating user.
    pub user_id: Option<String>,
    /// Payer phone.
    pub phone: String,
    /// Submitted amount.
    pub amount: f64,
    /// Credited meter.
    pub meter_id: String,
    /// Payment status.
    pub status: PaymentStatus,
    /// Units credited.
    pub quantity_purchased: f64,
    /// Whether the payment has been credited.
    pub processed: bool,
    /// M-Pesa receipt.
    pub receipt_number: Option<String>,
    /// M-Pesa result description.
    pub result_desc: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Payment history response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistory {
    /// The meter.
    pub meter_number: String,
    /// Most recent first.
    pub payments: Vec<Payment>,
}

/// A balance alert.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Alert ID.
    pub id: String,
    /// The meter.
    pub meter_id: String,
    /// What happened.
    pub kind: AlertKind,
    /// Human-readable message.
    pub message: String,
    /// Urgency.
    pub priority: AlertPriority,
    /// Units left when raised.
    pub remaining_quantity: f64,
    /// Whether it has been dealt with.
    pub resolved: bool,
    /// When it was raised.
    pub created_at: DateTime<Utc>,
    /// When it was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Alert listing response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertList {
    /// The meter.
    pub meter_number: String,
    /// Newest first.
    pub alerts: Vec<Alert>,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Always false.
    #[serde(default)]
    pub success: bool,
    /// Error message.
    pub error: String,
    /// Error code.
    pub code: String,
}
