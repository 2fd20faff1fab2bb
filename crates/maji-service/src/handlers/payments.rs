//! Top-up handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maji_core::{
    normalize_msisdn, round_amount, CheckoutRequestId, MeterId, PaymentRequest, UserId,
};

use crate::error::ApiError;
use crate::handlers::parse_number;
use crate::mpesa::StkPush;
use crate::state::AppState;

/// Description sent with every STK push.
const TRANSACTION_DESCRIPTION: &str = "Water top-up";

/// Top-up request from the app.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushBody {
    /// Payer phone in any local or international format.
    pub phone_number: Option<String>,
    /// Amount in currency units; a number or a numeric string.
    pub amount: Option<serde_json::Value>,
    /// Meter to credit.
    pub meter_number: Option<String>,
    /// App user initiating the top-up.
    pub user_id: Option<String>,
}

/// Top-up response, in the provider's field naming.
#[derive(Debug, Serialize)]
pub struct StkPushReply {
    /// Always true; failures use the error body.
    pub success: bool,
    /// Correlation ID for the pending payment.
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    /// Provider merchant request ID.
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    /// Provider description.
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    /// Message to show the customer.
    #[serde(rename = "CustomerMessage")]
    pub customer_message: String,
}

/// Initiate a top-up by sending an STK push to the payer's phone.
///
/// The pending payment is stored only after M-Pesa accepts the push.
pub async fn stk_push(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StkPushBody>, JsonRejection>,
) -> Result<Json<StkPushReply>, ApiError> {
    let Json(body) = body?;

    let raw_phone = required(body.phone_number.as_deref(), "phoneNumber")?;
    let meter_id = MeterId::new(required(body.meter_number.as_deref(), "meterNumber")?)?;
    let amount = round_amount(parse_number(body.amount.as_ref(), "amount")?)?;
    let user_id = body
        .user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(UserId::new)
        .transpose()?;

    let phone = normalize_msisdn(raw_phone, &state.config.country_code);
    if phone.is_empty() {
        return Err(ApiError::Validation(
            "phoneNumber must contain digits".into(),
        ));
    }

    let mpesa = state.mpesa.as_ref().ok_or_else(|| {
        ApiError::UpstreamUnavailable("M-Pesa is not configured".into())
    })?;

    tracing::info!(meter_id = %meter_id, amount = amount, "Initiating top-up");

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let response = mpesa
        .stk_push(&StkPush {
            phone: &phone,
            amount: amount as u64,
            account_reference: meter_id.as_str(),
            description: TRANSACTION_DESCRIPTION,
        })
        .await?;

    let checkout_request_id = CheckoutRequestId::new(&response.checkout_request_id)
        .map_err(|e| {
            ApiError::UpstreamUnavailable(format!("M-Pesa returned no usable CheckoutRequestID: {e}"))
        })?;

    let payment = PaymentRequest::pending(
        checkout_request_id,
        response.merchant_request_id.clone(),
        user_id,
        phone,
        amount,
        meter_id,
    );
    state.store.insert_payment(&payment)?;

    tracing::info!(
        checkout_request_id = %payment.checkout_request_id,
        meter_id = %payment.meter_id,
        "Pending payment recorded"
    );

    Ok(Json(StkPushReply {
        success: true,
        checkout_request_id: response.checkout_request_id,
        merchant_request_id: response.merchant_request_id,
        response_description: response.response_description,
        customer_message: response.customer_message,
    }))
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("{field} is required")))
}

// ============================================================================
// History
// ============================================================================

/// Query parameters for listing.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// A payment as shown to the app.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    /// Provider correlation ID.
    pub transaction_id: String,
    /// Initiating user.
    pub user_id: Option<String>,
    /// Normalized payer phone.
    pub phone: String,
    /// Submitted amount.
    pub amount: f64,
    /// Credited meter.
    pub meter_id: String,
    /// Pending, success or failed.
    pub status: String,
    /// Units credited (0 until processed).
    pub quantity_purchased: f64,
    /// Whether the payment has been credited.
    pub processed: bool,
    /// M-Pesa receipt, once paid.
    pub receipt_number: Option<String>,
    /// Provider result description, once settled.
    pub result_desc: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentRequest> for PaymentView {
    fn from(payment: PaymentRequest) -> Self {
        let (receipt_number, result_desc) = payment
            .settlement
            .map(|s| (s.receipt_number, Some(s.result_desc)))
            .unwrap_or_default();
        Self {
            transaction_id: payment.checkout_request_id.as_str().to_string(),
            user_id: payment.user_id.map(|u| u.as_str().to_string()),
            phone: payment.phone,
            amount: payment.amount,
            meter_id: payment.meter_id.as_str().to_string(),
            status: payment.status.as_str().to_string(),
            quantity_purchased: payment.quantity_purchased,
            processed: payment.processed,
            receipt_number,
            result_desc,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

/// Payment history response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryResponse {
    /// Always true.
    pub success: bool,
    /// The meter queried.
    pub meter_number: String,
    /// Most recent first.
    pub payments: Vec<PaymentView>,
}

/// List a meter's payments, most recent first.
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Path(meter_id): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<PaymentHistoryResponse>, ApiError> {
    let Query(query) = query?;
    let meter_id = MeterId::new(meter_id)?;
    let limit = state.config.page_size(query.limit);

    let payments = state.store.list_payments_by_meter(&meter_id, limit)?;

    Ok(Json(PaymentHistoryResponse {
        success: true,
        meter_number: meter_id.as_str().to_string(),
        payments: payments.into_iter().map(PaymentView::from).collect(),
    }))
}
