//! Consumption handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use maji_core::{validate_consumption, MeterId};

use crate::error::ApiError;
use crate::handlers::parse_number;
use crate::state::AppState;

/// Consumption report from a meter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    /// Reporting meter.
    pub meter_number: String,
    /// Units consumed since the last report; a number or a numeric string.
    pub water_used: Option<serde_json::Value>,
}

/// Consumption response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    /// Always true; failures use the error body.
    pub success: bool,
    /// The meter debited.
    pub meter_number: String,
    /// Units left after the debit. Negative once overdrawn.
    pub remaining_quantity: f64,
    /// active, warning or depleted.
    pub status: String,
}

/// Report consumed water and debit the meter.
pub async fn report_usage(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UsageRequest>, JsonRejection>,
) -> Result<Json<UsageResponse>, ApiError> {
    let Json(body) = body?;
    let meter_id = MeterId::new(&body.meter_number)?;
    let quantity = validate_consumption(parse_number(body.water_used.as_ref(), "waterUsed")?)?;

    tracing::debug!(meter_id = %meter_id, water_used = quantity, "Processing usage report");

    let balance = state.ledger.record_consumption(&meter_id, quantity)?;

    Ok(Json(UsageResponse {
        success: true,
        meter_number: meter_id.as_str().to_string(),
        remaining_quantity: balance.remaining_quantity,
        status: balance.status.as_str().to_string(),
    }))
}
