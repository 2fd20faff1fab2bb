//! Health and service info handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use maji_core::{Tariff, ThresholdPolicy};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Whether top-ups can be initiated.
    pub mpesa_configured: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "maji-billing".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mpesa_configured: state.has_mpesa(),
    })
}

/// Tariff response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffResponse {
    /// Payment to unit conversion.
    pub tariff: Tariff,
    /// Warning threshold for debits.
    pub low_balance_threshold: f64,
}

/// Report the configured tariff and threshold.
pub async fn tariff(State(state): State<Arc<AppState>>) -> Json<TariffResponse> {
    let ThresholdPolicy {
        low_balance_threshold,
    } = *state.ledger.policy();
    Json(TariffResponse {
        tariff: *state.ledger.tariff(),
        low_balance_threshold,
    })
}
