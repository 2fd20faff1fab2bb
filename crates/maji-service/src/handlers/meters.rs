//! Meter balance and alert handlers.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maji_core::{Alert, AlertId, ClientBalance, MeterId};

use crate::error::ApiError;
use crate::state::AppState;

/// A meter balance as shown to the app.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
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
    /// active, warning or depleted.
    pub status: String,
    /// Last credit time.
    pub last_top_up: Option<DateTime<Utc>>,
    /// Last change time.
    pub last_updated: DateTime<Utc>,
}

impl From<ClientBalance> for BalanceView {
    fn from(balance: ClientBalance) -> Self {
        Self {
            meter_id: balance.meter_id.as_str().to_string(),
            user_id: balance.user_id.map(|u| u.as_str().to_string()),
            phone: balance.phone,
            remaining_quantity: balance.remaining_quantity,
            total_purchased: balance.total_purchased,
            consumption_total: balance.consumption_total,
            last_consumption: balance.last_consumption,
            status: balance.status.as_str().to_string(),
            last_top_up: balance.last_top_up,
            last_updated: balance.last_updated,
        }
    }
}

/// Get a meter's balance.
pub async fn get_meter(
    State(state): State<Arc<AppState>>,
    Path(meter_id): Path<String>,
) -> Result<Json<BalanceView>, ApiError> {
    let meter_id = MeterId::new(meter_id)?;
    let balance = state
        .store
        .get_balance(&meter_id)?
        .ok_or_else(|| ApiError::NotFound(format!("No balance for meter {meter_id}")))?;

    Ok(Json(balance.into()))
}

// ============================================================================
// Alerts
// ============================================================================

/// Query parameters for alert listing.
#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    /// Only unresolved alerts.
    #[serde(default)]
    pub unresolved: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// An alert as shown to the app.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    /// Alert ID.
    pub id: String,
    /// The meter.
    pub meter_id: String,
    /// `low_balance` or `water_shutoff`.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// `medium` or `high`.
    pub priority: maji_core::AlertPriority,
    /// Units left when raised.
    pub remaining_quantity: f64,
    /// Whether it has been dealt with.
    pub resolved: bool,
    /// When it was raised.
    pub created_at: DateTime<Utc>,
    /// When it was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<Alert> for AlertView {
    fn from(alert: Alert) -> Self {
        Self {
            id: alert.id.to_string(),
            meter_id: alert.meter_id.as_str().to_string(),
            kind: alert.kind.as_str().to_string(),
            message: alert.message,
            priority: alert.priority,
            remaining_quantity: alert.remaining_quantity,
            resolved: alert.resolved,
            created_at: alert.created_at,
            resolved_at: alert.resolved_at,
        }
    }
}

/// Alert listing response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsResponse {
    /// Always true.
    pub success: bool,
    /// The meter queried.
    pub meter_number: String,
    /// Newest first.
    pub alerts: Vec<AlertView>,
}

/// List a meter's alerts, newest first.
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Path(meter_id): Path<String>,
    query: Result<Query<AlertsQuery>, QueryRejection>,
) -> Result<Json<AlertsResponse>, ApiError> {
    let Query(query) = query?;
    let meter_id = MeterId::new(meter_id)?;
    let limit = state.config.page_size(query.limit);

    let alerts = state
        .store
        .list_alerts_by_meter(&meter_id, query.unresolved, limit)?;

    Ok(Json(AlertsResponse {
        success: true,
        meter_number: meter_id.as_str().to_string(),
        alerts: alerts.into_iter().map(AlertView::from).collect(),
    }))
}

/// Mark an alert resolved. Resolving twice is harmless.
pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(alert_id): Path<String>,
) -> Result<Json<AlertView>, ApiError> {
    let alert_id: AlertId = alert_id.parse()?;
    let alert = state.store.resolve_alert(&alert_id)?;

    tracing::info!(alert_id = %alert_id, meter_id = %alert.meter_id, "Alert resolved");

    Ok(Json(alert.into()))
}
