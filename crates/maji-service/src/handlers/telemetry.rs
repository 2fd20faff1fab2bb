//! Account profile and live telemetry handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maji_core::{
    normalize_msisdn, AccountProfile, LiveRecord, MeterId, TelemetryFields, TelemetryLogEntry,
    UserId,
};

use crate::error::ApiError;
use crate::handlers::payments::ListQuery;
use crate::state::AppState;

/// Profile registration body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    /// The user's meter.
    pub meter_number: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
}

/// A profile as shown to the app.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    /// The user.
    pub user_id: String,
    /// The user's meter.
    pub meter_number: Option<String>,
    /// Normalized phone.
    pub phone: Option<String>,
    /// Last change time.
    pub updated_at: DateTime<Utc>,
}

impl From<AccountProfile> for ProfileView {
    fn from(profile: AccountProfile) -> Self {
        Self {
            user_id: profile.user_id.as_str().to_string(),
            meter_number: profile.meter_id.map(|m| m.as_str().to_string()),
            phone: profile.phone,
            updated_at: profile.updated_at,
        }
    }
}

/// Register or update the meter a user owns.
pub async fn put_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileView>, ApiError> {
    let Json(body) = body?;
    let user_id = UserId::new(user_id)?;
    let meter_id = body
        .meter_number
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .map(MeterId::new)
        .transpose()?;
    let phone = body
        .phone
        .as_deref()
        .map(|p| normalize_msisdn(p, &state.config.country_code))
        .filter(|p| !p.is_empty());

    let profile = AccountProfile::new(user_id, meter_id, phone);
    state.store.put_profile(&profile)?;

    tracing::info!(
        user_id = %profile.user_id,
        meter_id = ?profile.meter_id,
        "Account profile saved"
    );

    Ok(Json(profile.into()))
}

/// Live write response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveWriteResponse {
    /// Always true.
    pub success: bool,
    /// Whether a log entry was appended.
    pub mirrored: bool,
    /// The meter the entry was filed under.
    pub meter_number: Option<String>,
}

/// Replace a user's live telemetry record and mirror it.
///
/// Mirror failures are logged and reported as `mirrored: false`; the live write still succeeds.
pub async fn put_live(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    body: Result<Json<TelemetryFields>, JsonRejection>,
) -> Result<Json<LiveWriteResponse>, ApiError> {
    let Json(fields) = body?;
    let user_id = UserId::new(user_id)?;

    let record = LiveRecord {
        user_id: user_id.clone(),
        fields,
        updated_at: Utc::now(),
    };
    state.store.put_live_record(&record)?;

    let entry = state
        .mirror
        .on_live_change(&user_id, Some(&record.fields))
        .unwrap_or_else(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Failed to mirror live telemetry");
            None
        });

    Ok(Json(LiveWriteResponse {
        success: true,
        mirrored: entry.is_some(),
        meter_number: entry.map(|e| e.meter_id.as_str().to_string()),
    }))
}

/// Delete a user's live record. The mirror sees an empty payload and appends nothing.
pub async fn delete_live(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = UserId::new(user_id)?;
    if !state.store.delete_live_record(&user_id)? {
        return Err(ApiError::NotFound(format!("No live record for user {user_id}")));
    }
    if let Err(e) = state.mirror.on_live_change(&user_id, None) {
        tracing::error!(user_id = %user_id, error = %e, "Failed to mirror live record removal");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Telemetry log response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryLogResponse {
    /// Always true.
    pub success: bool,
    /// The meter queried.
    pub meter_number: String,
    /// Flattened entries, newest first.
    pub entries: Vec<serde_json::Value>,
}

/// List mirrored telemetry for a meter, newest first.
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Path(meter_id): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<TelemetryLogResponse>, ApiError> {
    let Query(query) = query?;
    let meter_id = MeterId::new(meter_id)?;
    let limit = state.config.page_size(query.limit);

    let entries = state.store.list_telemetry(&meter_id, limit)?;

    Ok(Json(TelemetryLogResponse {
        success: true,
        meter_number: meter_id.as_str().to_string(),
        entries: entries.iter().map(TelemetryLogEntry::to_flat_json).collect(),
    }))
}
