//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, meters, payments, telemetry, usage, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for device endpoints (usage and live telemetry).
const DEVICE_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/tariff` - Configured tariff and threshold
///
/// ## Top-ups
/// - `POST /v1/payments/stk-push` - Initiate an M-Pesa top-up
/// - `GET /v1/meters/{meter_id}/payments` - Payment history
///
/// ## Meters
/// - `GET /v1/meters/{meter_id}` - Balance
/// - `GET /v1/meters/{meter_id}/alerts` - Alerts
/// - `POST /v1/alerts/{alert_id}/resolve` - Resolve an alert
///
/// ## Devices (rate-limited)
/// - `POST /v1/usage` - Report consumption
/// - `PUT /v1/live/{user_id}` - Write live telemetry
/// - `DELETE /v1/live/{user_id}` - Remove live telemetry
///
/// ## Telemetry
/// - `PUT /v1/profiles/{user_id}` - Register a user's meter
/// - `GET /v1/meters/{meter_id}/logs` - Mirrored telemetry
///
/// ## Webhooks
/// - `POST /webhooks/mpesa` - STK push results
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Meters report often; they get a higher limit of their own.
    let device_routes = Router::new()
        .route("/usage", post(usage::report_usage))
        .route(
            "/live/:user_id",
            put(telemetry::put_live).delete(telemetry::delete_live),
        )
        .layer(ConcurrencyLimitLayer::new(DEVICE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/tariff", get(health::tariff))
        // Top-ups
        .route("/payments/stk-push", post(payments::stk_push))
        // Meters
        .route("/meters/:meter_id", get(meters::get_meter))
        .route("/meters/:meter_id/payments", get(payments::list_payments))
        .route("/meters/:meter_id/alerts", get(meters::list_alerts))
        .route("/meters/:meter_id/logs", get(telemetry::list_logs))
        .route("/alerts/:alert_id/resolve", post(meters::resolve_alert))
        // Telemetry
        .route("/profiles/:user_id", put(telemetry::put_profile))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .merge(device_routes);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - M-Pesa retries on failure)
        .route("/webhooks/mpesa", post(webhooks::mpesa_callback))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
