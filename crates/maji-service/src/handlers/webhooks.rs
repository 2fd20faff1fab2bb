//! M-Pesa callback handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::ledger::CallbackOutcome;
use crate::mpesa::parse_callback;
use crate::state::AppState;

/// Acknowledgment M-Pesa expects from the callback URL.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    /// Always zero.
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    /// Free-form description.
    #[serde(rename = "ResultDesc")]
    pub result_desc: &'static str,
}

impl CallbackAck {
    const fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted",
        }
    }
}

/// Handle an STK push result.
///
/// The body is taken as raw bytes and parsed by hand, so malformed payloads (including bodies
/// that are not UTF-8) are still acknowledged along with unknown payments and internal failures.
/// M-Pesa retries unacknowledged callbacks.
pub async fn mpesa_callback(State(state): State<Arc<AppState>>, body: Bytes) -> Json<CallbackAck> {
    let (checkout_request_id, settlement) = match parse_callback(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, body_len = body.len(), "Ignoring unreadable M-Pesa callback");
            return Json(CallbackAck::accepted());
        }
    };

    let result_code = settlement.result_code;
    tracing::info!(
        checkout_request_id = %checkout_request_id,
        result_code = result_code,
        "M-Pesa callback received"
    );

    match state.ledger.apply_callback(&checkout_request_id, settlement) {
        Ok(CallbackOutcome::Credited { balance, quantity }) => tracing::info!(
            checkout_request_id = %checkout_request_id,
            meter_id = %balance.meter_id,
            quantity = quantity,
            "Callback applied"
        ),
        Ok(CallbackOutcome::Failed(payment)) => tracing::info!(
            checkout_request_id = %checkout_request_id,
            meter_id = %payment.meter_id,
            result_code = result_code,
            "Payment did not complete"
        ),
        Ok(CallbackOutcome::Duplicate(_) | CallbackOutcome::UnknownPayment) => {}
        Err(e) => tracing::error!(
            checkout_request_id = %checkout_request_id,
            error = %e,
            "Failed to apply M-Pesa callback"
        ),
    }

    Json(CallbackAck::accepted())
}
