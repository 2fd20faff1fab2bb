//! API error types and responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use maji_core::{BillingError, IdError};
use maji_store::StoreError;

use crate::mpesa::MpesaError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad or missing input.
    #[error("validation error: {0}")]
    Validation(String),

    /// M-Pesa token exchange failed.
    #[error("upstream auth error: {0}")]
    UpstreamAuth(String),

    /// M-Pesa refused the request.
    #[error("upstream rejected: {0}")]
    UpstreamRejected(String),

    /// M-Pesa could not be reached, timed out, failed, or is not configured.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage failure.
    #[error("store error: {0}")]
    Store(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UpstreamRejected(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamAuth(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::UpstreamAuth(_) => "upstream_auth_error",
            Self::UpstreamRejected(_) => "upstream_rejected",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Store(msg) => {
                tracing::error!(error = %msg, "Store error");
                "An internal error occurred".to_string()
            }
            Self::UpstreamAuth(msg) => {
                tracing::error!(error = %msg, "M-Pesa authentication failed");
                "Payment provider authentication failed".to_string()
            }
            Self::Validation(msg)
            | Self::UpstreamRejected(msg)
            | Self::UpstreamUnavailable(msg)
            | Self::NotFound(msg) => msg.clone(),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::Duplicate { .. } | StoreError::Database(_) | StoreError::Serialization(_) => {
                Self::Store(err.to_string())
            }
        }
    }
}

impl From<MpesaError> for ApiError {
    fn from(err: MpesaError) -> Self {
        match err {
            MpesaError::Auth(msg) => Self::UpstreamAuth(msg),
            MpesaError::Rejected { message, .. } => Self::UpstreamRejected(message),
            MpesaError::Unavailable(msg) => Self::UpstreamUnavailable(msg),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
