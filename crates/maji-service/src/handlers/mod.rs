//! API handlers.

pub mod health;
pub mod meters;
pub mod payments;
pub mod telemetry;
pub mod usage;
pub mod webhooks;

use crate::error::ApiError;

/// Read a required numeric field sent either as a JSON number or a numeric string.
pub(crate) fn parse_number(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<f64, ApiError> {
    let invalid = || ApiError::Validation(format!("{field} must be numeric"));
    match value {
        None | Some(serde_json::Value::Null) => {
            Err(ApiError::Validation(format!("{field} is required")))
        }
        Some(serde_json::Value::Number(n)) => n.as_f64().ok_or_else(invalid),
        Some(serde_json::Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
