//! M-Pesa Daraja wire types.

use serde::{Deserialize, Serialize};

use maji_core::{CheckoutRequestId, Settlement};

/// Transaction type for paybill STK pushes.
pub const TRANSACTION_TYPE_PAYBILL: &str = "CustomerPayBillOnline";

/// Maximum length M-Pesa accepts for `AccountReference`.
pub const ACCOUNT_REFERENCE_MAX_LEN: usize = 12;

/// Response code M-Pesa uses for an accepted request.
pub const RESPONSE_CODE_ACCEPTED: &str = "0";

/// OAuth token response.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds. Daraja sends this as a string.
    #[serde(default)]
    pub expires_in: Option<serde_json::Value>,
}

impl AuthResponse {
    /// Token lifetime in seconds, defaulting to one hour.
    #[must_use]
    pub fn expires_in_seconds(&self) -> i64 {
        self.expires_in
            .as_ref()
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .unwrap_or(3599)
    }
}

/// STK push request body.
#[derive(Debug, Serialize)]
pub struct StkPushRequest {
    /// Paybill or till number.
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    /// base64(shortcode + passkey + timestamp).
    #[serde(rename = "Password")]
    pub password: String,
    /// `YYYYMMDDHHmmss`.
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    /// Always [`TRANSACTION_TYPE_PAYBILL`].
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    /// Whole currency units.
    #[serde(rename = "Amount")]
    pub amount: u64,
    /// Paying phone number.
    #[serde(rename = "PartyA")]
    pub party_a: String,
    /// Receiving shortcode.
    #[serde(rename = "PartyB")]
    pub party_b: String,
    /// Phone number that receives the prompt.
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    /// Result callback URL.
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    /// Reference shown to the customer (at most 12 characters).
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    /// Free-form description.
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// STK push response body.
#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    /// Merchant request ID.
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    /// Correlation ID echoed in the callback.
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: String,
    /// "0" when accepted.
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    /// Human-readable outcome.
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    /// Message suitable for the customer.
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

/// Daraja error body.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    /// Daraja error code, e.g. `400.002.02`.
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
    /// Error description.
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

// ============================================================================
// Callback
// ============================================================================

/// STK callback envelope.
#[derive(Debug, Deserialize)]
pub struct StkCallbackEnvelope {
    /// Outer body.
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

/// Callback body.
#[derive(Debug, Deserialize)]
pub struct StkCallbackBody {
    /// The result.
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

/// STK result.
#[derive(Debug, Deserialize)]
pub struct StkCallback {
    /// Merchant request ID.
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    /// Correlation ID.
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    /// Zero on success. Sent as a number, occasionally as a string.
    #[serde(rename = "ResultCode")]
    pub result_code: serde_json::Value,
    /// Result description.
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    /// Present on success.
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

/// Callback metadata.
#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    /// Name/value items.
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

/// A single callback metadata item.
#[derive(Debug, Deserialize)]
pub struct CallbackItem {
    /// Item name, e.g. `MpesaReceiptNumber`.
    #[serde(rename = "Name")]
    pub name: String,
    /// Item value; numbers and strings both occur.
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

/// Reasons a callback body could not be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum CallbackParseError {
    /// The body is not the expected JSON shape.
    #[error("malformed callback: {0}")]
    Malformed(#[from] serde_json::Error),

    /// `CheckoutRequestID` is not a valid identifier.
    #[error("invalid CheckoutRequestID: {0}")]
    InvalidCheckoutId(#[from] maji_core::IdError),

    /// `ResultCode` is not an integer.
    #[error("invalid ResultCode: {0}")]
    InvalidResultCode(serde_json::Value),
}

impl CallbackMetadata {
    fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }
}

/// Parse a raw callback body into its correlation ID and a settlement record.
///
/// # Errors
///
/// Returns an error if the body lacks the `Body.stkCallback` structure, the checkout ID, or an
/// integer result code.
pub fn parse_callback(raw: &[u8]) -> Result<(CheckoutRequestId, Settlement), CallbackParseError> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    let envelope: StkCallbackEnvelope = serde_json::from_value(value.clone())?;
    let callback = envelope.body.stk_callback;

    let checkout_request_id = CheckoutRequestId::new(&callback.checkout_request_id)?;
    let result_code = value_as_i64(&callback.result_code)
        .ok_or(CallbackParseError::InvalidResultCode(callback.result_code))?;

    let metadata = callback.callback_metadata.as_ref();
    let settlement = Settlement {
        result_code,
        result_desc: callback.result_desc,
        receipt_number: metadata
            .and_then(|m| m.get("MpesaReceiptNumber"))
            .map(value_as_string),
        confirmed_amount: metadata
            .and_then(|m| m.get("Amount"))
            .and_then(value_as_f64),
        payer_phone: metadata
            .and_then(|m| m.get("PhoneNumber"))
            .map(value_as_string),
        transaction_date: metadata
            .and_then(|m| m.get("TransactionDate"))
            .map(value_as_string),
        raw: value,
    };

    Ok((checkout_request_id, settlement))
}

fn value_as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    let amount: f64 = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (amount.is_finite() && amount > 0.0).then_some(amount)
}

fn value_as_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maji_core::PaymentStatus;
    use serde_json::json;

    fn success_body() -> String {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            { "Name": "Amount", "Value": 100.00 },
                            { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                            { "Name": "Balance" },
                            { "Name": "TransactionDate", "Value": 20191219102115_u64 },
                            { "Name": "PhoneNumber", "Value": 254708374149_u64 }
                        ]
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn parses_successful_callback() {
        let (id, settlement) = parse_callback(success_body().as_bytes()).unwrap();
        assert_eq!(id.as_str(), "ws_CO_191220191020363925");
        assert_eq!(settlement.status(), PaymentStatus::Success);
        assert_eq!(settlement.receipt_number.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(settlement.confirmed_amount, Some(100.0));
        assert_eq!(settlement.payer_phone.as_deref(), Some("254708374149"));
        assert_eq!(settlement.transaction_date.as_deref(), Some("20191219102115"));
        assert_eq!(
            settlement.raw["Body"]["stkCallback"]["ResultCode"],
            json!(0)
        );
    }

    #[test]
    fn parses_cancelled_callback_without_metadata() {
        let body = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "8555-67195-1",
                    "CheckoutRequestID": "ws_CO_27072017151044001",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        })
        .to_string();

        let (_, settlement) = parse_callback(body.as_bytes()).unwrap();
        assert_eq!(settlement.status(), PaymentStatus::Failed);
        assert_eq!(settlement.result_desc, "Request cancelled by user");
        assert!(settlement.receipt_number.is_none());
        assert!(settlement.confirmed_amount.is_none());
    }

    #[test]
    fn accepts_string_result_code() {
        let body = json!({
            "Body": { "stkCallback": { "CheckoutRequestID": "ws_CO_1", "ResultCode": "0" } }
        })
        .to_string();
        let (_, settlement) = parse_callback(body.as_bytes()).unwrap();
        assert_eq!(settlement.result_code, 0);
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(parse_callback(b"not json").is_err());
        assert!(parse_callback(b"{}").is_err());
        assert!(parse_callback(&[0xff, 0xfe, b'{', b'}']).is_err());
        assert!(parse_callback(br#"{"Body":{"stkCallback":{"ResultCode":0}}}"#).is_err());
        assert!(matches!(
            parse_callback(
                br#"{"Body":{"stkCallback":{"CheckoutRequestID":"ws_CO_1","ResultCode":"x"}}}"#
            ),
            Err(CallbackParseError::InvalidResultCode(_))
        ));
    }

    #[test]
    fn token_lifetime_accepts_string_or_number() {
        let as_string: AuthResponse =
            serde_json::from_value(json!({ "access_token": "t", "expires_in": "3599" })).unwrap();
        assert_eq!(as_string.expires_in_seconds(), 3599);

        let as_number: AuthResponse =
            serde_json::from_value(json!({ "access_token": "t", "expires_in": 120 })).unwrap();
        assert_eq!(as_number.expires_in_seconds(), 120);

        let missing: AuthResponse = serde_json::from_value(json!({ "access_token": "t" })).unwrap();
        assert_eq!(missing.expires_in_seconds(), 3599);
    }
}
