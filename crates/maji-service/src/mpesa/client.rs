//! M-Pesa Daraja API client implementation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use tokio::sync::Mutex;

use super::types::{
    ApiErrorResponse, AuthResponse, StkPushRequest, StkPushResponse, ACCOUNT_REFERENCE_MAX_LEN,
    RESPONSE_CODE_ACCEPTED, TRANSACTION_TYPE_PAYBILL,
};
use crate::config::MpesaConfig;

/// Cached tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN_SECONDS: i64 = 300;

/// Error type for M-Pesa operations.
#[derive(Debug, thiserror::Error)]
pub enum MpesaError {
    /// The OAuth token exchange failed.
    #[error("M-Pesa auth failed: {0}")]
    Auth(String),

    /// M-Pesa refused the request.
    #[error("M-Pesa rejected the request: {message}")]
    Rejected {
        /// Daraja error or response code.
        code: Option<String>,
        /// Provider description.
        message: String,
    },

    /// M-Pesa could not be reached, timed out or failed internally.
    #[error("M-Pesa unavailable: {0}")]
    Unavailable(String),
}

/// A push-payment to submit.
#[derive(Debug, Clone)]
pub struct StkPush<'a> {
    /// Normalized payer phone number.
    pub phone: &'a str,
    /// Whole currency units.
    pub amount: u64,
    /// Meter number; truncated to 12 characters.
    pub account_reference: &'a str,
    /// Description shown in the M-Pesa statement.
    pub description: &'a str,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// M-Pesa Daraja API client.
#[derive(Debug)]
pub struct MpesaClient {
    client: Client,
    config: MpesaConfig,
    token: Mutex<Option<CachedToken>>,
}

impl MpesaClient {
    /// Create a new M-Pesa client.
    ///
    /// # Errors
    ///
    /// Returns `MpesaError::Unavailable` if the HTTP client cannot be built.
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MpesaError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    /// STK password: base64(shortcode + passkey + timestamp).
    #[must_use]
    pub fn password(&self, timestamp: &str) -> String {
        BASE64.encode(format!(
            "{}{}{}",
            self.config.shortcode, self.config.passkey, timestamp
        ))
    }

    /// Get a bearer token, reusing the cached one until shortly before it expires.
    ///
    /// # Errors
    ///
    /// Returns `MpesaError::Auth` if the token request fails for any reason.
    pub async fn access_token(&self) -> Result<String, MpesaError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at > now + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECONDS) {
                tracing::debug!("Using cached M-Pesa access token");
                return Ok(token.token.clone());
            }
        }

        tracing::debug!("Requesting new M-Pesa access token");
        let response = self
            .client
            .get(format!("{}/oauth/v1/generate", self.config.base_url))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| MpesaError::Auth(describe_transport_error(&e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "M-Pesa token request failed");
            return Err(MpesaError::Auth(format!("token endpoint returned {status}")));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| MpesaError::Auth(format!("invalid token response: {e}")))?;

        let expires_at = now + ChronoDuration::seconds(auth.expires_in_seconds());
        *cached = Some(CachedToken {
            token: auth.access_token.clone(),
            expires_at,
        });

        tracing::info!(expires_at = %expires_at, "M-Pesa access token obtained");
        Ok(auth.access_token)
    }

    /// Submit an STK push.
    ///
    /// # Errors
    ///
    /// - `MpesaError::Auth` if no token can be obtained.
    /// - `MpesaError::Rejected` if M-Pesa answers with a 4xx or a non-zero `ResponseCode`.
    /// - `MpesaError::Unavailable` on timeouts, connection failures, 5xx or unreadable bodies.
    pub async fn stk_push(&self, push: &StkPush<'_>) -> Result<StkPushResponse, MpesaError> {
        let access_token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();

        let request = StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password: self.password(&timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE_PAYBILL.to_string(),
            amount: push.amount,
            party_a: push.phone.to_string(),
            party_b: self.config.shortcode.clone(),
            phone_number: push.phone.to_string(),
            callback_url: self.config.callback_url.clone(),
            account_reference: truncate_reference(push.account_reference),
            transaction_desc: push.description.to_string(),
        };

        tracing::debug!(
            amount = push.amount,
            account_reference = %request.account_reference,
            "Submitting STK push"
        );

        let response = self
            .client
            .post(format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url))
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| MpesaError::Unavailable(describe_transport_error(&e)))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let parsed: Option<ApiErrorResponse> = serde_json::from_str(&body).ok();
            let (code, message) = parsed
                .map(|e| (e.error_code, e.error_message))
                .unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "STK push rejected");
            return Err(MpesaError::Rejected {
                code,
                message: message.unwrap_or_else(|| format!("M-Pesa returned {status}")),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "STK push failed");
            return Err(MpesaError::Unavailable(format!("M-Pesa returned {status}")));
        }

        let push_response: StkPushResponse = response
            .json()
            .await
            .map_err(|e| MpesaError::Unavailable(format!("invalid STK push response: {e}")))?;

        if push_response.response_code != RESPONSE_CODE_ACCEPTED {
            return Err(MpesaError::Rejected {
                code: Some(push_response.response_code),
                message: push_response.response_description,
            });
        }

        tracing::info!(
            checkout_request_id = %push_response.checkout_request_id,
            merchant_request_id = %push_response.merchant_request_id,
            "STK push accepted"
        );
        Ok(push_response)
    }
}

/// Truncate an account reference to the length M-Pesa accepts.
fn truncate_reference(reference: &str) -> String {
    reference.chars().take(ACCOUNT_REFERENCE_MAX_LEN).collect()
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    }
}
