//! Maji HTTP client implementation.

use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    AlertList, ApiErrorResponse, MeterStatus, PaymentHistory, TopUpRequest, TopUpResponse,
    UsageReport, UsageResponse,
};

/// Maji billing API client.
///
/// Provides methods for initiating top-ups, reporting consumption and reading meter state.
#[derive(Debug, Clone)]
pub struct MajiClient {
    client: Client,
    base_url: String,
}

impl MajiClient {
    /// Create a new maji client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the maji service (e.g., `"http://maji-billing:8080"`)
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new maji client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the base URL is empty or invalid, or the HTTP
    /// client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base URL is empty".into()));
        }
        let parsed = Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base URL: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::Configuration(format!(
                "base URL cannot carry a path: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .user_agent(options.user_agent)
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Ask the customer to pay for a top-up with an M-Pesa STK push.
    ///
    /// Success means M-Pesa delivered the prompt; the meter is credited when the customer
    /// confirms.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Rejected` for invalid input or a refused push, and
    /// `ClientError::ProviderUnavailable` when M-Pesa cannot be reached.
    pub async fn initiate_top_up(
        &self,
        request: &TopUpRequest,
    ) -> Result<TopUpResponse, ClientError> {
        let url = format!("{}/v1/payments/stk-push", self.base_url);
        tracing::debug!(meter_number = %request.meter_number, amount = request.amount, "Initiating top-up");

        let response = self.client.post(&url).json(request).send().await?;

        self.handle_response(response).await
    }

    /// Report consumed water for a meter.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the meter has never been topped up.
    pub async fn report_usage(
        &self,
        meter_number: impl Into<String>,
        water_used: f64,
    ) -> Result<UsageResponse, ClientError> {
        let url = format!("{}/v1/usage", self.base_url);
        let report = UsageReport {
            meter_number: meter_number.into(),
            water_used,
        };

        let response = self.client.post(&url).json(&report).send().await?;

        self.handle_response(response).await
    }

    /// Get a meter's balance.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the meter has never been topped up.
    pub async fn meter_status(&self, meter_number: &str) -> Result<MeterStatus, ClientError> {
        let url = self.meter_url(meter_number, None)?;

        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// List a meter's payments, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn payment_history(
        &self,
        meter_number: &str,
        limit: Option<usize>,
    ) -> Result<PaymentHistory, ClientError> {
        let url = self.meter_url(meter_number, Some("payments"))?;

        let mut request = self.client.get(url);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// List a meter's alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn alerts(
        &self,
        meter_number: &str,
        unresolved_only: bool,
    ) -> Result<AlertList, ClientError> {
        let url = self.meter_url(meter_number, Some("alerts"))?;

        let response = self
            .client
            .get(url)
            .query(&[("unresolved", unresolved_only)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Build `/v1/meters/{meter}[/{resource}]` with the meter number percent-encoded as one
    /// path segment.
    fn meter_url(&self, meter_number: &str, resource: Option<&str>) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base URL: {e}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ClientError::Configuration(format!("base URL cannot carry a path: {}", self.base_url))
            })?;
            segments.pop_if_empty().extend(["v1", "meters", meter_number]);
            if let Some(resource) = resource {
                segments.push(resource);
            }
        }
        Ok(url)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => Err(classify(status, api_error)),
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Map an error body onto a typed error.
fn classify(status: StatusCode, api_error: ApiErrorResponse) -> ClientError {
    let ApiErrorResponse { error, code, .. } = api_error;
    match code.as_str() {
        "not_found" => ClientError::NotFound { message: error },
        "validation_error" | "upstream_rejected" => ClientError::Rejected {
            code,
            message: error,
        },
        "upstream_unavailable" => ClientError::ProviderUnavailable { message: error },
        _ => ClientError::Api {
            code,
            message: error,
            status: status.as_u16(),
        },
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: concat!("maji-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a request timeout.
    #[must_use]
    pub fn with_timeout(timeout_seconds: u64) -> Self {
        Self {
            timeout_seconds,
            ..Self::default()
        }
    }
}
