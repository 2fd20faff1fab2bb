//! Client error types.

/// Errors that can occur when using the maji client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The meter, payment or alert does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Server description.
        message: String,
    },

    /// The input was rejected by the service or by M-Pesa.
    #[error("rejected: {message}")]
    Rejected {
        /// `validation_error` or `upstream_rejected`.
        code: String,
        /// Server description.
        message: String,
    },

    /// M-Pesa is unreachable or not configured; retrying later may succeed.
    #[error("payment provider unavailable: {message}")]
    ProviderUnavailable {
        /// Server description.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::ProviderUnavailable { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound { .. }
            | Self::Rejected { .. }
            | Self::Serialization(_)
            | Self::Configuration(_) => false,
        }
    }
}
