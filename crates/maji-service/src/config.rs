//! Service configuration.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use maji_core::{
    Tariff, ThresholdPolicy, DEFAULT_BLOCK_PRICE, DEFAULT_BLOCK_UNITS, DEFAULT_COUNTRY_CODE,
    DEFAULT_LOW_BALANCE_THRESHOLD, DEFAULT_UNITS_PER_CURRENCY,
};

/// Shortest allowed timeout for M-Pesa calls.
pub const MPESA_MIN_TIMEOUT_SECONDS: u64 = 10;

/// Longest allowed timeout for M-Pesa calls.
pub const MPESA_MAX_TIMEOUT_SECONDS: u64 = 30;

/// Default page size for history listings.
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 10;

/// Default upper bound for history listings.
pub const DEFAULT_HISTORY_MAX_PAGE_SIZE: usize = 50;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/maji").
    pub data_dir: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// M-Pesa Daraja credentials (optional; top-ups are unavailable without them).
    pub mpesa: Option<MpesaConfig>,

    /// Country calling code used for phone normalization.
    pub country_code: String,

    /// Payment to water-unit conversion.
    pub tariff: Tariff,

    /// Low-balance and depletion thresholds.
    pub threshold: ThresholdPolicy,

    /// Default number of entries returned by history listings.
    pub history_page_size: usize,

    /// Maximum number of entries returned by history listings.
    pub history_max_page_size: usize,
}

/// M-Pesa API environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MpesaEnvironment {
    /// Daraja sandbox.
    Sandbox,
    /// Live API.
    Production,
}

impl MpesaEnvironment {
    /// Base URL of the environment.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.safaricom.co.ke",
            Self::Production => "https://api.safaricom.co.ke",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Some(Self::Sandbox),
            "production" | "live" => Some(Self::Production),
            _ => None,
        }
    }
}

/// M-Pesa Daraja settings.
#[derive(Clone)]
pub struct MpesaConfig {
    /// API base URL, without a trailing slash.
    pub base_url: String,

    /// Daraja app consumer key.
    pub consumer_key: String,

    /// Daraja app consumer secret.
    pub consumer_secret: String,

    /// Paybill or till number.
    pub shortcode: String,

    /// Lipa na M-Pesa Online passkey.
    pub passkey: String,

    /// Public URL M-Pesa posts STK results to.
    pub callback_url: String,

    /// Timeout for each call to M-Pesa.
    pub timeout: Duration,
}

impl fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("base_url", &self.base_url)
            .field("consumer_key", &"[redacted]")
            .field("consumer_secret", &"[redacted]")
            .field("shortcode", &self.shortcode)
            .field("passkey", &"[redacted]")
            .field("callback_url", &self.callback_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// M-Pesa secrets file structure.
#[derive(Debug, Deserialize)]
struct MpesaSecrets {
    consumer_key: String,
    consumer_secret: String,
    shortcode: String,
    passkey: String,
    #[serde(default)]
    callback_url: Option<String>,
    #[serde(default)]
    environment: Option<MpesaEnvironment>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    ///
    /// Unparseable or invalid values fall back to their defaults with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            mpesa: load_mpesa_config(),
            country_code: std::env::var("COUNTRY_CODE")
                .ok()
                .map(|c| c.trim().trim_start_matches('+').to_string())
                .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_digit()))
                .unwrap_or(defaults.country_code),
            tariff: load_tariff(),
            threshold: load_threshold(),
            history_page_size: env_parse("HISTORY_PAGE_SIZE")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.history_page_size),
            history_max_page_size: env_parse("HISTORY_MAX_PAGE_SIZE")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.history_max_page_size),
        }
    }

    /// Clamp a requested page size to `1..=history_max_page_size`.
    #[must_use]
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.history_page_size)
            .clamp(1, self.history_max_page_size.max(1))
    }
}

/// Parse an environment variable, ignoring absent or malformed values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = %name, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

/// Build the tariff from `TARIFF_*` variables.
fn load_tariff() -> Tariff {
    let mode = std::env::var("TARIFF_MODE").unwrap_or_else(|_| "per_unit".into());
    let tariff = match mode.trim() {
        "block" => Tariff::block(
            env_parse("TARIFF_BLOCK_PRICE").unwrap_or(DEFAULT_BLOCK_PRICE),
            env_parse("TARIFF_BLOCK_UNITS").unwrap_or(DEFAULT_BLOCK_UNITS),
        ),
        "per_unit" => Tariff::per_unit(
            env_parse("TARIFF_UNITS_PER_CURRENCY").unwrap_or(DEFAULT_UNITS_PER_CURRENCY),
        ),
        other => {
            tracing::warn!(mode = %other, "Unknown TARIFF_MODE, using per_unit");
            Ok(Tariff::default())
        }
    };

    tariff.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Invalid tariff settings, using default");
        Tariff::default()
    })
}

/// Build the threshold policy from `LOW_BALANCE_THRESHOLD`.
fn load_threshold() -> ThresholdPolicy {
    let threshold = env_parse("LOW_BALANCE_THRESHOLD").unwrap_or(DEFAULT_LOW_BALANCE_THRESHOLD);
    ThresholdPolicy::new(threshold).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Invalid LOW_BALANCE_THRESHOLD, using default");
        ThresholdPolicy::default()
    })
}

/// Clamp the M-Pesa timeout into the supported range.
#[must_use]
pub fn clamp_mpesa_timeout(seconds: u64) -> Duration {
    Duration::from_secs(seconds.clamp(MPESA_MIN_TIMEOUT_SECONDS, MPESA_MAX_TIMEOUT_SECONDS))
}

/// Load M-Pesa settings from file or environment.
fn load_mpesa_config() -> Option<MpesaConfig> {
    let timeout = clamp_mpesa_timeout(env_parse("MPESA_TIMEOUT_SECONDS").unwrap_or(30));
    let env_environment = std::env::var("MPESA_ENVIRONMENT")
        .ok()
        .and_then(|e| MpesaEnvironment::parse(&e));
    let base_url_override = std::env::var("MPESA_BASE_URL").ok();
    let env_callback_url = std::env::var("MPESA_CALLBACK_URL").ok();

    let base_url = |environment: Option<MpesaEnvironment>| {
        base_url_override
            .clone()
            .unwrap_or_else(|| {
                environment
                    .unwrap_or(MpesaEnvironment::Sandbox)
                    .base_url()
                    .to_string()
            })
            .trim_end_matches('/')
            .to_string()
    };

    let secret_paths = [
        ".secrets/mpesa.json",
        "maji/.secrets/mpesa.json",
        "../.secrets/mpesa.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<MpesaSecrets>(path) {
            tracing::info!(path = %path, "Loaded M-Pesa secrets from file");
            let Some(callback_url) = secrets.callback_url.or_else(|| env_callback_url.clone())
            else {
                tracing::warn!("M-Pesa secrets have no callback URL - top-ups disabled");
                return None;
            };
            return Some(MpesaConfig {
                base_url: base_url(env_environment.or(secrets.environment)),
                consumer_key: secrets.consumer_key,
                consumer_secret: secrets.consumer_secret,
                shortcode: secrets.shortcode,
                passkey: secrets.passkey,
                callback_url,
                timeout,
            });
        }
    }

    // Fall back to environment variables
    tracing::debug!("M-Pesa secrets file not found, using environment variables");
    let consumer_key = std::env::var("MPESA_CONSUMER_KEY").ok()?;
    let consumer_secret = std::env::var("MPESA_CONSUMER_SECRET").ok()?;
    let shortcode = std::env::var("MPESA_SHORTCODE").ok()?;
    let passkey = std::env::var("MPESA_PASSKEY").ok()?;
    let Some(callback_url) = env_callback_url else {
        tracing::warn!("MPESA_CALLBACK_URL not set - top-ups disabled");
        return None;
    };

    Some(MpesaConfig {
        base_url: base_url(env_environment),
        consumer_key,
        consumer_secret,
        shortcode,
        passkey,
        callback_url,
        timeout,
    })
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/maji".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            mpesa: None,
            country_code: DEFAULT_COUNTRY_CODE.into(),
            tariff: Tariff::default(),
            threshold: ThresholdPolicy::default(),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            history_max_page_size: DEFAULT_HISTORY_MAX_PAGE_SIZE,
        }
    }
}
