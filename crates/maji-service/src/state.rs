//! Application state.

use std::sync::Arc;

use maji_store::Store;

use crate::config::ServiceConfig;
use crate::ledger::Ledger;
use crate::mirror::TelemetryMirror;
use crate::mpesa::MpesaClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// M-Pesa client for top-ups (optional).
    pub mpesa: Option<Arc<MpesaClient>>,

    /// Balance updater and consumption recorder.
    pub ledger: Ledger,

    /// Live telemetry mirror.
    pub mirror: TelemetryMirror,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let mpesa = config
            .mpesa
            .clone()
            .and_then(|mpesa_config| {
                let base_url = mpesa_config.base_url.clone();
                match MpesaClient::new(mpesa_config) {
                    Ok(client) => {
                        tracing::info!(base_url = %base_url, "M-Pesa integration enabled");
                        Some(Arc::new(client))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create M-Pesa client");
                        None
                    }
                }
            });

        if mpesa.is_none() {
            tracing::warn!("M-Pesa not configured - top-ups will not be available");
        }

        let ledger = Ledger::new(store.clone(), config.tariff, config.threshold);
        let mirror = TelemetryMirror::new(store.clone());

        Self {
            store,
            config,
            mpesa,
            ledger,
            mirror,
        }
    }

    /// Check if M-Pesa is configured.
    #[must_use]
    pub fn has_mpesa(&self) -> bool {
        self.mpesa.is_some()
    }
}
