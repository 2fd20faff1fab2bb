//! Maji HTTP API Service.
//!
//! This crate provides the HTTP API for maji prepaid water billing:
//!
//! - M-Pesa STK push top-ups and the result callback
//! - Exactly-once crediting of meter balances
//! - Consumption reports with low-balance and shutoff alerts
//! - Live telemetry mirroring into per-meter logs
//!
//! # Flow
//!
//! `POST /v1/payments/stk-push` sends a push to the payer's phone and records a pending payment.
//! M-Pesa later posts the result to `/webhooks/mpesa`; a successful result is converted into
//! water units by the configured tariff and credited to the meter once, however often the
//! callback is retried.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers over the synchronous store are still async

pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod mirror;
pub mod mpesa;
pub mod routes;
pub mod state;

pub use config::{MpesaConfig, MpesaEnvironment, ServiceConfig};
pub use error::ApiError;
pub use ledger::{CallbackOutcome, Ledger};
pub use mirror::TelemetryMirror;
pub use mpesa::{MpesaClient, MpesaError};
pub use routes::create_router;
pub use state::AppState;
