//! Core types and utilities for maji-billing.
//!
//! This crate provides the domain types used throughout the maji-billing service:
//!
//! - **Identifiers**: `MeterId`, `UserId`, `CheckoutRequestId`, `AlertId`, `LogEntryId`
//! - **Payments**: `PaymentRequest`, `PaymentStatus`, `Settlement`
//! - **Balances**: `ClientBalance`, `BalanceStatus`, `ThresholdPolicy`
//! - **Alerts**: `Alert`, `AlertKind`, `AlertPriority`
//! - **Tariff**: `Tariff`
//! - **Telemetry**: `AccountProfile`, `LiveRecord`, `TelemetryLogEntry`
//! - **Phone numbers**: `normalize_msisdn`
//!
//! # Units
//!
//! Payments are in whole currency units (KES). Balances are in water units; a [`Tariff`]
//! converts one into the other. Balances may go negative when consumption overshoots.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod alert;
pub mod balance;
pub mod error;
pub mod ids;
pub mod payment;
pub mod phone;
pub mod tariff;
pub mod telemetry;

pub use alert::{Alert, AlertKind, AlertPriority};
pub use balance::{
    validate_consumption, BalanceStatus, ClientBalance, ThresholdPolicy,
    DEFAULT_LOW_BALANCE_THRESHOLD,
};
pub use error::{BillingError, Result};
pub use ids::{AlertId, CheckoutRequestId, IdError, LogEntryId, MeterId, UserId};
pub use payment::{round_amount, PaymentRequest, PaymentStatus, Settlement, RESULT_CODE_SUCCESS};
pub use phone::{normalize_msisdn, DEFAULT_COUNTRY_CODE};
pub use tariff::{Tariff, DEFAULT_BLOCK_PRICE, DEFAULT_BLOCK_UNITS, DEFAULT_UNITS_PER_CURRENCY};
pub use telemetry::{AccountProfile, LiveRecord, TelemetryFields, TelemetryLogEntry};
