//! M-Pesa Daraja integration.
//!
//! M-Pesa handles:
//! - OAuth client-credential tokens (cached until shortly before expiry)
//! - STK push (Lipa na M-Pesa Online) submission
//! - Parsing of the asynchronous STK result callback

pub mod client;
pub mod types;

pub use client::{MpesaClient, MpesaError, StkPush};
pub use types::{parse_callback, CallbackParseError};
