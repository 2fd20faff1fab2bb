//! Maji Client SDK.
//!
//! This crate provides a client library for meters and apps to interact with the maji billing
//! API.
//!
//! # Example
//!
//! ```no_run
//! use maji_client::{MajiClient, TopUpRequest};
//!
//! # async fn example() -> Result<(), maji_client::ClientError> {
//! let client = MajiClient::new("http://maji-billing:8080")?;
//!
//! // Ask the customer to pay 100 KES for meter MTR1
//! let push = client
//!     .initiate_top_up(&TopUpRequest {
//!         phone_number: "0712345678".to_string(),
//!         amount: 100.0,
//!         meter_number: "MTR1".to_string(),
//!         user_id: None,
//!     })
//!     .await?;
//! println!("Waiting for {}", push.checkout_request_id);
//!
//! // Report consumption from the meter
//! let usage = client.report_usage("MTR1", 2.5).await?;
//! println!("{} units left ({:?})", usage.remaining_quantity, usage.status);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, MajiClient};
pub use error::ClientError;
pub use types::*;
