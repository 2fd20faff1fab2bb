//! Water tariff configuration.
//!
//! A tariff converts a confirmed payment amount into metered water units.

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

/// Default units credited per currency unit under the flat tariff.
pub const DEFAULT_UNITS_PER_CURRENCY: f64 = 1.0;

/// Default block price (currency units) for the block tariff.
pub const DEFAULT_BLOCK_PRICE: f64 = 50.0;

/// Default units per block for the block tariff.
pub const DEFAULT_BLOCK_UNITS: f64 = 1000.0;

/// How payments are converted into water units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Tariff {
    /// Flat rate: `quantity = amount × units_per_currency`.
    PerUnit {
        /// Units credited for each currency unit paid.
        units_per_currency: f64,
    },

    /// Block rate: every `block_price` currency units buy `block_units` units.
    ///
    /// `quantity = (amount / block_price) × block_units`. Partial blocks are credited
    /// proportionally.
    Block {
        /// Price of one block in currency units.
        block_price: f64,
        /// Units in one block.
        block_units: f64,
    },
}

impl Default for Tariff {
    fn default() -> Self {
        Self::PerUnit {
            units_per_currency: DEFAULT_UNITS_PER_CURRENCY,
        }
    }
}

impl Tariff {
    /// Build a validated flat tariff.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Configuration` if the rate is not finite and positive.
    pub fn per_unit(units_per_currency: f64) -> Result<Self> {
        let tariff = Self::PerUnit { units_per_currency };
        tariff.validate()?;
        Ok(tariff)
    }

    /// Build a validated block tariff.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Configuration` if either parameter is not finite and positive.
    pub fn block(block_price: f64, block_units: f64) -> Result<Self> {
        let tariff = Self::Block {
            block_price,
            block_units,
        };
        tariff.validate()?;
        Ok(tariff)
    }

    /// Check that all rate parameters are finite and positive.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Configuration` naming the offending parameter.
    pub fn validate(&self) -> Result<()> {
        let params = match *self {
            Self::PerUnit { units_per_currency } => vec![("units_per_currency", units_per_currency)],
            Self::Block {
                block_price,
                block_units,
            } => vec![("block_price", block_price), ("block_units", block_units)],
        };

        for (name, value) in params {
            if !value.is_finite() || value <= 0.0 {
                return Err(BillingError::Configuration(format!(
                    "tariff {name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Convert a paid amount into water units.
    #[must_use]
    pub fn quantity_for(&self, amount: f64) -> f64 {
        match self {
            Self::PerUnit { units_per_currency } => amount * units_per_currency,
            Self::Block {
                block_price,
                block_units,
            } => (amount / block_price) * block_units,
        }
    }
}
