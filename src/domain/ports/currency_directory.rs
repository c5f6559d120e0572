//! Currency Directory Port
//!
//! Defines the interface for fetching currencies and USD conversion rates.

use crate::domain::entities::{Currency, CurrencyConversion};
use async_trait::async_trait;

/// Directory of currencies and their conversion rates.
#[async_trait]
pub trait CurrencyDirectory: Send + Sync {
    /// List every currency known to the directory.
    async fn fetch_all_currencies(&self) -> anyhow::Result<Vec<Currency>>;

    /// Fetch the current conversion from `currency_id` to USD.
    async fn fetch_conversion_to_usd(&self, currency_id: &str)
        -> anyhow::Result<CurrencyConversion>;
}
