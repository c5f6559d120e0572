//! Country Directory Port
//!
//! Defines the interface for fetching country metadata.

use crate::domain::entities::{Country, CountryDetail};
use async_trait::async_trait;

/// Directory of countries and their metadata.
#[async_trait]
pub trait CountryDirectory: Send + Sync {
    /// List every country known to the directory.
    async fn fetch_all_countries(&self) -> anyhow::Result<Vec<Country>>;

    /// Fetch the detailed record for a single country.
    async fn fetch_country_detail(&self, country_id: &str) -> anyhow::Result<CountryDetail>;
}
