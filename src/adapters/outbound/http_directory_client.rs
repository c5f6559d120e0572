//! HTTP Directory Client
//!
//! Implements CountryDirectory and CurrencyDirectory against a
//! MercadoLibre-style REST API.

use crate::domain::entities::{Country, CountryDetail, Currency, CurrencyConversion};
use crate::domain::ports::{CountryDirectory, CurrencyDirectory};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Configuration for the directory client.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Base URL of the API, without trailing slash
    pub api_url: String,
    /// Bearer token sent when present
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.mercadolibre.com".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// REST client for the country and currency directories.
///
/// Every call is a single request; retries are left to the caller.
pub struct HttpDirectoryClient {
    config: DirectoryConfig,
    client: reqwest::Client,
}

impl HttpDirectoryClient {
    pub fn new(config: DirectoryConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GET {} failed: {} - {}", url, status, body);
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CountryDirectory for HttpDirectoryClient {
    async fn fetch_all_countries(&self) -> anyhow::Result<Vec<Country>> {
        self.get_json("/classified_locations/countries").await
    }

    async fn fetch_country_detail(&self, country_id: &str) -> anyhow::Result<CountryDetail> {
        self.get_json(&format!("/classified_locations/countries/{}", country_id))
            .await
    }
}

#[async_trait]
impl CurrencyDirectory for HttpDirectoryClient {
    async fn fetch_all_currencies(&self) -> anyhow::Result<Vec<Currency>> {
        self.get_json("/currencies").await
    }

    async fn fetch_conversion_to_usd(
        &self,
        currency_id: &str,
    ) -> anyhow::Result<CurrencyConversion> {
        self.get_json(&format!(
            "/currency_conversions/search?from={}&to=USD",
            currency_id
        ))
        .await
    }
}
