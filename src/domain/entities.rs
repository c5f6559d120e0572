//! Domain Entities - Core business objects
//!
//! Records exchanged with the country/currency directory and the
//! geolocation database, plus the composite result served to clients
//! and the block events fanned out to subscribers.

use serde::{Deserialize, Serialize};

/// Country summary as listed by the country directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    /// Country identifier (ISO 3166-1 alpha-2: BR, AR, ...)
    pub id: String,
    pub name: String,
    pub locale: String,
    /// Identifier of the local currency (BRL, ARS, ...)
    pub currency_id: String,
}

/// Latitude/longitude pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInformation {
    pub location: Location,
}

/// A state/province of a country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryState {
    pub id: String,
    pub name: String,
}

/// Detailed country record returned by the country directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryDetail {
    pub id: String,
    pub name: String,
    pub locale: String,
    pub currency_id: String,
    #[serde(default)]
    pub decimal_separator: String,
    #[serde(default)]
    pub thousands_separator: String,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default)]
    pub geo_information: Option<GeoInformation>,
    #[serde(default)]
    pub states: Vec<CountryState>,
}

/// Currency as listed by the currency directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    pub symbol: String,
    pub description: String,
    pub decimal_places: u8,
}

/// Conversion rate from a currency to USD, with its validity window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyConversion {
    #[serde(default)]
    pub currency_base: String,
    #[serde(default)]
    pub currency_quote: String,
    #[serde(default)]
    pub ratio: f64,
    pub rate: f64,
    #[serde(default)]
    pub inv_rate: f64,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
}

/// Result of a geolocation lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpLocation {
    pub ip: String,
    /// Country code (ISO 3166-1 alpha-2)
    pub country_code: String,
    pub country_name: String,
}

impl IpLocation {
    pub fn new(
        ip: impl Into<String>,
        country_code: impl Into<String>,
        country_name: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            country_code: country_code.into(),
            country_name: country_name.into(),
        }
    }
}

/// Composite lookup result: country detail plus its USD conversion.
///
/// This is the value held in the result cache under the client IP.
/// Once assembled it is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryResult {
    #[serde(flatten)]
    pub country: CountryDetail,
    pub currency_conversion_to_usd: CurrencyConversion,
}

impl CountryResult {
    pub fn new(country: CountryDetail, conversion: CurrencyConversion) -> Self {
        Self {
            country,
            currency_conversion_to_usd: conversion,
        }
    }
}

/// Kind of a block notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockEventType {
    Blocked,
}

/// Notification emitted when an IP gets blocked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockEvent {
    pub ip: String,
    pub event_type: BlockEventType,
}

impl BlockEvent {
    pub fn blocked(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            event_type: BlockEventType::Blocked,
        }
    }
}
