//! MaxMind GeoIP Locator
//!
//! Implements GeoLocator using a MaxMind GeoLite2/GeoIP2 country database.

use crate::domain::entities::IpLocation;
use crate::domain::ports::GeoLocator;
use anyhow::Context;
use maxminddb::Reader;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CountryRecord {
    iso_code: Option<String>,
    names: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CountryResp {
    country: Option<CountryRecord>,
    registered_country: Option<CountryRecord>,
}

/// MaxMind geolocation adapter.
///
/// Loads the `.mmdb` file once and resolves IPs against it in memory.
pub struct MaxMindGeoLocator {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindGeoLocator {
    /// Load a GeoIP database from a file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let reader = Reader::open_readfile(path)
            .with_context(|| format!("failed to open GeoIP database {}", path))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    fn to_location(ip: &str, resp: CountryResp) -> anyhow::Result<IpLocation> {
        // Anycast and satellite ranges only carry the registered country.
        let country = resp
            .country
            .or(resp.registered_country)
            .with_context(|| format!("no country recorded for {}", ip))?;
        let iso = country
            .iso_code
            .with_context(|| format!("no country code recorded for {}", ip))?;
        let name = country
            .names
            .and_then(|mut names| names.remove("en"))
            .unwrap_or_else(|| iso.clone());

        Ok(IpLocation::new(ip, iso, name))
    }
}

impl GeoLocator for MaxMindGeoLocator {
    fn lookup(&self, ip: &str) -> anyhow::Result<IpLocation> {
        let addr: IpAddr = ip
            .parse()
            .with_context(|| format!("invalid ip address {}", ip))?;
        let resp: CountryResp = self
            .reader
            .lookup(addr)
            .with_context(|| format!("GeoIP lookup failed for {}", ip))?;

        Self::to_location(ip, resp)
    }
}
