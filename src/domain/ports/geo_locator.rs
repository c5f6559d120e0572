//! Geolocation Port
//!
//! Defines the interface for mapping IP addresses to countries.

use crate::domain::entities::IpLocation;

/// Resolver for IP address to country.
///
/// This is an outbound port that abstracts the geolocation database.
/// Implementations may use MaxMind GeoLite2, IP2Location, or a remote service.
pub trait GeoLocator: Send + Sync {
    /// Look up the country an IP address belongs to.
    ///
    /// The IP is passed in textual form; an implementation rejects
    /// addresses it cannot parse or does not know about.
    fn lookup(&self, ip: &str) -> anyhow::Result<IpLocation>;
}
