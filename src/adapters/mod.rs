//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP API); outbound adapters
//! implement the domain ports (GeoIP database, REST directory, stores).

pub mod inbound;
pub mod outbound;
