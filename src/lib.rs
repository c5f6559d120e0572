//! ipinfo-server Library
//!
//! Resolves client IPs to country and currency information, keeps an
//! operator-managed blocklist, and streams block notifications.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::LookupService;
pub use config::{load_config, Config};
pub use domain::entities::{BlockEvent, BlockEventType, CountryResult, IpLocation};
pub use domain::errors::{BlockError, ResolveError, StoreError};
pub use domain::ports::{BlocklistStore, CountryDirectory, CurrencyDirectory, GeoLocator};
pub use infrastructure::{BlockList, EventBroadcaster, ResultCache, Subscription};
