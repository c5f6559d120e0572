mod blocklist_store;
mod country_directory;
mod currency_directory;
mod geo_locator;

pub use blocklist_store::BlocklistStore;
pub use country_directory::CountryDirectory;
pub use currency_directory::CurrencyDirectory;
pub use geo_locator::GeoLocator;
