mod http_directory_client;
mod json_file_blocklist_store;
mod maxmind_geo_locator;
mod sqlite_blocklist_store;

pub use http_directory_client::{DirectoryConfig, HttpDirectoryClient};
pub use json_file_blocklist_store::JsonFileBlocklistStore;
pub use maxmind_geo_locator::MaxMindGeoLocator;
pub use sqlite_blocklist_store::SqliteBlocklistStore;
