//! Domain Errors
//!
//! Failure kinds surfaced by the lookup service to its callers.
//! Collaborator errors are carried verbatim so callers can decide on retry.

/// Errors returned when resolving an IP to its country result.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The IP is on the blocklist. Policy rejection, not a failure.
    #[error("ip {0} is blocked")]
    Blocked(String),
    #[error("geolocation lookup failed: {0:#}")]
    LookupFailed(anyhow::Error),
    #[error("country directory request failed: {0:#}")]
    CountryFetchFailed(anyhow::Error),
    #[error("currency conversion request failed: {0:#}")]
    CurrencyFetchFailed(anyhow::Error),
}

impl ResolveError {
    /// Whether this error came from an external collaborator.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, ResolveError::Blocked(_))
    }
}

/// Errors returned when blocking IPs.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// The in-memory block took effect but the snapshot could not be saved.
    #[error("blocklist persistence failed: {0}")]
    PersistenceFailed(#[source] StoreError),
}

/// Errors from a blocklist snapshot store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No snapshot has been written yet.
    #[error("no blocklist snapshot found")]
    NotFound,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
