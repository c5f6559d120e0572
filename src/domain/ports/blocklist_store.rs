//! Blocklist Store Port
//!
//! Defines the interface for durable blocklist snapshots.

use crate::domain::errors::StoreError;
use async_trait::async_trait;

/// Durable storage for the blocklist.
///
/// Every save replaces the previous snapshot wholesale; there is no
/// append log. Implementations serialize concurrent writes.
#[async_trait]
pub trait BlocklistStore: Send + Sync {
    /// Replace the stored snapshot with `ips`.
    async fn save_snapshot(&self, ips: &[String]) -> Result<(), StoreError>;

    /// Load the last saved snapshot.
    ///
    /// Returns `StoreError::NotFound` when nothing has been saved yet.
    async fn load_snapshot(&self) -> Result<Vec<String>, StoreError>;
}
