//! Block List
//!
//! Concurrency-safe set of blocked IP addresses.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Set of IPs that must not be resolved.
///
/// A single mutex guards the whole set and is shared by readers and
/// writers, so every operation is linearizable. IPs are kept in their
/// textual form; format validation happens before they get here.
#[derive(Debug, Default)]
pub struct BlockList {
    ips: Mutex<HashSet<String>>,
}

impl BlockList {
    /// Create an empty block list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block an IP. Returns `true` if it was not blocked before.
    pub fn add(&self, ip: &str) -> bool {
        self.ips.lock().insert(ip.to_string())
    }

    /// Check whether an IP is blocked.
    pub fn is_blocked(&self, ip: &str) -> bool {
        self.ips.lock().contains(ip)
    }

    /// Unblock an IP. Returns `true` if it was blocked.
    pub fn remove(&self, ip: &str) -> bool {
        self.ips.lock().remove(ip)
    }

    /// Snapshot of every blocked IP, in no particular order.
    pub fn get_all(&self) -> Vec<String> {
        self.ips.lock().iter().cloned().collect()
    }

    /// Merge a batch of IPs (e.g. a loaded snapshot) under one lock hold.
    ///
    /// Returns the number of IPs that were newly added.
    pub fn extend<I, S>(&self, ips: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.ips.lock();
        let mut added = 0;
        for ip in ips {
            if guard.insert(ip.into()) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.ips.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.lock().is_empty()
    }
}
