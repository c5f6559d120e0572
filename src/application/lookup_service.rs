//! Lookup Service - Main application use case
//!
//! Coordinates the block list, the result cache and the external
//! collaborators into the two user-facing operations: resolving an IP to
//! its country/currency result, and blocking IPs.

use crate::domain::entities::{BlockEvent, Country, CountryResult, Currency};
use crate::domain::errors::{BlockError, ResolveError, StoreError};
use crate::domain::ports::{BlocklistStore, CountryDirectory, CurrencyDirectory, GeoLocator};
use crate::infrastructure::{BlockList, EventBroadcaster, ResultCache, SubscriberId, Subscription};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lookup service - main application use case.
///
/// All shared state is injected at construction so tests can build
/// isolated instances. In-memory locks are only taken for the check and
/// update steps, never across a collaborator call.
pub struct LookupService {
    geo: Arc<dyn GeoLocator>,
    countries: Arc<dyn CountryDirectory>,
    currencies: Arc<dyn CurrencyDirectory>,
    store: Arc<dyn BlocklistStore>,
    block_list: Arc<BlockList>,
    cache: Arc<ResultCache<Arc<CountryResult>>>,
    events: EventBroadcaster,
    /// Serializes snapshot + save so a later save never writes an older snapshot
    persist_lock: Mutex<()>,
    evict_on_block: bool,
}

impl LookupService {
    /// Create a new lookup service.
    pub fn new(
        geo: Arc<dyn GeoLocator>,
        countries: Arc<dyn CountryDirectory>,
        currencies: Arc<dyn CurrencyDirectory>,
        store: Arc<dyn BlocklistStore>,
        block_list: Arc<BlockList>,
        cache: Arc<ResultCache<Arc<CountryResult>>>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            geo,
            countries,
            currencies,
            store,
            block_list,
            cache,
            events,
            persist_lock: Mutex::new(()),
            evict_on_block: false,
        }
    }

    /// Drop a cached result as soon as its IP gets blocked.
    ///
    /// Off by default: a blocked IP is rejected before the cache is
    /// consulted, so a stale entry is only reclaimed by expiry.
    pub fn with_evict_on_block(mut self, evict: bool) -> Self {
        self.evict_on_block = evict;
        self
    }

    /// Resolve an IP to its country and USD conversion.
    ///
    /// 1. Rejects blocked IPs before touching the cache or collaborators
    /// 2. Serves fresh cached results without external calls
    /// 3. Otherwise geolocates, fetches the country detail and the
    ///    conversion rate, caches the assembled result and returns it
    ///
    /// Nothing is cached when any collaborator fails.
    pub async fn resolve_ip(&self, ip: &str) -> Result<Arc<CountryResult>, ResolveError> {
        if self.block_list.is_blocked(ip) {
            tracing::debug!("rejected lookup for blocked ip {}", ip);
            return Err(ResolveError::Blocked(ip.to_string()));
        }

        if let Some(hit) = self.cache.get(ip) {
            tracing::debug!("cache hit for {}", ip);
            return Ok(hit);
        }

        let location = self.geo.lookup(ip).map_err(ResolveError::LookupFailed)?;

        let country = self
            .countries
            .fetch_country_detail(&location.country_code)
            .await
            .map_err(ResolveError::CountryFetchFailed)?;

        let conversion = self
            .currencies
            .fetch_conversion_to_usd(&country.currency_id)
            .await
            .map_err(ResolveError::CurrencyFetchFailed)?;

        let result = Arc::new(CountryResult::new(country, conversion));
        self.cache.set(ip, result.clone());

        tracing::debug!(
            "resolved {} -> {} ({})",
            ip,
            location.country_code,
            result.country.currency_id
        );
        Ok(result)
    }

    /// Block a single IP.
    pub async fn block_ip(&self, ip: &str) -> Result<(), BlockError> {
        self.block_ips(&[ip]).await.map(|_| ())
    }

    /// Block a batch of IPs and return how many were requested.
    ///
    /// The in-memory block takes effect before persistence. A failed save
    /// is reported as `PersistenceFailed` but the block is kept. One
    /// `BlockEvent` per IP is published from a spawned task, so slow
    /// subscribers never delay or fail this call.
    pub async fn block_ips<S: AsRef<str>>(&self, ips: &[S]) -> Result<usize, BlockError> {
        let mut events = Vec::with_capacity(ips.len());
        for ip in ips {
            let ip = ip.as_ref();
            self.block_list.add(ip);
            if self.evict_on_block && self.cache.delete(ip) {
                tracing::debug!("evicted cached result for blocked ip {}", ip);
            }
            events.push(BlockEvent::blocked(ip));
        }

        let persisted = self.persist().await;
        self.spawn_publish(events);

        match persisted {
            Ok(()) => {
                tracing::info!("blocked {} ip(s)", ips.len());
                Ok(ips.len())
            }
            Err(e) => {
                tracing::warn!("blocked {} ip(s) but failed to persist: {}", ips.len(), e);
                Err(BlockError::PersistenceFailed(e))
            }
        }
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.block_list.get_all();
        self.store.save_snapshot(&snapshot).await
    }

    fn spawn_publish(&self, events: Vec<BlockEvent>) {
        if events.is_empty() {
            return;
        }

        let broadcaster = self.events.clone();
        tokio::spawn(async move {
            for event in events {
                broadcaster.publish(event).await;
            }
        });
    }

    /// Load the persisted blocklist and merge it into memory.
    ///
    /// A missing snapshot means "start empty". Returns the number of IPs
    /// that were added.
    pub async fn restore_blocklist(&self) -> Result<usize, StoreError> {
        match self.store.load_snapshot().await {
            Ok(ips) => {
                let added = self.block_list.extend(ips);
                tracing::info!("restored {} blocked ip(s)", added);
                Ok(added)
            }
            Err(StoreError::NotFound) => {
                tracing::info!("no blocklist snapshot found, starting empty");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_blocked(&self, ip: &str) -> bool {
        self.block_list.is_blocked(ip)
    }

    /// Subscribe to block events.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    /// List every country known to the directory.
    pub async fn fetch_countries(&self) -> anyhow::Result<Vec<Country>> {
        self.countries.fetch_all_countries().await
    }

    /// List every currency known to the directory.
    pub async fn fetch_currencies(&self) -> anyhow::Result<Vec<Currency>> {
        self.currencies.fetch_all_currencies().await
    }

    pub fn blocked_count(&self) -> usize {
        self.block_list.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
