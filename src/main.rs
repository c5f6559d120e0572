//! ipinfo-server - IP to country/currency resolver
//!
//! This is the composition root that wires together all the components.

use anyhow::Context;
use ipinfo_server::adapters::inbound::ApiServer;
use ipinfo_server::adapters::outbound::{
    DirectoryConfig, HttpDirectoryClient, JsonFileBlocklistStore, MaxMindGeoLocator,
    SqliteBlocklistStore,
};
use ipinfo_server::config::{load_config, BlocklistBackend};
use ipinfo_server::domain::ports::BlocklistStore;
use ipinfo_server::infrastructure::{
    shutdown_signal, BlockList, EventBroadcaster, ResultCache, ShutdownController,
};
use ipinfo_server::LookupService;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting ipinfo-server listen={} backend={:?}",
        cfg.listen_addr,
        cfg.blocklist_backend
    );

    // ===== COMPOSITION ROOT =====

    // 1. Outbound adapters

    let geo = Arc::new(
        MaxMindGeoLocator::from_file(&cfg.ip_store_path)
            .context("geolocation database is required")?,
    );
    tracing::info!("GeoIP DB loaded from {}", cfg.ip_store_path);

    let directory = Arc::new(HttpDirectoryClient::new(DirectoryConfig {
        api_url: cfg.api_url.clone(),
        api_key: cfg.api_key.clone(),
        timeout: cfg.http_timeout(),
    })?);

    let store: Arc<dyn BlocklistStore> = match cfg.blocklist_backend {
        BlocklistBackend::Json => Arc::new(JsonFileBlocklistStore::new(&cfg.blocked_ips_path)),
        BlocklistBackend::Sqlite => Arc::new(SqliteBlocklistStore::new(&cfg.blocked_ips_path)),
    };

    // 2. In-process state

    let cache = Arc::new(ResultCache::new(cfg.cache_ttl()));
    if let Some(interval) = cfg.cache_sweep_interval() {
        cache.start_sweeper(interval);
    }
    tracing::info!("result cache ttl {:?}", cache.ttl());

    let events = EventBroadcaster::new(cfg.broadcaster_config());

    // 3. Application service

    let service = Arc::new(
        LookupService::new(
            geo,
            directory.clone(),
            directory,
            store,
            Arc::new(BlockList::new()),
            cache,
            events,
        )
        .with_evict_on_block(cfg.evict_on_block),
    );

    service
        .restore_blocklist()
        .await
        .with_context(|| format!("failed to load blocklist from {}", cfg.blocked_ips_path))?;

    // 4. Inbound adapter

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = ApiServer::new(cfg.listen_addr.clone(), service, shutdown.clone())
        .with_static_dir(&cfg.static_dir);
    server.run().await?;

    shutdown.wait_for_drain(Duration::from_secs(5)).await;
    tracing::info!("shutdown complete");
    Ok(())
}
