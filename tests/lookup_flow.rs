//! Integration tests for the lookup flow
//!
//! Drives LookupService against a wiremock directory, an in-memory
//! geolocator and a JSON blocklist file on disk.

use ipinfo_server::adapters::outbound::{DirectoryConfig, HttpDirectoryClient, JsonFileBlocklistStore};
use ipinfo_server::domain::entities::IpLocation;
use ipinfo_server::domain::ports::{BlocklistStore, GeoLocator};
use ipinfo_server::infrastructure::{BlockList, EventBroadcaster, ResultCache};
use ipinfo_server::{BlockEvent, LookupService, ResolveError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Geolocator backed by a fixed table.
struct TableGeo(HashMap<&'static str, (&'static str, &'static str)>);

impl TableGeo {
    fn new() -> Self {
        Self(HashMap::from([
            ("45.5.164.0", ("BR", "Brazil")),
            ("181.16.0.1", ("AR", "Argentina")),
        ]))
    }
}

impl GeoLocator for TableGeo {
    fn lookup(&self, ip: &str) -> anyhow::Result<IpLocation> {
        match self.0.get(ip) {
            Some((code, name)) => Ok(IpLocation::new(ip, *code, *name)),
            None => anyhow::bail!("address {} not in database", ip),
        }
    }
}

async fn mount_brazil(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/classified_locations/countries/BR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "BR",
            "name": "Brasil",
            "locale": "pt_BR",
            "currency_id": "BRL",
            "decimal_separator": ",",
            "thousands_separator": ".",
            "time_zone": "GMT-03:00"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/currency_conversions/search"))
        .and(query_param("from", "BRL"))
        .and(query_param("to", "USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "currency_base": "BRL",
            "currency_quote": "USD",
            "ratio": 0.18,
            "rate": 0.18,
            "inv_rate": 5.5556
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn build_service(server: &MockServer, blocklist_path: &Path, ttl: Duration) -> LookupService {
    let directory = Arc::new(
        HttpDirectoryClient::new(DirectoryConfig {
            api_url: server.uri(),
            api_key: None,
            timeout: Duration::from_secs(2),
        })
        .unwrap(),
    );

    LookupService::new(
        Arc::new(TableGeo::new()),
        directory.clone(),
        directory,
        Arc::new(JsonFileBlocklistStore::new(blocklist_path)),
        Arc::new(BlockList::new()),
        Arc::new(ResultCache::new(ttl)),
        EventBroadcaster::default(),
    )
}

#[tokio::test]
async fn test_resolve_then_serve_from_cache() {
    let server = MockServer::start().await;
    mount_brazil(&server, 1).await;
    let dir = TempDir::new().unwrap();
    let service = build_service(&server, &dir.path().join("blocked.json"), Duration::from_secs(300));

    let first = service.resolve_ip("45.5.164.0").await.unwrap();
    let second = service.resolve_ip("45.5.164.0").await.unwrap();

    assert_eq!(first.country.id, "BR");
    assert_eq!(first.country.currency_id, "BRL");
    assert_eq!(first.currency_conversion_to_usd.rate, 0.18);
    assert_eq!(first, second);
    assert_eq!(service.cached_count(), 1);
    // Mock expectations (one call each) are verified when the server drops
}

#[tokio::test]
async fn test_expired_result_is_fetched_again() {
    let server = MockServer::start().await;
    mount_brazil(&server, 2).await;
    let dir = TempDir::new().unwrap();
    let service = build_service(&server, &dir.path().join("blocked.json"), Duration::from_millis(50));

    service.resolve_ip("45.5.164.0").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    service.resolve_ip("45.5.164.0").await.unwrap();
}

#[tokio::test]
async fn test_blocked_ip_never_reaches_directory() {
    let server = MockServer::start().await;
    mount_brazil(&server, 0).await;
    let dir = TempDir::new().unwrap();
    let service = build_service(&server, &dir.path().join("blocked.json"), Duration::from_secs(300));

    service.block_ip("45.5.164.0").await.unwrap();

    let err = service.resolve_ip("45.5.164.0").await.unwrap_err();
    assert!(matches!(err, ResolveError::Blocked(_)));
}

#[tokio::test]
async fn test_directory_failure_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/classified_locations/countries/AR"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal_error"))
        .expect(2)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let service = build_service(&server, &dir.path().join("blocked.json"), Duration::from_secs(300));

    for _ in 0..2 {
        let err = service.resolve_ip("181.16.0.1").await.unwrap_err();
        assert!(matches!(err, ResolveError::CountryFetchFailed(_)));
        assert!(err.to_string().contains("500"));
    }
    assert_eq!(service.cached_count(), 0);
}

#[tokio::test]
async fn test_unknown_ip_is_lookup_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = build_service(&server, &dir.path().join("blocked.json"), Duration::from_secs(300));

    let err = service.resolve_ip("192.0.2.1").await.unwrap_err();
    assert!(matches!(err, ResolveError::LookupFailed(_)));
}

#[tokio::test]
async fn test_blocklist_survives_restart() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let blocklist = dir.path().join("blocked.json");

    let before = build_service(&server, &blocklist, Duration::from_secs(300));
    assert_eq!(before.restore_blocklist().await.unwrap(), 0);
    before
        .block_ips(&["203.0.113.5", "198.51.100.7"])
        .await
        .unwrap();
    drop(before);

    let after = build_service(&server, &blocklist, Duration::from_secs(300));
    assert_eq!(after.restore_blocklist().await.unwrap(), 2);
    assert!(after.is_blocked("203.0.113.5"));
    assert!(after.is_blocked("198.51.100.7"));
    assert!(matches!(
        after.resolve_ip("203.0.113.5").await,
        Err(ResolveError::Blocked(_))
    ));
}

#[tokio::test]
async fn test_snapshot_file_is_a_json_array() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let blocklist = dir.path().join("blocked.json");
    let service = build_service(&server, &blocklist, Duration::from_secs(300));

    service.block_ips(&["10.0.0.2", "10.0.0.1"]).await.unwrap();

    let body = std::fs::read_to_string(&blocklist).unwrap();
    let ips: Vec<String> = serde_json::from_str(&body).unwrap();
    assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2"]);

    let store = JsonFileBlocklistStore::new(&blocklist);
    assert_eq!(store.load_snapshot().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_subscribers_see_each_blocked_ip() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = build_service(&server, &dir.path().join("blocked.json"), Duration::from_secs(300));

    let mut first = service.subscribe();
    let mut second = service.subscribe();

    service.block_ips(&["203.0.113.5", "203.0.113.6"]).await.unwrap();

    for sub in [&mut first, &mut second] {
        let mut seen = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                BlockEvent::blocked("203.0.113.5"),
                BlockEvent::blocked("203.0.113.6")
            ]
        );
    }
}

#[tokio::test]
async fn test_unsubscribed_client_gets_nothing_new() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = build_service(&server, &dir.path().join("blocked.json"), Duration::from_secs(300));

    let mut sub = service.subscribe();
    assert!(service.unsubscribe(sub.id()));

    service.block_ip("203.0.113.5").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn test_concurrent_blocks_persist_every_ip() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let blocklist = dir.path().join("blocked.json");
    let service = Arc::new(build_service(&server, &blocklist, Duration::from_secs(300)));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.block_ip(&format!("10.9.0.{}", i)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let persisted = JsonFileBlocklistStore::new(&blocklist)
        .load_snapshot()
        .await
        .unwrap();
    assert_eq!(persisted.len(), 20);
}
