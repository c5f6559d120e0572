//! HTTP API Server
//!
//! Country lookup by IP, IP blocking, a Server-Sent-Events feed of block
//! notifications, and directory listings.

use crate::application::LookupService;
use crate::infrastructure::ShutdownController;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Body of a block request.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockRequest {
    pub ip: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub blocked_ips: usize,
    pub subscribers: usize,
    pub cached_results: usize,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<LookupService>,
    pub shutdown: ShutdownController,
}

impl ApiState {
    pub fn new(service: Arc<LookupService>, shutdown: ShutdownController) -> Self {
        Self { service, shutdown }
    }
}

pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    pub fn new(
        listen_addr: String,
        service: Arc<LookupService>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            listen_addr,
            state: ApiState::new(service, shutdown),
            static_dir: None,
        }
    }

    /// Serve `index.html` at `/` and the directory under `/static`.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn router(&self) -> Router {
        let router = build_router(self.state.clone());
        match &self.static_dir {
            Some(dir) => router.merge(static_routes(dir)),
            None => router,
        }
    }

    /// Serve until the shutdown controller fires.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("API listening on {}", self.listen_addr);

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/ip/block", post(block_handler))
        .route("/api/ip/events", get(events_handler))
        .route("/api/ip/:ip", get(country_by_ip_handler))
        .route("/api/countries", get(countries_handler))
        .route("/api/currencies", get(currencies_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Index page and assets. Missing files answer 404.
pub fn static_routes(dir: &FsPath) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(dir.join("index.html")))
        .nest_service("/static", ServeDir::new(dir))
        .layer(TraceLayer::new_for_http())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Canonical text form of an IP, so "::0001" and "::1" share one key.
fn canonical_ip(raw: &str) -> Option<String> {
    raw.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

// Handler functions

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        blocked_ips: state.service.blocked_count(),
        subscribers: state.service.subscriber_count(),
        cached_results: state.service.cached_count(),
    })
}

async fn country_by_ip_handler(
    State(state): State<ApiState>,
    Path(ip): Path<String>,
) -> Response {
    let Some(ip) = canonical_ip(&ip) else {
        return error_response(StatusCode::BAD_REQUEST, format!("invalid ip address: {}", ip));
    };

    match state.service.resolve_ip(&ip).await {
        Ok(result) => Json(result.as_ref().clone()).into_response(),
        Err(e) if e.is_upstream() => {
            tracing::error!("lookup for {} failed: {}", ip, e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
        Err(e) => error_response(StatusCode::FORBIDDEN, e.to_string()),
    }
}

async fn block_handler(
    State(state): State<ApiState>,
    payload: Result<Json<BlockRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    if req.ip.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no ips provided");
    }

    let mut ips = Vec::with_capacity(req.ip.len());
    let mut invalid = Vec::new();
    for raw in &req.ip {
        match canonical_ip(raw) {
            Some(ip) => ips.push(ip),
            None => invalid.push(raw.as_str()),
        }
    }
    if !invalid.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid ip addresses: {}", invalid.join(", ")),
        );
    }

    match state.service.block_ips(&ips).await {
        Ok(count) => Json(BlockResponse {
            message: "IPs blocked successfully".to_string(),
            count,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("failed to persist blocklist: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn events_handler(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.service.subscribe();
    let guard = state.shutdown.stream_guard();
    let shutdown = state.shutdown.clone();

    tracing::debug!("event stream opened (subscriber {})", subscription.id());

    // Dropping the stream drops the subscription, which unsubscribes.
    let stream = subscription
        .map(move |event| {
            let _open = &guard;
            Event::default().json_data(event)
        })
        .take_until(async move { shutdown.wait().await });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn countries_handler(State(state): State<ApiState>) -> Response {
    match state.service.fetch_countries().await {
        Ok(countries) => Json(countries).into_response(),
        Err(e) => {
            tracing::error!("failed to list countries: {:#}", e);
            error_response(StatusCode::BAD_GATEWAY, format!("{:#}", e))
        }
    }
}

async fn currencies_handler(State(state): State<ApiState>) -> Response {
    match state.service.fetch_currencies().await {
        Ok(currencies) => Json(currencies).into_response(),
        Err(e) => {
            tracing::error!("failed to list currencies: {:#}", e);
            error_response(StatusCode::BAD_GATEWAY, format!("{:#}", e))
        }
    }
}
