//! API Handlers
//!
//! HTTP request handlers for the administrative endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use url::Url;

use crate::cache::{MemoryCache, PersistentCache, SharedMemoryCache};
use crate::config::Config;
use crate::content::{ContentEnvelope, ContentResolver, ContentSource, HttpContentSource};
use crate::error::{CacheError, Result};
use crate::models::{ControlMessage, HealthResponse, MessageResponse, StatsResponse};
use crate::worker::{
    CacheStorage, HttpNetwork, Network, OfflineWorker, Registration, RegistrationStatus,
    WorkerConfig,
};

/// Application state shared across all handlers.
///
/// Every cache and the worker registration are constructed once and passed
/// in; nothing here is a global.
#[derive(Clone)]
pub struct AppState {
    pub memory: SharedMemoryCache,
    pub persistent: Option<Arc<PersistentCache>>,
    pub resolver: ContentResolver,
    pub registration: Arc<Registration>,
    pub network: Arc<dyn Network>,
    pub public_origin: Url,
}

impl AppState {
    /// Wires the state from already constructed parts.
    pub fn new(
        memory: SharedMemoryCache,
        persistent: Option<Arc<PersistentCache>>,
        source: Arc<dyn ContentSource>,
        network: Arc<dyn Network>,
        public_origin: Url,
        content_ttl: u64,
    ) -> Self {
        let resolver = ContentResolver::new(memory.clone(), persistent.clone(), source, content_ttl);
        Self {
            memory,
            persistent,
            resolver,
            registration: Arc::new(Registration::new(CacheStorage::new())),
            network,
            public_origin,
        }
    }

    /// Creates the state from configuration, talking HTTP to the upstream.
    pub fn from_config(config: &Config) -> Result<Self> {
        let public_origin = parse_url("PUBLIC_ORIGIN", &config.public_origin)?;
        let upstream = parse_url("UPSTREAM_URL", &config.upstream_url)?;
        let timeout = Duration::from_secs(config.fetch_timeout_secs);

        let network = HttpNetwork::new(&public_origin, upstream.clone(), timeout)?;
        let source = HttpContentSource::new(upstream, timeout)?;
        let memory = MemoryCache::new(config.max_entries).shared();
        let persistent = config
            .persistent_cache_path
            .as_ref()
            .map(|path| Arc::new(PersistentCache::new(path.clone())));

        Ok(Self::new(
            memory,
            persistent,
            Arc::new(source),
            Arc::new(network),
            public_origin,
            config.default_ttl,
        ))
    }

    /// Builds a worker version that shares this state's storage and network.
    pub fn worker(&self, version: &str) -> Result<OfflineWorker> {
        let config = WorkerConfig::new(version, self.public_origin.clone());
        OfflineWorker::new(
            config,
            self.registration.storage().clone(),
            self.network.clone(),
        )
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| CacheError::InvalidRequest(format!("{} {:?}: {}", name, raw, e)))
}

/// Handler for GET /_cache/stats
///
/// Returns memory cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.memory.read().await.stats();
    Json(StatsResponse::from(stats))
}

/// Handler for GET /_worker/status
pub async fn worker_status_handler(State(state): State<AppState>) -> Json<RegistrationStatus> {
    Json(state.registration.status().await)
}

/// Handler for POST /_worker/message
///
/// Accepts `{"type": "SKIP_WAITING"}` or `{"type": "CLEAR_CACHE"}`. The raw
/// body is parsed whatever its content type, so every bad message is a 400.
pub async fn worker_message_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let message: ControlMessage = serde_json::from_slice(&body)
        .map_err(|e| CacheError::InvalidRequest(format!("unknown control message: {}", e)))?;

    let reply = state.registration.post_message(message).await?;
    Ok(Json(MessageResponse::new(reply)))
}

/// Handler for GET /_content/:section
///
/// Resolves a section through the cache tiers and answers in the same
/// envelope the origin's content endpoint uses.
pub async fn content_handler(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Response {
    match state.resolver.resolve(&section).await {
        Ok(content) => Json(ContentEnvelope::ok(content)).into_response(),
        Err(err) => (
            err.status_code(),
            Json(ContentEnvelope::failure(err.to_string())),
        )
            .into_response(),
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
