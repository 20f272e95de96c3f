//! Offline worker: one versioned instance of the caching proxy logic.
//!
//! Lifecycle: installing -> installed -> activating -> activated, and
//! redundant once superseded or after a failed install.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use super::network::Network;
use super::request::{CachedResponse, FetchRequest};
use super::selector::{CacheStrategy, Route, StrategySelector};
use super::storage::CacheStorage;
use super::strategy::StrategyContext;
use crate::error::{CacheError, Result};
use crate::models::ControlMessage;

pub const PRECACHE_PREFIX: &str = "resume-precache";
pub const RUNTIME_PREFIX: &str = "resume-runtime";

/// Resources every worker version must store before it can activate.
pub const PRECACHE_MANIFEST: &[&str] = &[
    "/",
    "/home",
    "/offline",
    "/api/content/about",
    "/api/content/skills",
    "/api/content/experience",
    "/_next/static/css/app.css",
    "/_next/static/chunks/main.js",
    "/_next/static/chunks/webpack.js",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub version: String,
    /// Origin the worker serves; other origins pass through.
    pub origin: Url,
    pub manifest: Vec<String>,
    pub api_prefix: String,
    pub offline_path: String,
    /// Activate straight after install instead of waiting for SKIP_WAITING.
    pub skip_waiting: bool,
}

impl WorkerConfig {
    pub fn new(version: impl Into<String>, origin: Url) -> Self {
        Self {
            version: version.into(),
            origin,
            manifest: PRECACHE_MANIFEST.iter().map(|p| p.to_string()).collect(),
            api_prefix: "/api/".to_string(),
            offline_path: "/offline".to_string(),
            skip_waiting: true,
        }
    }

    pub fn with_manifest(mut self, manifest: Vec<String>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.skip_waiting = skip_waiting;
        self
    }

    pub fn precache_name(&self) -> String {
        format!("{}-{}", PRECACHE_PREFIX, self.version)
    }

    pub fn runtime_name(&self) -> String {
        format!("{}-{}", RUNTIME_PREFIX, self.version)
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| CacheError::InvalidRequest(format!("bad manifest path {}: {}", path, e)))
    }
}

/// Result of handing a request to the worker.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the caller should go to the network itself.
    Bypassed,
    Handled {
        strategy: CacheStrategy,
        response: CachedResponse,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    SkipWaitingRequested,
    CachesCleared { deleted: usize },
}

// == Offline Worker ==
pub struct OfflineWorker {
    config: WorkerConfig,
    selector: StrategySelector,
    strategies: StrategyContext,
    storage: CacheStorage,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
}

impl OfflineWorker {
    pub fn new(
        config: WorkerConfig,
        storage: CacheStorage,
        network: Arc<dyn Network>,
    ) -> Result<Self> {
        let offline_url = config.resolve(&config.offline_path)?;
        let selector = StrategySelector::new(&config.origin, config.api_prefix.clone());
        let strategies = StrategyContext::new(
            storage.clone(),
            network.clone(),
            config.precache_name(),
            config.runtime_name(),
            offline_url.to_string(),
        );

        Ok(Self {
            config,
            selector,
            strategies,
            storage,
            network,
            state: RwLock::new(WorkerState::Installing),
        })
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub(crate) async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
    }

    pub fn revalidation_failures(&self) -> u64 {
        self.strategies.revalidation_failures()
    }

    // == Install ==
    /// Fetches the whole manifest and stores it in the precache.
    ///
    /// All-or-nothing: if any resource fails to fetch or is not a success
    /// status, nothing is stored and the worker becomes redundant.
    pub async fn on_install(&self) -> Result<()> {
        let precache = self.config.precache_name();
        info!(
            "Installing worker {} ({} resources into {})",
            self.version(),
            self.config.manifest.len(),
            precache
        );

        let requests = self
            .config
            .manifest
            .iter()
            .map(|path| self.config.resolve(path).map(FetchRequest::get))
            .collect::<Result<Vec<_>>>();

        let fetched = match requests {
            Ok(requests) => self.fetch_manifest(requests).await,
            Err(err) => Err(err),
        };

        match fetched {
            Ok(entries) => {
                self.storage.put_all(&precache, entries).await;
                self.set_state(WorkerState::Installed).await;
                info!("Worker {} installed", self.version());
                Ok(())
            }
            Err(err) => {
                self.set_state(WorkerState::Redundant).await;
                warn!("Worker {} failed to install: {}", self.version(), err);
                Err(err)
            }
        }
    }

    async fn fetch_manifest(
        &self,
        requests: Vec<FetchRequest>,
    ) -> Result<Vec<(String, CachedResponse)>> {
        let network = &self.network;
        let results = join_all(requests.iter().map(|request| network.fetch(request))).await;

        requests
            .iter()
            .zip(results)
            .map(|(request, result)| match result {
                Ok(response) if response.status.is_success() => {
                    Ok((request.cache_key(), response))
                }
                Ok(response) => Err(CacheError::Install(format!(
                    "{} returned {}",
                    request.url.path(),
                    response.status
                ))),
                Err(err) => Err(CacheError::Install(format!(
                    "{}: {}",
                    request.url.path(),
                    err
                ))),
            })
            .collect()
    }

    // == Activate ==
    /// Deletes every partition that is not this version's, then marks the
    /// worker activated. Returns the deleted partition names.
    pub async fn on_activate(&self) -> Result<Vec<String>> {
        self.set_state(WorkerState::Activating).await;

        let current = [self.config.precache_name(), self.config.runtime_name()];
        let mut deleted = Vec::new();
        for name in self.storage.keys().await {
            if !current.contains(&name) && self.storage.delete(&name).await {
                info!("Deleted stale cache partition {}", name);
                deleted.push(name);
            }
        }
        for name in &current {
            self.storage.open(name).await;
        }

        self.set_state(WorkerState::Activated).await;
        info!("Worker {} activated", self.version());
        Ok(deleted)
    }

    // == Fetch ==
    pub async fn on_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        match self.selector.classify(request) {
            Route::Bypass => Ok(FetchOutcome::Bypassed),
            Route::Cache(strategy) => {
                let response = self.strategies.execute(strategy, request).await?;
                Ok(FetchOutcome::Handled { strategy, response })
            }
        }
    }

    // == Message ==
    pub async fn on_message(&self, message: &ControlMessage) -> MessageOutcome {
        match message {
            ControlMessage::SkipWaiting => MessageOutcome::SkipWaitingRequested,
            ControlMessage::ClearCache => {
                let mut deleted = 0;
                for name in [self.config.precache_name(), self.config.runtime_name()] {
                    if self.storage.delete(&name).await {
                        deleted += 1;
                    }
                }
                info!("Cleared {} cache partitions for {}", deleted, self.version());
                MessageOutcome::CachesCleared { deleted }
            }
        }
    }
}
