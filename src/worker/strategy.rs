//! Cache strategies: how a classified request is answered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::network::Network;
use super::request::{CachedResponse, FetchRequest};
use super::selector::CacheStrategy;
use super::storage::CacheStorage;
use crate::error::{CacheError, Result};

/// Everything a strategy needs: the storage, the network and partition names.
#[derive(Clone)]
pub struct StrategyContext {
    storage: CacheStorage,
    network: Arc<dyn Network>,
    precache: String,
    runtime: String,
    offline_key: String,
    revalidation_failures: Arc<AtomicU64>,
}

impl StrategyContext {
    pub fn new(
        storage: CacheStorage,
        network: Arc<dyn Network>,
        precache: impl Into<String>,
        runtime: impl Into<String>,
        offline_key: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            network,
            precache: precache.into(),
            runtime: runtime.into(),
            offline_key: offline_key.into(),
            revalidation_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Background revalidations that did not produce a stored response.
    pub fn revalidation_failures(&self) -> u64 {
        self.revalidation_failures.load(Ordering::Relaxed)
    }

    pub async fn execute(
        &self,
        strategy: CacheStrategy,
        request: &FetchRequest,
    ) -> Result<CachedResponse> {
        match strategy {
            CacheStrategy::CacheFirst => self.cache_first(request).await,
            CacheStrategy::NetworkFirst => self.network_first(request).await,
            CacheStrategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    // == Cache First ==
    /// Precache hit, else network (storing a 200 in the precache), else the
    /// offline page.
    pub async fn cache_first(&self, request: &FetchRequest) -> Result<CachedResponse> {
        let key = request.cache_key();
        if let Some(cached) = self.storage.match_in(&self.precache, &key).await {
            return Ok(cached);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.storage
                        .put(&self.precache, key, response.clone())
                        .await;
                }
                Ok(response)
            }
            Err(err) => {
                debug!("cache-first fetch of {} failed: {}", key, err);
                self.offline_page().await.ok_or(err)
            }
        }
    }

    // == Network First ==
    /// Network (storing a 200 in the runtime cache), else the runtime copy,
    /// else the offline page for navigations.
    pub async fn network_first(&self, request: &FetchRequest) -> Result<CachedResponse> {
        let key = request.cache_key();

        let err = match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.storage.put(&self.runtime, key, response.clone()).await;
                }
                return Ok(response);
            }
            Err(err) => err,
        };

        debug!("network-first fetch of {} failed: {}", key, err);
        if let Some(cached) = self.storage.match_in(&self.runtime, &key).await {
            return Ok(cached);
        }
        if request.is_navigation() {
            if let Some(offline) = self.offline_page().await {
                return Ok(offline);
            }
        }
        Err(err)
    }

    // == Stale While Revalidate ==
    /// Runtime copy right away if there is one, refreshed in the background;
    /// otherwise waits for the network.
    ///
    /// Failures of a background refresh never reach a caller that already has
    /// the stale copy; they are only logged and counted.
    pub async fn stale_while_revalidate(&self, request: &FetchRequest) -> Result<CachedResponse> {
        let key = request.cache_key();
        let cached = self.storage.match_in(&self.runtime, &key).await;

        let ctx = self.clone();
        let background = request.clone();
        let revalidation = tokio::spawn(async move {
            let result = ctx.network.fetch(&background).await;
            match &result {
                Ok(response) if response.is_cacheable() => {
                    ctx.storage
                        .put(&ctx.runtime, background.cache_key(), response.clone())
                        .await;
                }
                Ok(response) => {
                    ctx.revalidation_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "revalidation of {} returned {}",
                        background.url, response.status
                    );
                }
                Err(err) => {
                    ctx.revalidation_failures.fetch_add(1, Ordering::Relaxed);
                    debug!("revalidation of {} failed: {}", background.url, err);
                }
            }
            result
        });

        if let Some(cached) = cached {
            return Ok(cached);
        }

        revalidation.await.map_err(|e| {
            warn!("revalidation task for {} aborted: {}", key, e);
            CacheError::Internal(e.to_string())
        })?
    }

    async fn offline_page(&self) -> Option<CachedResponse> {
        self.storage.match_any(&self.offline_key).await
    }
}
