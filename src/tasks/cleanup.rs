//! Cache Maintenance Task
//!
//! Background task that periodically removes expired entries from both
//! cache tiers, so reads never have to scan.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{PersistentCache, SharedMemoryCache};

/// Spawns a background task that periodically sweeps expired entries.
///
/// Each run calls `MemoryCache::cleanup` under the write lock, then
/// `PersistentCache::purge_expired` if a persistent tier is configured.
/// Persistent failures are logged and retried on the next run.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let memory = MemoryCache::new(1000).shared();
/// let cleanup_handle = spawn_cleanup_task(memory.clone(), None, 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    memory: SharedMemoryCache,
    persistent: Option<Arc<PersistentCache>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache maintenance task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = memory.write().await.cleanup();
            if removed > 0 {
                info!("Memory cache cleanup: removed {} expired entries", removed);
            } else {
                debug!("Memory cache cleanup: no expired entries found");
            }

            if let Some(persistent) = &persistent {
                match persistent.purge_expired().await {
                    Ok(0) => debug!("Persistent cache purge: no expired rows"),
                    Ok(purged) => info!("Persistent cache purge: removed {} expired rows", purged),
                    Err(err) => warn!("Persistent cache purge failed: {}", err),
                }
            }
        }
    })
}
