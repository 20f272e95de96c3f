//! Tiered content resolution: memory, then persistent store, then the origin.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{PersistentCache, SharedMemoryCache};
use crate::content::{ContentSource, SectionContent};
use crate::error::{CacheError, Result};

#[derive(Clone)]
pub struct ContentResolver {
    memory: SharedMemoryCache,
    persistent: Option<Arc<PersistentCache>>,
    source: Arc<dyn ContentSource>,
    ttl_seconds: u64,
}

impl ContentResolver {
    pub fn new(
        memory: SharedMemoryCache,
        persistent: Option<Arc<PersistentCache>>,
        source: Arc<dyn ContentSource>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            memory,
            persistent,
            source,
            ttl_seconds,
        }
    }

    /// Returns section content from the fastest tier that has it.
    ///
    /// Persistent store failures are logged and read as misses. A value found
    /// in the persistent store is copied into memory for the rest of its TTL;
    /// a value fetched from the origin is written to both tiers.
    pub async fn resolve(&self, section: &str) -> Result<SectionContent> {
        validate_section(section)?;
        let key = cache_key(section);

        let cached = self.memory.write().await.get(&key);
        if let Some(value) = cached {
            match serde_json::from_value(value) {
                Ok(content) => return Ok(content),
                Err(err) => warn!("Dropping unreadable memory entry {}: {}", key, err),
            }
        }

        if let Some(persistent) = &self.persistent {
            match persistent.get_entry(&key).await {
                Ok(Some(entry)) => {
                    if let Ok(content) = serde_json::from_value::<SectionContent>(entry.value.clone()) {
                        debug!("Section {} served from persistent cache", section);
                        // The memory copy must not outlive the row it came from
                        let remaining = entry.ttl_remaining_ms(persistent.now_ms()) / 1000;
                        if remaining > 0 {
                            self.memory.write().await.set(
                                key,
                                entry.value,
                                remaining.min(self.ttl_seconds),
                            );
                        }
                        return Ok(content);
                    }
                    warn!("Dropping unreadable persistent entry {}", key);
                }
                Ok(None) => {}
                Err(err) => warn!("Persistent cache read for {} failed: {}", key, err),
            }
        }

        let content = self.source.fetch_section(section).await?;
        let value = serde_json::to_value(&content)?;

        if let Some(persistent) = &self.persistent {
            if let Err(err) = persistent.set(&key, &value, self.ttl_seconds).await {
                warn!("Persistent cache write for {} failed: {}", key, err);
            }
        }
        self.memory.write().await.set(key, value, self.ttl_seconds);

        debug!("Section {} fetched from origin", section);
        Ok(content)
    }
}

fn cache_key(section: &str) -> String {
    format!("content:{}", section)
}

fn validate_section(section: &str) -> Result<()> {
    let valid = !section.is_empty()
        && section.len() <= 64
        && section
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidRequest(format!(
            "invalid section name: {:?}",
            section
        )))
    }
}
