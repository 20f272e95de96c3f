//! Named cache partitions shared by every worker version.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::request::CachedResponse;

type Partition = HashMap<String, CachedResponse>;

/// Set of named partitions mapping request URL to stored response.
///
/// Each call takes the lock once, so a single put or delete is atomic.
/// Concurrent writers to the same key race; the last write wins.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    partitions: Arc<RwLock<BTreeMap<String, Partition>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the partition if it does not exist yet.
    pub async fn open(&self, name: &str) {
        self.partitions
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Partition names in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        self.partitions.read().await.keys().cloned().collect()
    }

    /// Drops a whole partition, returning whether it existed.
    pub async fn delete(&self, name: &str) -> bool {
        self.partitions.write().await.remove(name).is_some()
    }

    /// Stores `response` in an existing partition. Returns false, storing
    /// nothing, when the partition has been deleted, so a late write from a
    /// superseded worker cannot bring its partition back.
    pub async fn put(&self, name: &str, key: impl Into<String>, response: CachedResponse) -> bool {
        match self.partitions.write().await.get_mut(name) {
            Some(partition) => {
                partition.insert(key.into(), response);
                true
            }
            None => false,
        }
    }

    /// Stores several responses under one lock, creating the partition.
    pub async fn put_all(&self, name: &str, entries: Vec<(String, CachedResponse)>) {
        let mut partitions = self.partitions.write().await;
        let partition = partitions.entry(name.to_string()).or_default();
        partition.extend(entries);
    }

    pub async fn match_in(&self, name: &str, key: &str) -> Option<CachedResponse> {
        self.partitions
            .read()
            .await
            .get(name)
            .and_then(|partition| partition.get(key))
            .cloned()
    }

    /// Looks `key` up in every partition, in name order.
    pub async fn match_any(&self, key: &str) -> Option<CachedResponse> {
        self.partitions
            .read()
            .await
            .values()
            .find_map(|partition| partition.get(key))
            .cloned()
    }

    pub async fn entry_count(&self, name: &str) -> usize {
        self.partitions
            .read()
            .await
            .get(name)
            .map_or(0, |partition| partition.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn response(body: &'static str) -> CachedResponse {
        CachedResponse::new(StatusCode::OK, body)
    }

    #[tokio::test]
    async fn test_put_into_open_partition() {
        let storage = CacheStorage::new();
        storage.open("runtime").await;

        assert!(storage.put("runtime", "http://a/x", response("x")).await);
        assert_eq!(
            storage.match_in("runtime", "http://a/x").await,
            Some(response("x"))
        );
    }

    #[tokio::test]
    async fn test_put_never_recreates_deleted_partition() {
        let storage = CacheStorage::new();
        storage.open("resume-runtime-v1").await;
        storage.delete("resume-runtime-v1").await;

        let stored = storage
            .put("resume-runtime-v1", "http://a/app.js", response("late"))
            .await;

        assert!(!stored);
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_put_all_creates_partition() {
        let storage = CacheStorage::new();

        storage
            .put_all("precache", vec![("http://a/".to_string(), response("root"))])
            .await;

        assert_eq!(storage.keys().await, vec!["precache".to_string()]);
        assert_eq!(storage.entry_count("precache").await, 1);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let storage = CacheStorage::new();
        storage.open("runtime").await;
        storage.put("runtime", "k", response("first")).await;
        storage.put("runtime", "k", response("second")).await;

        assert_eq!(storage.match_in("runtime", "k").await, Some(response("second")));
        assert_eq!(storage.entry_count("runtime").await, 1);
    }

    #[tokio::test]
    async fn test_match_any_searches_all_partitions() {
        let storage = CacheStorage::new();
        storage.open("empty").await;
        storage.open("precache").await;
        storage.put("precache", "http://a/offline", response("offline")).await;

        assert_eq!(
            storage.match_any("http://a/offline").await,
            Some(response("offline"))
        );
        assert_eq!(storage.match_any("http://a/other").await, None);
    }

    #[tokio::test]
    async fn test_delete_partition() {
        let storage = CacheStorage::new();
        storage.open("old").await;

        assert!(storage.delete("old").await);
        assert!(!storage.delete("old").await);
        assert!(storage.keys().await.is_empty());
    }
}
