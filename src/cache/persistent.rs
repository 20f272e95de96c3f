//! Persistent Cache Module
//!
//! Durable cache tier backed by SQLite through tokio-rusqlite. Values are
//! stored as JSON text alongside an absolute expiry in Unix milliseconds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio_rusqlite::rusqlite::{self, params, OptionalExtension};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::cache::{CacheEntry, SharedClock, SystemClock};
use crate::error::{CacheError, Result};

/// Path that selects an in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cache_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);";

// == Persistent Cache ==
/// Durable key/value store with per-entry TTL.
///
/// The connection is opened lazily on first use. Concurrent first callers
/// queue on the same lock, so only one open is ever in flight.
pub struct PersistentCache {
    path: String,
    clock: SharedClock,
    conn: Mutex<Option<Connection>>,
    opens: AtomicUsize,
}

impl PersistentCache {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            path: path.into(),
            clock,
            conn: Mutex::new(None),
            opens: AtomicUsize::new(0),
        }
    }

    /// In-memory store, mostly useful for tests.
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_PATH)
    }

    // == Init ==
    /// Opens the store if it is not open yet. Safe to call repeatedly.
    pub async fn init(&self) -> Result<()> {
        self.connection().await.map(|_| ())
    }

    // == Close ==
    /// Drops the connection. The next operation opens it again.
    pub async fn close(&self) {
        if self.conn.lock().await.take().is_some() {
            info!("Persistent cache at {} closed", self.path);
        }
    }

    /// Number of times a connection has been opened.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    // == Set ==
    /// Stores `value` under `key`, expiring `ttl_seconds` from now. Overwrites.
    pub async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<()> {
        let conn = self.connection().await?;
        let key = key.to_string();
        let text = serde_json::to_string(value)?;
        let expires_at = self
            .clock
            .now_ms()
            .saturating_add(ttl_seconds.saturating_mul(1000)) as i64;

        conn.call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    expires_at = excluded.expires_at",
                params![key, text, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(storage_error)
    }

    // == Get ==
    /// Returns the value for `key` if present and unexpired.
    ///
    /// An expired row reads as a miss and is deleted on a best-effort basis.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    /// Like [`PersistentCache::get`], but keeps the row's expiry so callers
    /// copying the value elsewhere can honour it.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        let conn = self.connection().await?;
        let lookup_key = key.to_string();

        let row = conn
            .call(move |conn| -> rusqlite::Result<Option<(String, i64)>> {
                conn.query_row(
                    "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
                    params![lookup_key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
            })
            .await
            .map_err(storage_error)?;

        let Some((text, expires_at)) = row else {
            return Ok(None);
        };

        if self.clock.now_ms() as i64 >= expires_at {
            if let Err(err) = self.delete(key).await {
                debug!("Failed to drop expired persistent entry {}: {}", key, err);
            }
            return Ok(None);
        }

        let value = serde_json::from_str(&text)
            .map_err(|e| CacheError::Storage(format!("corrupt entry {}: {}", key, e)))?;
        Ok(Some(CacheEntry {
            key: key.to_string(),
            value,
            expires_at: expires_at.max(0) as u64,
        }))
    }

    /// Current time on this cache's clock, in Unix milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // == Delete ==
    /// Removes `key`, returning whether a row existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.connection().await?;
        let key = key.to_string();

        let removed = conn
            .call(move |conn| -> rusqlite::Result<usize> {
                conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
            })
            .await
            .map_err(storage_error)?;

        Ok(removed > 0)
    }

    // == Clear ==
    pub async fn clear(&self) -> Result<()> {
        let conn = self.connection().await?;

        conn.call(|conn| -> rusqlite::Result<()> {
            conn.execute("DELETE FROM cache_entries", [])?;
            Ok(())
        })
        .await
        .map_err(storage_error)
    }

    // == Purge Expired ==
    /// Deletes every expired row, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let conn = self.connection().await?;
        let now = self.clock.now_ms() as i64;

        conn.call(move |conn| -> rusqlite::Result<usize> {
            conn.execute(
                "DELETE FROM cache_entries WHERE expires_at <= ?1",
                params![now],
            )
        })
        .await
        .map_err(storage_error)
    }

    /// Number of stored rows, expired ones included.
    pub async fn len(&self) -> Result<usize> {
        let conn = self.connection().await?;

        let count = conn
            .call(|conn| -> rusqlite::Result<i64> {
                conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            })
            .await
            .map_err(storage_error)?;

        Ok(count as usize)
    }

    async fn connection(&self) -> Result<Connection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = open(&self.path).await?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        info!("Persistent cache opened at {}", self.path);

        *guard = Some(conn.clone());
        Ok(conn)
    }
}

async fn open(path: &str) -> Result<Connection> {
    let conn = if path == IN_MEMORY_PATH {
        Connection::open_in_memory().await
    } else {
        Connection::open(path).await
    }
    .map_err(storage_error)?;

    conn.call(|conn| -> rusqlite::Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )?;
        conn.execute_batch(SCHEMA)
    })
    .await
    .map_err(storage_error)?;

    Ok(conn)
}

fn storage_error(err: impl std::fmt::Display) -> CacheError {
    CacheError::Storage(err.to_string())
}
