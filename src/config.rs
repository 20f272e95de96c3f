//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Origin the site is served under (used for same-origin checks)
    pub public_origin: String,
    /// Base URL of the origin server behind the proxy
    pub upstream_url: String,
    /// Version qualifier for cache partition names
    pub cache_version: String,
    /// Maximum number of entries the memory cache can hold
    pub max_entries: usize,
    /// TTL in seconds for resolved content
    pub default_ttl: u64,
    /// Maintenance task interval in seconds
    pub cleanup_interval: u64,
    /// SQLite path for the persistent tier, None disables it
    pub persistent_cache_path: Option<String>,
    /// Upstream request timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Content sections warmed at startup
    pub warm_sections: Vec<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `PUBLIC_ORIGIN` - Public site origin (default: http://localhost:3000)
    /// - `UPSTREAM_URL` - Origin server base URL (default: http://127.0.0.1:3001)
    /// - `CACHE_VERSION` - Cache partition version (default: v1)
    /// - `MAX_ENTRIES` - Maximum memory cache entries (default: 1000)
    /// - `DEFAULT_TTL` - Content TTL in seconds (default: 300)
    /// - `CLEANUP_INTERVAL` - Maintenance frequency in seconds (default: 60)
    /// - `PERSISTENT_CACHE_PATH` - SQLite file, empty disables (default: resume-cache.db)
    /// - `FETCH_TIMEOUT_SECS` - Upstream timeout in seconds (default: 10)
    /// - `WARM_SECTIONS` - Comma-separated sections (default: about,skills,experience)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let persistent_cache_path = match env::var("PERSISTENT_CACHE_PATH") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(path),
            Err(_) => defaults.persistent_cache_path,
        };

        let warm_sections = env::var("WARM_SECTIONS")
            .map(|raw| parse_list(&raw))
            .unwrap_or(defaults.warm_sections);

        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            public_origin: env::var("PUBLIC_ORIGIN").unwrap_or(defaults.public_origin),
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            cache_version: env::var("CACHE_VERSION").unwrap_or(defaults.cache_version),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            persistent_cache_path,
            fetch_timeout_secs: parse_var("FETCH_TIMEOUT_SECS")
                .unwrap_or(defaults.fetch_timeout_secs),
            warm_sections,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            public_origin: "http://localhost:3000".to_string(),
            upstream_url: "http://127.0.0.1:3001".to_string(),
            cache_version: "v1".to_string(),
            max_entries: 1000,
            default_ttl: 300,
            cleanup_interval: 60,
            persistent_cache_path: Some("resume-cache.db".to_string()),
            fetch_timeout_secs: 10,
            warm_sections: vec![
                "about".to_string(),
                "skills".to_string(),
                "experience".to_string(),
            ],
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
