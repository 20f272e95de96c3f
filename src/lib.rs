//! Resume Cache - a multi-tier caching proxy with offline delivery
//!
//! Serves a resume site through an offline worker that answers from
//! versioned cache partitions, with memory and SQLite tiers in front of the
//! origin's content API.

pub mod api;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod models;
pub mod tasks;
pub mod worker;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{spawn_cleanup_task, warm_critical_content, WarmReport};
