//! Offline Worker Module
//!
//! Intercepts outbound requests, answers them from named cache partitions
//! according to a per-resource strategy, and manages versioned installs.
//!
//! # Strategies
//! - Images, fonts: cache first (precache partition)
//! - API, navigation and everything else: network first (runtime partition)
//! - Styles, scripts: stale-while-revalidate (runtime partition)

mod lifecycle;
mod network;
mod registration;
mod request;
mod selector;
mod storage;
mod strategy;

pub use lifecycle::{
    FetchOutcome, MessageOutcome, OfflineWorker, WorkerConfig, WorkerState, PRECACHE_MANIFEST,
    PRECACHE_PREFIX, RUNTIME_PREFIX,
};
pub use network::{forwardable_headers, HttpNetwork, Network};
pub use registration::{Registration, RegistrationStatus};
pub use request::{CachedResponse, Destination, FetchRequest, RequestMode};
pub use selector::{CacheStrategy, Route, StrategySelector};
pub use storage::CacheStorage;
pub use strategy::StrategyContext;
