//! Cache Module
//!
//! Key/value cache tiers with TTL expiration: an in-process memory cache and
//! a durable SQLite-backed cache.

mod entry;
mod memory;
mod persistent;
mod stats;


// Re-export public types
pub use entry::{CacheEntry, Clock, ManualClock, SharedClock, SystemClock};
pub use memory::{MemoryCache, SharedMemoryCache};
pub use persistent::{PersistentCache, IN_MEMORY_PATH};
pub use stats::CacheStats;
