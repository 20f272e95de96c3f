//! Request DTOs for the proxy API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Control message posted to the worker (`POST /_worker/message`).
///
/// Wire form is `{ "type": "SKIP_WAITING" }` or `{ "type": "CLEAR_CACHE" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting worker version now
    SkipWaiting,
    /// Delete the current precache and runtime partitions
    ClearCache,
}
