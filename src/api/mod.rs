//! API Module
//!
//! HTTP handlers and routing for the caching proxy.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /_cache/stats` - Memory cache statistics
//! - `GET /_worker/status` - Worker registration status
//! - `POST /_worker/message` - Worker control messages
//! - `GET /_content/:section` - Cached content sections
//! - fallback - proxied through the offline worker

pub mod handlers;
pub mod proxy;
pub mod routes;

pub use handlers::*;
pub use proxy::proxy_handler;
pub use routes::create_router;
