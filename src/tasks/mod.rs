//! Background Tasks Module
//!
//! # Tasks
//! - Cache maintenance: sweeps expired entries at configured intervals
//! - Cache warming: resolves critical content sections at startup

mod cleanup;
mod warm;

pub use cleanup::spawn_cleanup_task;
pub use warm::{warm_critical_content, WarmReport};
