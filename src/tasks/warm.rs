//! Cache Warming
//!
//! Resolves the critical content sections once at startup so the first real
//! request for each is already cached.

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::content::ContentResolver;

/// Outcome of one warming run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmReport {
    pub succeeded: Vec<String>,
    /// Sections that failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl WarmReport {
    /// True only when every section warmed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves every section concurrently and waits for all of them to settle.
///
/// A failing section is logged and recorded; it never stops the others.
pub async fn warm_critical_content(resolver: &ContentResolver, sections: &[String]) -> WarmReport {
    info!("Warming {} content sections", sections.len());

    let results = join_all(sections.iter().map(|section| resolver.resolve(section))).await;

    let mut report = WarmReport::default();
    for (section, result) in sections.iter().zip(results) {
        match result {
            Ok(_) => report.succeeded.push(section.clone()),
            Err(err) => {
                warn!("Failed to warm section {}: {}", section, err);
                report.failed.push((section.clone(), err.to_string()));
            }
        }
    }

    if report.is_complete() {
        info!("Cache warming complete: {} sections", report.succeeded.len());
    } else {
        warn!(
            "Cache warming finished with {} of {} sections failing",
            report.failed.len(),
            sections.len()
        );
    }
    report
}
