//! Content Delivery Endpoint client
//!
//! Section content is served by the origin as `GET /api/content/{section}`
//! wrapped in a `{ success, content?, error? }` envelope.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{CacheError, Result};

/// Processed content of one résumé section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionContent {
    pub html: String,
    #[serde(default)]
    pub frontmatter: Value,
    #[serde(default)]
    pub table_of_contents: Value,
}

/// Envelope used by the content endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<SectionContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentEnvelope {
    pub fn ok(content: SectionContent) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
        }
    }

    /// Unwraps the content, treating `success: false` or a missing body as failure.
    pub fn into_content(self, section: &str) -> Result<SectionContent> {
        match (self.success, self.content) {
            (true, Some(content)) => Ok(content),
            (true, None) => Err(CacheError::Upstream(format!(
                "content for {} missing from response",
                section
            ))),
            (false, _) => Err(CacheError::Upstream(self.error.unwrap_or_else(|| {
                format!("content endpoint reported failure for {}", section)
            }))),
        }
    }
}

// == Content Source ==
/// Where section content comes from when no cache tier has it.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_section(&self, section: &str) -> Result<SectionContent>;
}

/// Content source that calls the origin's content endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: Client,
    base: Url,
}

impl HttpContentSource {
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: with_trailing_slash(base),
        })
    }

    fn section_url(&self, section: &str) -> Result<Url> {
        self.base
            .join(&format!("api/content/{}", section))
            .map_err(|e| CacheError::InvalidRequest(format!("bad section {}: {}", section, e)))
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_section(&self, section: &str) -> Result<SectionContent> {
        let url = self.section_url(section)?;
        debug!("Fetching section {} from {}", section, url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(CacheError::Upstream(format!(
                "content endpoint returned {} for {}",
                status, section
            )));
        }

        let envelope: ContentEnvelope = response.json().await?;
        envelope.into_content(section)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
