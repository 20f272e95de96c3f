//! Network boundary of the worker.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName};
use reqwest::{redirect, Client};
use tracing::debug;
use url::{Origin, Url};

use super::request::{CachedResponse, FetchRequest};
use crate::error::{CacheError, Result};

/// Performs a real fetch. An `Err` means no response arrived at all; any
/// HTTP status, including errors, is an `Ok`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse>;
}

/// Fetches over HTTP, sending public-origin requests to the upstream server.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: Client,
    public_origin: Origin,
    upstream: Url,
}

impl HttpNetwork {
    pub fn new(public_origin: &Url, upstream: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            public_origin: public_origin.origin(),
            upstream,
        })
    }

    /// Maps a public-origin URL onto the upstream. Other origins are refused,
    /// so the proxy only ever talks to its own upstream.
    fn target_url(&self, url: &Url) -> Result<Url> {
        if url.origin() != self.public_origin {
            return Err(CacheError::InvalidRequest(format!(
                "refusing to fetch foreign origin {}",
                url.origin().ascii_serialization()
            )));
        }

        let mut target = self.upstream.clone();
        target.set_path(url.path());
        target.set_query(url.query());
        Ok(target)
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse> {
        let target = self.target_url(&request.url)?;
        debug!("{} {} -> {}", request.method, request.url, target);

        let response = self
            .client
            .request(request.method.clone(), target)
            .headers(forwardable_headers(&request.headers))
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = forwardable_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Network(format!("reading body of {}: {}", request.url, e)))?;

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}

/// Copies end-to-end headers, dropping hop-by-hop ones and those the
/// transport recomputes.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    [
        header::CONNECTION,
        header::CONTENT_LENGTH,
        header::HOST,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
    ]
    .contains(name)
        || name.as_str() == "keep-alive"
}
