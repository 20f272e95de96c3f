//! Adapter between axum's HTTP types and the worker's fetch model.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tracing::debug;
use url::Url;

use super::AppState;
use crate::error::{CacheError, Result};
use crate::worker::{
    forwardable_headers, CachedResponse, Destination, FetchOutcome, FetchRequest, RequestMode,
};

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Fallback handler: every request not claimed by an admin route goes through
/// the active worker, or straight to the network when it is not intercepted.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| CacheError::InvalidRequest(format!("unreadable body: {}", e)))?;

    let fetch = fetch_request(&parts, body, &state.public_origin)?;

    let response = match state.registration.handle_fetch(&fetch).await? {
        FetchOutcome::Handled { strategy, response } => {
            debug!("{} {} via {}", fetch.method, fetch.url, strategy);
            response
        }
        FetchOutcome::Bypassed => {
            debug!("{} {} passed through", fetch.method, fetch.url);
            state.network.fetch(&fetch).await?
        }
    };

    Ok(into_response(response))
}

/// Builds the worker's view of an incoming request.
///
/// Origin-form targets (`/path?query`) are placed on the public origin by
/// path and query only, so a target such as `//host/x` never names another
/// host. Absolute-form targets must already be on the public origin.
pub fn fetch_request(parts: &Parts, body: Bytes, public_origin: &Url) -> Result<FetchRequest> {
    let url = if parts.uri.scheme().is_some() {
        let url = Url::parse(&parts.uri.to_string()).map_err(|e| {
            CacheError::InvalidRequest(format!("bad request target {}: {}", parts.uri, e))
        })?;
        if url.origin() != public_origin.origin() {
            return Err(CacheError::InvalidRequest(format!(
                "refusing to proxy foreign origin {}",
                url.origin().ascii_serialization()
            )));
        }
        url
    } else {
        let mut url = public_origin.clone();
        url.set_path(parts.uri.path());
        url.set_query(parts.uri.query());
        url
    };

    Ok(FetchRequest {
        method: parts.method.clone(),
        url,
        destination: Destination::from_header(header_value(parts, "sec-fetch-dest")),
        mode: RequestMode::from_header(header_value(parts, "sec-fetch-mode")),
        headers: parts.headers.clone(),
        body,
    })
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn into_response(cached: CachedResponse) -> Response {
    let mut response = (cached.status, Body::from(cached.body)).into_response();
    let headers = response.headers_mut();
    for (name, value) in forwardable_headers(&cached.headers).iter() {
        headers.append(name.clone(), value.clone());
    }
    response
}
