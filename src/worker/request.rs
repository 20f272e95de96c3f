//! Request and response values that flow through the offline worker.

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use url::Url;

/// What the browser intends to do with the response (`Sec-Fetch-Dest`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Document,
    Image,
    Font,
    Style,
    Script,
    Empty,
    Other,
}

impl Destination {
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Destination::Empty;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "style" => Destination::Style,
            "script" => Destination::Script,
            "" | "empty" => Destination::Empty,
            _ => Destination::Other,
        }
    }
}

/// Request mode (`Sec-Fetch-Mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

impl RequestMode {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("navigate") => RequestMode::Navigate,
            Some("no-cors") => RequestMode::NoCors,
            Some("cors") => RequestMode::Cors,
            _ => RequestMode::SameOrigin,
        }
    }
}

// == Fetch Request ==
/// An outbound request as seen by the worker.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub mode: RequestMode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchRequest {
    /// Plain GET with no destination, as issued by `fetch()` from a script.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            destination: Destination::Empty,
            mode: RequestMode::SameOrigin,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Top-level page load.
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_destination(Destination::Document)
            .with_mode(RequestMode::Navigate)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Key the response is stored under: the URL without its fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

// == Cached Response ==
/// A fully buffered response that can be stored and replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Only responses with status exactly 200 are ever stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }
}
