//! Cache strategy selection.
//!
//! Classification is a pure function of method, origin, destination and path.

use std::fmt;

use axum::http::Method;
use serde::Serialize;
use url::{Origin, Url};

use super::request::{Destination, FetchRequest};

/// How a request is served from cache and network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheStrategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheStrategy::CacheFirst => "CACHE_FIRST",
            CacheStrategy::NetworkFirst => "NETWORK_FIRST",
            CacheStrategy::StaleWhileRevalidate => "STALE_WHILE_REVALIDATE",
        };
        f.write_str(name)
    }
}

/// Outcome of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; goes straight to the network.
    Bypass,
    Cache(CacheStrategy),
}

#[derive(Debug, Clone)]
pub struct StrategySelector {
    origin: Origin,
    api_prefix: String,
}

impl StrategySelector {
    pub fn new(origin: &Url, api_prefix: impl Into<String>) -> Self {
        Self {
            origin: origin.origin(),
            api_prefix: api_prefix.into(),
        }
    }

    /// Picks the route for `request`; the first matching rule wins.
    pub fn classify(&self, request: &FetchRequest) -> Route {
        if request.method != Method::GET {
            return Route::Bypass;
        }
        if request.url.origin() != self.origin {
            return Route::Bypass;
        }

        let strategy = match request.destination {
            Destination::Image => CacheStrategy::CacheFirst,
            _ if request.url.path().starts_with(&self.api_prefix) => CacheStrategy::NetworkFirst,
            Destination::Font => CacheStrategy::CacheFirst,
            Destination::Style | Destination::Script => CacheStrategy::StaleWhileRevalidate,
            _ => CacheStrategy::NetworkFirst,
        };
        Route::Cache(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ORIGIN: &str = "http://localhost:3000";

    fn selector() -> StrategySelector {
        StrategySelector::new(&Url::parse(ORIGIN).unwrap(), "/api/")
    }

    fn request(path: &str, destination: Destination) -> FetchRequest {
        let mut url = Url::parse(ORIGIN).unwrap();
        url.set_path(path);
        FetchRequest::get(url).with_destination(destination)
    }

    #[test]
    fn test_image_is_cache_first() {
        let route = selector().classify(&request("/images/logo.png", Destination::Image));
        assert_eq!(route, Route::Cache(CacheStrategy::CacheFirst));
    }

    #[test]
    fn test_api_is_network_first() {
        let route = selector().classify(&request("/api/content/skills", Destination::Empty));
        assert_eq!(route, Route::Cache(CacheStrategy::NetworkFirst));
    }

    #[test]
    fn test_script_is_stale_while_revalidate() {
        let route = selector().classify(&request("/_next/static/chunk.js", Destination::Script));
        assert_eq!(route, Route::Cache(CacheStrategy::StaleWhileRevalidate));
    }

    #[test]
    fn test_style_is_stale_while_revalidate() {
        let route = selector().classify(&request("/_next/static/app.css", Destination::Style));
        assert_eq!(route, Route::Cache(CacheStrategy::StaleWhileRevalidate));
    }

    #[test]
    fn test_font_is_cache_first() {
        let route = selector().classify(&request("/fonts/inter.woff2", Destination::Font));
        assert_eq!(route, Route::Cache(CacheStrategy::CacheFirst));
    }

    #[test]
    fn test_navigation_is_network_first() {
        let url = Url::parse(ORIGIN).unwrap().join("/home").unwrap();
        let route = selector().classify(&FetchRequest::navigate(url));
        assert_eq!(route, Route::Cache(CacheStrategy::NetworkFirst));
    }

    #[test]
    fn test_image_under_api_prefix_stays_cache_first() {
        let route = selector().classify(&request("/api/avatar.png", Destination::Image));
        assert_eq!(route, Route::Cache(CacheStrategy::CacheFirst));
    }

    #[test]
    fn test_script_under_api_prefix_is_network_first() {
        let route = selector().classify(&request("/api/widget.js", Destination::Script));
        assert_eq!(route, Route::Cache(CacheStrategy::NetworkFirst));
    }

    #[test]
    fn test_post_is_bypassed() {
        let post = request("/api/content/validate", Destination::Empty).with_method(Method::POST);
        assert_eq!(selector().classify(&post), Route::Bypass);
    }

    #[test]
    fn test_cross_origin_is_bypassed() {
        let url = Url::parse("https://cdn.example.com/logo.png").unwrap();
        let cross = FetchRequest::get(url).with_destination(Destination::Image);
        assert_eq!(selector().classify(&cross), Route::Bypass);
    }

    fn destination_strategy() -> impl Strategy<Value = Destination> {
        prop_oneof![
            Just(Destination::Document),
            Just(Destination::Image),
            Just(Destination::Font),
            Just(Destination::Style),
            Just(Destination::Script),
            Just(Destination::Empty),
            Just(Destination::Other),
        ]
    }

    proptest! {
        #[test]
        fn prop_classification_is_deterministic(
            path in "/[a-z_]{1,8}(/[a-z0-9_.]{1,12}){0,3}",
            destination in destination_strategy(),
            is_get in any::<bool>(),
        ) {
            let method = if is_get { Method::GET } else { Method::POST };
            let first = request(&path, destination).with_method(method.clone());
            let second = request(&path, destination).with_method(method);

            let selector = selector();
            prop_assert_eq!(selector.classify(&first), selector.classify(&second));
        }

        #[test]
        fn prop_non_get_never_intercepted(
            path in "/[a-z_]{1,8}(/[a-z0-9_.]{1,12}){0,3}",
            destination in destination_strategy(),
        ) {
            let put = request(&path, destination).with_method(Method::PUT);
            prop_assert_eq!(selector().classify(&put), Route::Bypass);
        }
    }
}
