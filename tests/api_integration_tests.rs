//! Integration Tests for the caching proxy
//!
//! Drives the full router: admin endpoints, content tiers and requests
//! routed through a registered offline worker.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use resume_cache::{
    api::create_router,
    cache::MemoryCache,
    content::{ContentSource, SectionContent},
    error::{CacheError, Result},
    worker::{CachedResponse, FetchRequest, Network, PRECACHE_MANIFEST},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

// == Test Doubles ==

/// Upstream double serving every precache resource plus a few extra paths.
#[derive(Default)]
struct FakeUpstream {
    routes: Mutex<HashMap<String, (StatusCode, String)>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FakeUpstream {
    fn new() -> Self {
        let upstream = Self::default();
        for path in PRECACHE_MANIFEST {
            upstream.route(path, StatusCode::OK, &format!("body of {}", path));
        }
        upstream.route("/offline", StatusCode::OK, "<h1>You are offline</h1>");
        upstream.route("/images/headshot.png", StatusCode::OK, "png bytes");
        upstream.route("/api/contact", StatusCode::CREATED, "thanks");
        upstream
    }

    fn route(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeUpstream {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Network("connection refused".to_string()));
        }
        let route = self.routes.lock().unwrap().get(request.url.path()).cloned();
        Ok(match route {
            Some((status, body)) => CachedResponse::new(status, body),
            None => CachedResponse::new(StatusCode::NOT_FOUND, "not found"),
        })
    }
}

#[derive(Default)]
struct FakeContent {
    known: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeContent {
    fn with_sections(sections: &[&str]) -> Self {
        Self {
            known: sections.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentSource for FakeContent {
    async fn fetch_section(&self, section: &str) -> Result<SectionContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.known.contains(section) {
            return Err(CacheError::Upstream(format!("Section {} not found", section)));
        }
        Ok(SectionContent {
            html: format!("<section>{}</section>", section),
            frontmatter: json!({ "title": section }),
            table_of_contents: json!([]),
        })
    }
}

// == Helper Functions ==

struct TestApp {
    router: Router,
    state: AppState,
    upstream: Arc<FakeUpstream>,
    content: Arc<FakeContent>,
}

fn create_test_app() -> TestApp {
    let upstream = Arc::new(FakeUpstream::new());
    let content = Arc::new(FakeContent::with_sections(&["about", "skills", "experience"]));
    let state = AppState::new(
        MemoryCache::new(100).shared(),
        None,
        content.clone(),
        upstream.clone(),
        Url::parse("http://localhost:3000").unwrap(),
        300,
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        upstream,
        content,
    }
}

async fn create_registered_app() -> TestApp {
    let app = create_test_app();
    let worker = app.state.worker("v1").unwrap();
    tokio_test::assert_ok!(app.state.registration.register(worker).await);
    app
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn get(app: &TestApp, uri: &str) -> Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_message(app: &TestApp, body: &str) -> Response {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri("/_worker/message")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn body_to_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// == Admin Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_stats_track_content_lookups() {
    let app = create_test_app();

    get(&app, "/_content/about").await;
    get(&app, "/_content/about").await;

    let json = body_to_json(get(&app, "/_cache/stats").await).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
}

// == Content Endpoint Tests ==

#[tokio::test]
async fn test_content_endpoint_caches_sections() {
    let app = create_test_app();

    let first = get(&app, "/_content/skills").await;
    assert_eq!(first.status(), StatusCode::OK);
    let json = body_to_json(first).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["content"]["html"], "<section>skills</section>");
    assert_eq!(json["content"]["frontmatter"]["title"], "skills");

    let second = get(&app, "/_content/skills").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(app.content.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_content_endpoint_failure_envelope() {
    let app = create_test_app();

    let response = get(&app, "/_content/hobbies").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_to_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("hobbies"));
}

// == Worker Lifecycle Tests ==

#[tokio::test]
async fn test_worker_status_after_registration() {
    let app = create_registered_app().await;

    let json = body_to_json(get(&app, "/_worker/status").await).await;
    assert_eq!(json["active_version"], "v1");
    assert_eq!(json["active_state"], "activated");
    assert_eq!(json["controller"], "v1");
    assert_eq!(
        json["cache_names"],
        json!(["resume-precache-v1", "resume-runtime-v1"])
    );
}

#[tokio::test]
async fn test_new_version_replaces_old_partitions() {
    let app = create_registered_app().await;

    let worker = app.state.worker("v2").unwrap();
    tokio_test::assert_ok!(app.state.registration.register(worker).await);

    let json = body_to_json(get(&app, "/_worker/status").await).await;
    assert_eq!(json["active_version"], "v2");
    assert_eq!(
        json["cache_names"],
        json!(["resume-precache-v2", "resume-runtime-v2"])
    );
}

#[tokio::test]
async fn test_failed_install_keeps_proxying() {
    let app = create_test_app();
    app.upstream.route("/offline", StatusCode::NOT_FOUND, "gone");

    let worker = app.state.worker("v1").unwrap();
    tokio_test::assert_err!(app.state.registration.register(worker).await);

    let response = get(&app, "/home").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(get(&app, "/_worker/status").await).await;
    assert!(json["active_version"].is_null());
    assert_eq!(json["cache_names"], json!([]));
}

// == Proxy Tests ==

#[tokio::test]
async fn test_images_served_from_cache_when_offline() {
    let app = create_registered_app().await;
    let image = || {
        Request::builder()
            .uri("/images/headshot.png")
            .header("sec-fetch-dest", "image")
            .body(Body::empty())
            .unwrap()
    };

    let first = send(&app, image()).await;
    assert_eq!(first.status(), StatusCode::OK);

    app.upstream.go_offline();
    let second = send(&app, image()).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_to_string(second).await, "png bytes");
}

#[tokio::test]
async fn test_offline_navigation_gets_offline_page() {
    let app = create_registered_app().await;
    app.upstream.go_offline();

    let response = send(
        &app,
        Request::builder()
            .uri("/projects")
            .header("sec-fetch-mode", "navigate")
            .header("sec-fetch-dest", "document")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response).await, "<h1>You are offline</h1>");
}

#[tokio::test]
async fn test_offline_api_request_without_copy_fails() {
    let app = create_registered_app().await;
    app.upstream.go_offline();

    let response = get(&app, "/api/content/projects").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_post_bypasses_the_worker() {
    let app = create_registered_app().await;
    let before = app.upstream.calls();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/contact")
            .body(Body::from("hello"))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.upstream.calls(), before + 1);

    // Not stored anywhere, so offline it is gone
    app.upstream.go_offline();
    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/contact")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// == Control Message Tests ==

#[tokio::test]
async fn test_skip_waiting_without_waiting_worker() {
    let app = create_registered_app().await;

    let response = post_message(&app, r#"{"type":"SKIP_WAITING"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response).await;
    assert_eq!(json["message"], "No worker waiting");
}

#[tokio::test]
async fn test_clear_cache_message() {
    let app = create_registered_app().await;

    let response = post_message(&app, r#"{"type":"CLEAR_CACHE"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response).await;
    assert_eq!(json["message"], "Cleared 2 cache partitions");

    let status = body_to_json(get(&app, "/_worker/status").await).await;
    assert_eq!(status["cache_names"], json!([]));
}

#[tokio::test]
async fn test_unknown_message_type_rejected() {
    let app = create_registered_app().await;

    let response = post_message(&app, r#"{"type":"RELOAD"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_to_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid request"));
}

#[tokio::test]
async fn test_message_without_worker() {
    let app = create_test_app();

    let json = body_to_json(post_message(&app, r#"{"type":"CLEAR_CACHE"}"#).await).await;
    assert_eq!(json["message"], "No worker registered");
}

#[tokio::test]
async fn test_message_without_content_type_is_parsed() {
    let app = create_registered_app().await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/_worker/message")
            .body(Body::from(r#"{"type":"RELOAD"}"#))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == Request Target Tests ==

#[tokio::test]
async fn test_foreign_absolute_target_is_refused() {
    let app = create_registered_app().await;
    let before = app.upstream.calls();

    let response = get(&app, "http://169.254.169.254/latest/meta-data").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.upstream.calls(), before);
}

#[tokio::test]
async fn test_scheme_relative_target_stays_on_upstream() {
    let app = create_registered_app().await;
    app.upstream
        .route("//169.254.169.254/latest/meta-data", StatusCode::OK, "local page");

    let response = get(&app, "//169.254.169.254/latest/meta-data").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response).await, "local page");
}
