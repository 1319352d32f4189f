//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each status endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mini_cache::{api::create_router, AppState, CacheRegistry, NamedCache, StoreOptions};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

struct TestApp {
    registry: Arc<CacheRegistry>,
    users: Arc<NamedCache<String>>,
    orders: Arc<NamedCache<u64>>,
}

impl TestApp {
    fn new() -> Self {
        let registry = Arc::new(CacheRegistry::new());
        let users = registry.create_cache("users", StoreOptions::default());
        let orders = registry.create_cache("orders", StoreOptions::default());
        Self {
            registry,
            users,
            orders,
        }
    }

    fn router(&self) -> Router {
        create_router(AppState::new(Arc::clone(&self.registry)))
    }

    /// users: 3 hits, 1 miss. orders: 1 hit, 1 miss.
    fn record_traffic(&self) {
        self.users.set("1", "alice".to_string());
        self.users.set("2", "bob".to_string());
        self.users.get("1");
        self.users.get("2");
        self.users.has("1");
        self.users.get("3");

        self.orders.set("100", 250);
        self.orders.get("100");
        self.orders.get("101");
    }
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn cache_entry<'a>(json: &'a Value, name: &str) -> &'a Value {
    json["data"]["caches"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == name)
        .unwrap()
}

// == GET /cache-status ==

#[tokio::test]
async fn test_status_empty_registry() {
    let app = create_router(AppState::new(Arc::new(CacheRegistry::new())));

    let (status, json) = send(app, "GET", "/cache-status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["totalCaches"], 0);
    assert_eq!(json["data"]["totalSize"], 0);
    assert_eq!(json["data"]["overallHitRate"], 0.0);
    assert_eq!(json["data"]["caches"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_status_aggregates_caches() {
    let test_app = TestApp::new();
    test_app.record_traffic();

    let (status, json) = send(test_app.router(), "GET", "/cache-status").await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert!(data["timestamp"].as_str().is_some());
    assert_eq!(data["totalCaches"], 2);
    assert_eq!(data["totalSize"], 3);
    assert_eq!(data["totalHits"], 4);
    assert_eq!(data["totalMisses"], 2);
    let rate = data["overallHitRate"].as_f64().unwrap();
    assert!((rate - 0.6667).abs() < 0.0001, "overall hit rate was {rate}");

    let users = cache_entry(&json, "users");
    assert_eq!(users["hits"], 3);
    assert_eq!(users["misses"], 1);
    assert_eq!(users["hitRate"], 0.75);
    assert_eq!(users["totalRequests"], 4);
    assert_eq!(users["size"], 2);
    assert!(users["averageResponseTime"].as_f64().is_some());

    let orders = cache_entry(&json, "orders");
    assert_eq!(orders["hitRate"], 0.5);
}

#[tokio::test]
async fn test_status_omits_average_before_first_sample() {
    let test_app = TestApp::new();
    test_app.orders.set("1", 1);

    let (_, json) = send(test_app.router(), "GET", "/cache-status").await;

    let orders = cache_entry(&json, "orders");
    assert!(orders.get("averageResponseTime").is_none());
    assert_eq!(orders["size"], 1);
}

// == DELETE /cache-status ==

#[tokio::test]
async fn test_reset_all_keeps_data() {
    let test_app = TestApp::new();
    test_app.record_traffic();

    let (status, json) = send(test_app.router(), "DELETE", "/cache-status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["message"].as_str().unwrap().contains("reset"));

    let (_, json) = send(test_app.router(), "GET", "/cache-status").await;
    assert_eq!(json["data"]["totalHits"], 0);
    assert_eq!(json["data"]["totalMisses"], 0);
    assert_eq!(json["data"]["overallHitRate"], 0.0);
    assert_eq!(json["data"]["totalSize"], 3);
    assert_eq!(test_app.users.get("1"), Some("alice".to_string()));
}

// == DELETE /cache-status/:name ==

#[tokio::test]
async fn test_reset_single_cache() {
    let test_app = TestApp::new();
    test_app.record_traffic();

    let (status, json) = send(test_app.router(), "DELETE", "/cache-status/users").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("users"));

    let (_, json) = send(test_app.router(), "GET", "/cache-status").await;
    assert_eq!(cache_entry(&json, "users")["hits"], 0);
    assert_eq!(cache_entry(&json, "orders")["hits"], 1);
    assert_eq!(json["data"]["totalHits"], 1);
}

#[tokio::test]
async fn test_reset_unknown_cache_returns_404() {
    let test_app = TestApp::new();

    let (status, json) = send(test_app.router(), "DELETE", "/cache-status/payments").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("payments"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let test_app = TestApp::new();

    let response = test_app
        .router()
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
