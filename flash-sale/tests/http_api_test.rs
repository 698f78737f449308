//! HTTP API tests against the full router.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Duration;
use flash_sale::events::BroadcastSink;
use flash_sale::identity::IdentityRegistry;
use flash_sale::lifecycle::SaleSchedule;
use flash_sale::server::rate_limit::RateLimiter;
use flash_sale::server::{build_router, cache::StatusCache, with_middleware, AppState, RateLimits};
use flash_sale::{FlashSale, Product};
use flash_sale_core::environment::Clock;
use flash_sale_testing::{test_clock, ManualClock};
use serde_json::{json, Value};
use std::sync::Arc;

struct App {
    server: TestServer,
    clock: ManualClock,
}

fn app(stock: u32) -> App {
    app_with_limits(stock, RateLimits::disabled())
}

fn app_with_limits(stock: u32, rate_limits: RateLimits) -> App {
    let clock = ManualClock::starting_at(test_clock().now());
    let events = Arc::new(BroadcastSink::new(64));
    let sale = FlashSale::new(
        Product {
            id: "prod_123".to_string(),
            name: "Smart Watch New in 2025".to_string(),
            description: "Watch".to_string(),
            image_url: "https://example.com/watch.png".to_string(),
            total_stock: stock,
        },
        SaleSchedule::from_millis(1_000, 60_000),
        Arc::new(clock.clone()),
        events,
    );
    let state = AppState::new(
        sale,
        Arc::new(IdentityRegistry::new()),
        Arc::new(StatusCache::new(std::time::Duration::from_secs(60))),
    )
    .with_rate_limits(rate_limits);
    let router = with_middleware(build_router(state), "http://localhost:5173");
    let server = TestServer::new(router).expect("server failed");
    App { server, clock }
}

impl App {
    async fn open_window(&self) {
        self.server.get("/api/flash-sale/state").await;
        self.clock.advance(Duration::seconds(2));
    }
}

#[tokio::test]
async fn test_health_and_index() {
    let app = app(3);

    let health = app.server.get("/api/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    let body: Value = health.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Flash Sale API is running");
    assert!(body["uptime"].is_number());

    let index: Value = app.server.get("/").await.json();
    assert_eq!(index["success"], true);
    assert_eq!(index["message"], "Welcome to the Flash Sale API");
    assert_eq!(index["version"], env!("CARGO_PKG_VERSION"));
    let endpoints = index["endpoints"].as_array().expect("endpoint list");
    assert_eq!(endpoints.len(), 8);
    assert_eq!(endpoints[0], "GET /api/health");
    assert!(endpoints.contains(&json!("POST /api/flash-sale/purchase")));
    assert!(endpoints.contains(&json!("GET /api/flash-sale/user/:userId/purchase")));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = app(3);

    let response = app.server.get("/api/nope").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Endpoint not found");
}

#[tokio::test]
async fn test_state_has_cache_headers_and_etag() {
    let app = app(10);

    let response = app.server.get("/api/flash-sale/state").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header(header::CACHE_CONTROL), "public, max-age=1");
    let start_ms = (test_clock().now() + Duration::seconds(1)).timestamp_millis();
    let etag = response.header(header::ETAG);
    assert_eq!(etag, format!("\"10-UPCOMING-{start_ms}\"").as_str());

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "UPCOMING");
    assert_eq!(body["data"]["currentStock"], 10);
    assert_eq!(body["data"]["startTime"], start_ms);
    assert_eq!(body["data"]["product"]["id"], "prod_123");
}

#[tokio::test]
async fn test_matching_if_none_match_is_304() {
    let app = app(10);
    let first = app.server.get("/api/flash-sale/state").await;
    let etag = first.header(header::ETAG);

    let second = app
        .server
        .get("/api/flash-sale/state")
        .add_header(header::IF_NONE_MATCH, etag.clone())
        .await;
    assert_eq!(second.status_code(), StatusCode::NOT_MODIFIED);
    assert!(second.text().is_empty());
    assert_eq!(second.header(header::ETAG), etag);

    let stale = app
        .server
        .get("/api/flash-sale/state")
        .add_header(header::IF_NONE_MATCH, HeaderValue::from_static("\"stale\""))
        .await;
    assert_eq!(stale.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_purchase_flow_and_cache_invalidation() {
    let app = app(1);
    app.open_window().await;

    // served from cache until a purchase changes the sale
    let before: Value = app.server.get("/api/flash-sale/state").await.json();
    assert_eq!(before["data"]["status"], "UPCOMING");

    let accepted = app
        .server
        .post("/api/flash-sale/purchase")
        .json(&json!({ "userId": "user_alice" }))
        .await;
    assert_eq!(accepted.status_code(), StatusCode::OK);
    let body: Value = accepted.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Congratulations! You got one!");
    assert_eq!(body["userHasPurchased"], true);

    let after: Value = app.server.get("/api/flash-sale/state").await.json();
    assert_eq!(after["data"]["status"], "SOLD_OUT");
    assert_eq!(after["data"]["currentStock"], 0);

    let duplicate = app
        .server
        .post("/api/flash-sale/purchase")
        .json(&json!({ "userId": "user_alice" }))
        .await;
    assert_eq!(duplicate.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = duplicate.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "You have already purchased this item.");
    assert_eq!(body["userHasPurchased"], true);

    let sold_out: Value = app
        .server
        .post("/api/flash-sale/purchase")
        .json(&json!({ "userId": "user_bob" }))
        .await
        .json();
    assert_eq!(sold_out["message"], "Sorry, the item is sold out.");
    assert_eq!(sold_out["userHasPurchased"], false);

    let check: Value = app
        .server
        .get("/api/flash-sale/user/user_alice/purchase")
        .await
        .json();
    assert_eq!(check["data"]["hasPurchased"], true);
    assert_eq!(check["data"]["userId"], "user_alice");

    let stats: Value = app.server.get("/api/flash-sale/stats").await.json();
    assert_eq!(stats["data"]["totalPurchases"], 1);
    assert_eq!(stats["data"]["remainingStock"], 0);
    assert_eq!(stats["data"]["uniqueIdentityCount"], 1);

    let purchasers: Value = app.server.get("/api/flash-sale/purchasers").await.json();
    assert_eq!(purchasers["data"], json!(["user_alice"]));
}

#[tokio::test]
async fn test_purchase_before_window_is_400() {
    let app = app(3);

    let response = app
        .server
        .post("/api/flash-sale/purchase")
        .json(&json!({ "userId": "user_early" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "The sale is not active.");
    assert_eq!(body["userHasPurchased"], false);
}

#[tokio::test]
async fn test_purchase_validation_errors() {
    let app = app(3);

    let missing = app
        .server
        .post("/api/flash-sale/purchase")
        .json(&json!({}))
        .await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = missing.json();
    assert_eq!(body["message"], "Validation error");
    assert_eq!(body["details"], json!(["\"userId\" is required"]));

    let empty = app
        .server
        .post("/api/flash-sale/purchase")
        .json(&json!({ "userId": "" }))
        .await;
    assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = empty.json();
    assert_eq!(body["message"], "Validation error");
    assert_eq!(body["details"], json!(["\"userId\" is not allowed to be empty"]));

    for not_a_string in [json!({ "userId": 42 }), json!({ "userId": null })] {
        let response = app
            .server
            .post("/api/flash-sale/purchase")
            .json(&not_a_string)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["message"], "Validation error");
        assert_eq!(body["details"], json!(["\"userId\" must be a string"]));
    }

    let malformed = app
        .server
        .post("/api/flash-sale/purchase")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = malformed.json();
    assert_eq!(body["message"], "Invalid JSON format");
}

#[tokio::test]
async fn test_whitespace_user_id_reaches_admission() {
    let app = app(3);

    let response = app
        .server
        .post("/api/flash-sale/purchase")
        .json(&json!({ "userId": "   " }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "The sale is not active.");
}

fn limits(general: u32, purchase: u32) -> RateLimits {
    RateLimits {
        general: Some(RateLimiter::new(
            general,
            std::time::Duration::from_secs(15 * 60),
        )),
        purchase: Some(RateLimiter::new(purchase, std::time::Duration::from_secs(60))),
    }
}

fn forwarded_for(ip: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_static(ip),
    )
}

#[tokio::test]
async fn test_purchase_rate_limit_is_429_per_client() {
    let app = app_with_limits(10, limits(100, 3));
    app.open_window().await;
    let (name, alice_ip) = forwarded_for("203.0.113.1");

    for i in 0..3 {
        let response = app
            .server
            .post("/api/flash-sale/purchase")
            .add_header(name.clone(), alice_ip.clone())
            .json(&json!({ "userId": format!("user_{i}") }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let limited = app
        .server
        .post("/api/flash-sale/purchase")
        .add_header(name.clone(), alice_ip.clone())
        .json(&json!({ "userId": "user_3" }))
        .await;
    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.header(header::RETRY_AFTER).to_str().is_ok());
    let body: Value = limited.json();
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "Too many purchase attempts, please try again later."
    );

    // A different client still has its full budget.
    let (name, bob_ip) = forwarded_for("203.0.113.2");
    let other = app
        .server
        .post("/api/flash-sale/purchase")
        .add_header(name, bob_ip)
        .json(&json!({ "userId": "user_3" }))
        .await;
    assert_eq!(other.status_code(), StatusCode::OK);

    // The refused attempt never reached the sale.
    let stats: Value = app.server.get("/api/flash-sale/stats").await.json();
    assert_eq!(stats["data"]["totalPurchases"], 4);
}

#[tokio::test]
async fn test_general_rate_limit_exempts_the_status_endpoint() {
    let app = app_with_limits(10, limits(2, 10));

    for _ in 0..2 {
        let response = app.server.get("/api/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let limited = app.server.get("/api/flash-sale/stats").await;
    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = limited.json();
    assert_eq!(
        body["message"],
        "Too many requests from this IP, please try again later."
    );

    // Unknown routes count too.
    let unknown = app.server.get("/api/nope").await;
    assert_eq!(unknown.status_code(), StatusCode::TOO_MANY_REQUESTS);

    for _ in 0..5 {
        let state = app.server.get("/api/flash-sale/state").await;
        assert_eq!(state.status_code(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let app = app(3);

    for path in ["/api/health", "/api/nope"] {
        let response = app.server.get(path).await;
        assert_eq!(response.header(header::X_CONTENT_TYPE_OPTIONS), "nosniff");
        assert_eq!(response.header(header::X_FRAME_OPTIONS), "SAMEORIGIN");
        assert_eq!(response.header(header::REFERRER_POLICY), "no-referrer");
        assert_eq!(response.header(header::X_DNS_PREFETCH_CONTROL), "off");
        assert_eq!(
            response.header(HeaderName::from_static("cross-origin-resource-policy")),
            "same-origin"
        );
    }
}

#[tokio::test]
async fn test_reset_restores_stock() {
    let app = app(2);
    app.open_window().await;
    app.server
        .post("/api/flash-sale/purchase")
        .json(&json!({ "userId": "user_alice" }))
        .await;

    let reset = app.server.post("/api/flash-sale/reset").await;
    assert_eq!(reset.status_code(), StatusCode::OK);
    let body: Value = reset.json();
    assert_eq!(body["message"], "Flash sale has been reset");

    let state: Value = app.server.get("/api/flash-sale/state").await.json();
    assert_eq!(state["data"]["currentStock"], 2);
    assert_eq!(state["data"]["status"], "UPCOMING");

    let check: Value = app
        .server
        .get("/api/flash-sale/user/user_alice/purchase")
        .await
        .json();
    assert_eq!(check["data"]["hasPurchased"], false);
}

#[tokio::test]
async fn test_login_and_user_lookup() {
    let app = app(3);

    let login = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "alice" }))
        .await;
    assert_eq!(login.status_code(), StatusCode::OK);
    let body: Value = login.json();
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["id"], "user_alice");
    assert_eq!(body["data"]["username"], "alice");

    let user: Value = app.server.get("/api/auth/user/user_alice").await.json();
    assert_eq!(user["data"]["username"], "alice");

    let missing = app.server.get("/api/auth/user/user_nobody").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    let body: Value = missing.json();
    assert_eq!(body["message"], "User not found");

    let invalid = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "a!" }))
        .await;
    assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = invalid.json();
    assert_eq!(body["message"], "Validation error");
}
