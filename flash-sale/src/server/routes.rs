//! Router configuration for the flash sale service.

use super::error::AppError;
use super::health::health_check;
use super::middleware::{limit_purchases, limit_requests, security_headers};
use super::state::AppState;
use crate::api::{auth, sale};
use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Routes are mounted under `/api`; unknown paths answer 404 in the standard
/// error envelope. The state's rate limits apply to every route except the
/// sale status endpoint, with purchases held to their own stricter budget.
pub fn build_router(state: AppState) -> Router {
    let flash_sale_routes = Router::new()
        .route("/state", get(sale::get_sale_state))
        .route(
            "/purchase",
            post(sale::attempt_purchase).route_layer(middleware::from_fn_with_state(
                state.clone(),
                limit_purchases,
            )),
        )
        .route("/user/:user_id/purchase", get(sale::check_user_purchase))
        .route("/stats", get(sale::get_stats))
        .route("/purchasers", get(sale::list_purchasers))
        .route("/reset", post(sale::reset_sale));

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/user/:user_id", get(auth::get_user));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .nest("/flash-sale", flash_sale_routes);

    Router::new()
        .route("/", get(index))
        .nest("/api", api_routes)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), limit_requests))
        .with_state(state)
}

/// Add request tracing, security headers, and CORS for `cors_origin`.
///
/// An origin of `*` (or one that is not a valid header value) allows any origin.
pub fn with_middleware(router: Router, cors_origin: &str) -> Router {
    let origin = match HeaderValue::from_str(cors_origin) {
        Ok(value) if cors_origin != "*" => AllowOrigin::exact(value),
        _ => AllowOrigin::from(Any),
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    router
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Public endpoints listed by the index banner
const ENDPOINTS: [&str; 8] = [
    "GET /api/health",
    "POST /api/auth/login",
    "GET /api/auth/user/:userId",
    "GET /api/flash-sale/state",
    "POST /api/flash-sale/purchase",
    "GET /api/flash-sale/user/:userId/purchase",
    "GET /api/flash-sale/stats",
    "POST /api/flash-sale/reset",
];

async fn index() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Welcome to the Flash Sale API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
    }))
}

async fn not_found() -> AppError {
    AppError::not_found("Endpoint not found")
}
