//! Request middleware: rate limits and security headers.

use super::error::AppError;
use super::rate_limit::{RateLimited, RateLimiter};
use super::state::AppState;
use crate::metrics::record_rate_limited;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

/// Path polled by clients; exempt from the general limit.
pub const STATUS_PATH: &str = "/api/flash-sale/state";

/// Body message when the general limit refuses a request
pub const GENERAL_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Body message when the purchase limit refuses a request
pub const PURCHASE_LIMIT_MESSAGE: &str = "Too many purchase attempts, please try again later.";

/// Apply the general per-client limit to every route but the status endpoint.
pub async fn limit_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.uri().path() == STATUS_PATH {
        return next.run(req).await;
    }
    match check(state.rate_limits.general.as_ref(), &req) {
        Ok(()) => next.run(req).await,
        Err(limited) => too_many_requests("general", GENERAL_LIMIT_MESSAGE, limited),
    }
}

/// Apply the purchase limit; layered on the purchase route only.
pub async fn limit_purchases(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match check(state.rate_limits.purchase.as_ref(), &req) {
        Ok(()) => next.run(req).await,
        Err(limited) => too_many_requests("purchase", PURCHASE_LIMIT_MESSAGE, limited),
    }
}

/// Add the standard hardening headers unless a handler already set them.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    for (name, value) in [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "no-referrer"),
        (header::X_DNS_PREFETCH_CONTROL, "off"),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            "same-origin",
        ),
        (
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            "none",
        ),
    ] {
        headers
            .entry(name)
            .or_insert(HeaderValue::from_static(value));
    }
    resp
}

fn check(limiter: Option<&RateLimiter>, req: &Request) -> Result<(), RateLimited> {
    let Some(limiter) = limiter else {
        return Ok(());
    };
    let connect_info = req.extensions().get::<ConnectInfo<SocketAddr>>();
    limiter.check_and_record(&client_key(req.headers(), connect_info))
}

/// Identify the client by `X-Forwarded-For` (first entry), then `X-Real-IP`,
/// then the peer address.
fn client_key(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    connect_info.map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

fn too_many_requests(limit: &'static str, message: &str, limited: RateLimited) -> Response {
    record_rate_limited(limit);

    let mut resp = AppError::too_many_requests(message).into_response();
    // Round up so clients never retry early.
    let seconds = limited.retry_after.as_secs() + u64::from(limited.retry_after.subsec_nanos() > 0);
    resp.headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(seconds.max(1)));
    resp
}
