//! Flash sale endpoints.
//!
//! - GET /api/flash-sale/state - Current sale view (cached, ETag aware)
//! - POST /api/flash-sale/purchase - Attempt a purchase
//! - GET /api/flash-sale/user/:user_id/purchase - Whether a user holds a unit
//! - GET /api/flash-sale/stats - Purchase statistics
//! - GET /api/flash-sale/purchasers - Identities holding a unit
//! - POST /api/flash-sale/reset - Start a fresh window

use super::ApiResponse;
use crate::identity::{identity_from_json, parse_identity};
use crate::metrics;
use crate::server::{error::AppError, state::AppState};
use crate::types::{Identity, SaleStats, SaleView};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `Cache-Control` sent with status responses
const STATUS_CACHE_CONTROL: &str = "public, max-age=1";

// ============================================================================
// Request / Response Types
// ============================================================================

/// Request body for a purchase attempt.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Buyer identity, as raw JSON
    ///
    /// An explicit `null` is `Some(Value::Null)`; an absent field is `None`.
    #[serde(rename = "userId", default, deserialize_with = "present")]
    pub user_id: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Response for a purchase attempt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    /// Whether a unit was claimed
    pub success: bool,
    /// User-facing message
    pub message: String,
    /// Whether the user holds a unit
    pub user_has_purchased: bool,
}

/// Response for a purchase check.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCheck {
    /// Whether the user holds a unit
    pub has_purchased: bool,
    /// The user asked about
    pub user_id: Identity,
}

// ============================================================================
// Handlers
// ============================================================================

/// Current sale view.
///
/// Served from the status cache while fresh. Answers 304 with no body when
/// `If-None-Match` carries the current ETag.
///
/// # Example
///
/// ```bash
/// curl -i http://localhost:3001/api/flash-sale/state
/// # ETag: "10-UPCOMING-1735689630000"
/// # {"success":true,"data":{"product":{...},"currentStock":10,"status":"UPCOMING",...}}
/// ```
pub async fn get_sale_state(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cached = if let Some(cached) = state.status_cache.get() {
        metrics::record_status_cache(true);
        cached
    } else {
        metrics::record_status_cache(false);
        let generation = state.status_cache.generation();
        let view = state.sale.current_state(None).await?;
        state.status_cache.put(view, generation)
    };

    let cache_headers = [
        (header::CACHE_CONTROL, STATUS_CACHE_CONTROL.to_string()),
        (header::ETAG, cached.etag.clone()),
    ];

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|tag| tag == cached.etag);
    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, cache_headers).into_response());
    }

    Ok((cache_headers, Json(ApiResponse::<SaleView>::data(cached.view))).into_response())
}

/// Attempt a purchase.
///
/// 200 when a unit was claimed, 400 for every business rejection.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3001/api/flash-sale/purchase \
///   -H 'content-type: application/json' -d '{"userId":"user_alice"}'
/// # {"success":true,"message":"Congratulations! You got one!","userHasPurchased":true}
/// ```
pub async fn attempt_purchase(
    State(state): State<AppState>,
    body: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let Json(request) = body?;
    let identity = identity_from_json(request.user_id.as_ref())?;

    let outcome = state.sale.attempt_purchase(&identity).await?;
    if outcome.accepted {
        state.status_cache.invalidate();
    }

    let code = if outcome.accepted {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((
        code,
        Json(PurchaseResponse {
            success: outcome.accepted,
            message: outcome.message.to_string(),
            user_has_purchased: outcome.identity_already_purchased,
        }),
    ))
}

/// Whether a user holds a unit in the current window.
pub async fn check_user_purchase(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<PurchaseCheck>>, AppError> {
    let identity = parse_identity(&user_id)?;
    let has_purchased = state.sale.has_purchased(&identity).await;
    Ok(Json(ApiResponse::data(PurchaseCheck {
        has_purchased,
        user_id: identity,
    })))
}

/// Purchase statistics for the current window.
pub async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<SaleStats>> {
    Json(ApiResponse::data(state.sale.stats().await))
}

/// Identities holding a unit in the current window.
pub async fn list_purchasers(State(state): State<AppState>) -> Json<ApiResponse<Vec<Identity>>> {
    let mut purchasers = state.sale.purchasers().await;
    purchasers.sort();
    Json(ApiResponse::data(purchasers))
}

/// Start a fresh window with full stock.
pub async fn reset_sale(State(state): State<AppState>) -> Result<Json<ApiResponse<()>>, AppError> {
    state.sale.reset_sale().await?;
    state.status_cache.invalidate();
    tracing::info!("Flash sale reset over HTTP");
    Ok(Json(ApiResponse::message("Flash sale has been reset")))
}
