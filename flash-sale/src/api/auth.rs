//! Login endpoints.
//!
//! - POST /api/auth/login - Log in with a username
//! - GET /api/auth/user/:user_id - Look up a logged-in user

use super::ApiResponse;
use crate::identity::{parse_identity, User};
use crate::server::{error::AppError, state::AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username (3-30 ASCII letters and digits)
    #[serde(default)]
    pub username: String,
    /// Accepted for compatibility, not checked
    #[serde(default)]
    pub password: Option<String>,
}

/// Log in, creating the user on first login.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3001/api/auth/login \
///   -H 'content-type: application/json' -d '{"username":"alice"}'
/// # {"success":true,"message":"Login successful","data":{"id":"user_alice","username":"alice"}}
/// ```
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let Json(request) = body?;
    let user = state.identities.login(&request.username)?;
    Ok(Json(ApiResponse::data(user).with_message("Login successful")))
}

/// Look up a user by id.
///
/// Returns 404 for identities that never logged in.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let identity = parse_identity(&user_id)?;
    state
        .identities
        .user(&identity)
        .map(|user| Json(ApiResponse::data(user)))
        .ok_or_else(|| AppError::not_found("User not found"))
}
