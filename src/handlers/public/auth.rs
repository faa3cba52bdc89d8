// handlers/public/auth.rs - POST /api/auth/login, POST /api/auth/register

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
};

use crate::app::AppState;
use crate::auth;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::database::models::User;
use crate::services::sessions::{LoginRequest, RegisterRequest};

/// POST /api/auth/login - verify credentials and open a session
///
/// The token is returned in the body for API clients and set as an
/// HttpOnly cookie for browsers.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.sessions().login(body).await?;
    let cookie = auth::session_cookie(&state.config.session, &result.token);

    Ok((AppendHeaders([(SET_COOKIE, cookie.to_string())]), ApiResponse::success(result)))
}

/// POST /api/auth/register - create an unvalidated member account
pub async fn register(State(state): State<AppState>, ApiJson(body): ApiJson<RegisterRequest>) -> ApiResult<User> {
    let user = state.sessions().register(body).await?;
    Ok(ApiResponse::created(user))
}
