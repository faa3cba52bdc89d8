// handlers/protected/auth.rs - /api/auth/{logout,me,permissions,password}

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth;
use crate::error::ApiError;
use crate::middleware::{Access, ApiJson, ApiResponse, ApiResult, CurrentUser, SessionToken};
use crate::permissions::{permission_table, permissions_for};
use crate::services::sessions::PasswordChange;

/// POST /api/auth/logout - end the current session and clear the cookie
pub async fn logout(State(state): State<AppState>, SessionToken(token): SessionToken) -> Result<impl IntoResponse, ApiError> {
    state.sessions().logout(&token).await?;
    let cookie = auth::expired_session_cookie(&state.config.session);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        ApiResponse::success(json!({ "logged_out": true })),
    ))
}

/// GET /api/auth/me
pub async fn me(Access(ctx): Access) -> ApiResult<Value> {
    let organization = ctx.user.organization_id.and_then(|id| ctx.tree.get(id).cloned());
    Ok(ApiResponse::success(json!({
        "user": ctx.user,
        "organization": organization,
        "permissions": permissions_for(ctx.user.role),
    })))
}

/// GET /api/auth/permissions - the role table UI clients gate on
pub async fn permissions(CurrentUser(user): CurrentUser) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "roles": permission_table(),
        "current": permissions_for(user.role),
    })))
}

/// PUT /api/auth/password - every session of the caller ends, this one too
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<PasswordChange>,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions().change_password(&user, body).await?;
    let cookie = auth::expired_session_cookie(&state.config.session);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        ApiResponse::success(json!({ "password_changed": true })),
    ))
}
