// handlers/protected/users.rs - /api/users

use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{Access, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::services::users::{NewUser, UserUpdate};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub organization_id: Option<Uuid>,
}

/// GET /api/users?organization_id=
pub async fn list(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(state.users().list(&ctx, query.organization_id).await?))
}

pub async fn show(State(state): State<AppState>, Access(ctx): Access, ApiPath(id): ApiPath<Uuid>) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users().get(&ctx, id).await?))
}

pub async fn create(State(state): State<AppState>, Access(ctx): Access, ApiJson(body): ApiJson<NewUser>) -> ApiResult<User> {
    Ok(ApiResponse::created(state.users().create(&ctx, body).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UserUpdate>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users().update(&ctx, id, body).await?))
}

/// DELETE /api/users/:id - never a SUPER_ADMIN, never yourself
pub async fn delete(State(state): State<AppState>, Access(ctx): Access, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Value> {
    state.users().delete(&ctx, id).await?;
    Ok(ApiResponse::deleted(id))
}
