// handlers/protected/news.rs - /api/news

use axum::extract::State;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::News;
use crate::middleware::{Access, ApiJson, ApiPath, ApiResponse, ApiResult};
use crate::services::news::{NewNews, NewsUpdate};

pub async fn list(State(state): State<AppState>, Access(ctx): Access) -> ApiResult<Vec<News>> {
    Ok(ApiResponse::success(state.news().list(&ctx).await?))
}

pub async fn create(State(state): State<AppState>, Access(ctx): Access, ApiJson(body): ApiJson<NewNews>) -> ApiResult<News> {
    Ok(ApiResponse::created(state.news().create(&ctx, body).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NewsUpdate>,
) -> ApiResult<News> {
    Ok(ApiResponse::success(state.news().update(&ctx, id, body).await?))
}

pub async fn delete(State(state): State<AppState>, Access(ctx): Access, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Value> {
    state.news().delete(&ctx, id).await?;
    Ok(ApiResponse::deleted(id))
}
