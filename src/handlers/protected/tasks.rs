// handlers/protected/tasks.rs - /api/tasks

use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Task;
use crate::middleware::{Access, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::services::tasks::{NewTask, TaskStatusUpdate, TaskView};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub view: TaskView,
}

/// GET /api/tasks?view=assigned|created
pub async fn list(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<Task>> {
    Ok(ApiResponse::success(state.tasks().list(&ctx, query.view).await?))
}

pub async fn create(State(state): State<AppState>, Access(ctx): Access, ApiJson(body): ApiJson<NewTask>) -> ApiResult<Task> {
    Ok(ApiResponse::created(state.tasks().create(&ctx, body).await?))
}

/// PUT /api/tasks/:id/status - assignee or creator
pub async fn update_status(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<TaskStatusUpdate>,
) -> ApiResult<Task> {
    Ok(ApiResponse::success(state.tasks().update_status(&ctx, id, body).await?))
}

pub async fn delete(State(state): State<AppState>, Access(ctx): Access, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Value> {
    state.tasks().delete(&ctx, id).await?;
    Ok(ApiResponse::deleted(id))
}
