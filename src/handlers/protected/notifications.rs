// handlers/protected/notifications.rs - /api/notifications

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Notification;
use crate::error::ApiError;
use crate::middleware::{ApiPath, ApiQuery, ApiResponse, ApiResult, CurrentUser};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread: bool,
}

/// GET /api/notifications?unread=true
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<Notification>> {
    Ok(ApiResponse::success(state.notifier().list(&user, query.unread).await?))
}

/// POST /api/notifications/:id/read
pub async fn read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Value> {
    if !state.notifier().mark_read(&user, id).await? {
        return Err(ApiError::not_found("Уведомление не найдено"));
    }
    Ok(ApiResponse::success(json!({ "id": id, "is_read": true })))
}

/// POST /api/notifications/read-all
pub async fn read_all(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Value> {
    let updated = state.notifier().mark_all_read(&user).await?;
    Ok(ApiResponse::success(json!({ "updated": updated })))
}
