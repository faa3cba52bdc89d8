// handlers/protected/messages.rs - /api/messages

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Message, MessageFolder};
use crate::middleware::{Access, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::services::messages::NewMessage;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub folder: MessageFolder,
}

/// GET /api/messages?folder=inbox|sent
pub async fn list(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<Message>> {
    Ok(ApiResponse::success(state.messages().list(&ctx, query.folder).await?))
}

pub async fn send(State(state): State<AppState>, Access(ctx): Access, ApiJson(body): ApiJson<NewMessage>) -> ApiResult<Message> {
    Ok(ApiResponse::created(state.messages().send(&ctx, body).await?))
}

/// POST /api/messages/:id/read - recipient only
pub async fn read(State(state): State<AppState>, Access(ctx): Access, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Value> {
    state.messages().mark_read(&ctx, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "is_read": true })))
}
