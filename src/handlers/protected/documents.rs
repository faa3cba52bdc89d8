// handlers/protected/documents.rs - /api/documents

use axum::extract::State;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::WorkflowDocument;
use crate::middleware::{Access, ApiJson, ApiPath, ApiResponse, ApiResult};
use crate::services::documents::{DocumentDetail, NewWorkflowDocument, ParticipantUpdate};

pub async fn list(State(state): State<AppState>, Access(ctx): Access) -> ApiResult<Vec<WorkflowDocument>> {
    Ok(ApiResponse::success(state.documents().list(&ctx).await?))
}

pub async fn show(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<DocumentDetail> {
    Ok(ApiResponse::success(state.documents().get(&ctx, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiJson(body): ApiJson<NewWorkflowDocument>,
) -> ApiResult<DocumentDetail> {
    Ok(ApiResponse::created(state.documents().create(&ctx, body).await?))
}

/// PUT /api/documents/:id/participants/:user_id {status, comment?}
pub async fn set_participant_status(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath((id, user_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<ParticipantUpdate>,
) -> ApiResult<DocumentDetail> {
    Ok(ApiResponse::success(
        state.documents().set_participant_status(&ctx, id, user_id, body).await?,
    ))
}
