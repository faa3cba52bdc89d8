// handlers/protected/applications.rs - /api/applications and its document,
// validation and fees sub-resources

use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{ApplicationStatus, MembershipApplication, MembershipDocument};
use crate::middleware::{Access, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::services::membership::{
    ApplicationDetail, ApplicationUpdate, FeesUpdate, NewApplication, NewMembershipDocument, ReviewRequest,
    SignDocument,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<ApplicationStatus>,
}

/// GET /api/applications?status=
pub async fn list(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<MembershipApplication>> {
    Ok(ApiResponse::success(state.membership().list(&ctx, query.status).await?))
}

/// GET /api/applications/:id - application with its documents
pub async fn show(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApplicationDetail> {
    Ok(ApiResponse::success(state.membership().get(&ctx, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiJson(body): ApiJson<NewApplication>,
) -> ApiResult<ApplicationDetail> {
    Ok(ApiResponse::created(state.membership().create(&ctx, body).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ApplicationUpdate>,
) -> ApiResult<ApplicationDetail> {
    Ok(ApiResponse::success(state.membership().update(&ctx, id, body).await?))
}

pub async fn delete(State(state): State<AppState>, Access(ctx): Access, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Value> {
    state.membership().delete(&ctx, id).await?;
    Ok(ApiResponse::deleted(id))
}

/// POST /api/applications/:id/documents
pub async fn add_document(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NewMembershipDocument>,
) -> ApiResult<MembershipDocument> {
    Ok(ApiResponse::created(state.membership().add_document(&ctx, id, body).await?))
}

/// POST /api/applications/:id/documents/:document_id/sign
pub async fn sign_document(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath((id, document_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<SignDocument>,
) -> ApiResult<MembershipDocument> {
    Ok(ApiResponse::success(
        state.membership().sign_document(&ctx, id, document_id, body).await?,
    ))
}

/// POST /api/applications/:id/documents/:document_id/send
///
/// Sending the last unsent document submits the application.
pub async fn send_document(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath((id, document_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<ApplicationDetail> {
    Ok(ApiResponse::success(
        state.membership().send_document(&ctx, id, document_id).await?,
    ))
}

/// POST /api/applications/:id/validate {status, rejection_reason?}
pub async fn validate(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ReviewRequest>,
) -> ApiResult<ApplicationDetail> {
    Ok(ApiResponse::success(state.membership().review(&ctx, id, body).await?))
}

/// PUT /api/applications/:id/fees
pub async fn set_fees(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<FeesUpdate>,
) -> ApiResult<ApplicationDetail> {
    Ok(ApiResponse::success(state.membership().set_fees(&ctx, id, body).await?))
}
