// handlers/protected/organizations.rs - /api/organizations

use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Organization;
use crate::middleware::{Access, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::services::hierarchy::OrgNode;
use crate::services::organizations::{NewOrganization, OrganizationUpdate};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub parent_id: Option<Uuid>,
}

/// GET /api/organizations?parent_id=
pub async fn list(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<Organization>> {
    Ok(ApiResponse::success(state.organizations().list(&ctx, query.parent_id)?))
}

/// GET /api/organizations/tree
pub async fn tree(State(state): State<AppState>, Access(ctx): Access) -> ApiResult<Vec<OrgNode>> {
    Ok(ApiResponse::success(state.organizations().tree(&ctx)?))
}

pub async fn show(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Organization> {
    Ok(ApiResponse::success(state.organizations().get(&ctx, id)?))
}

pub async fn create(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiJson(body): ApiJson<NewOrganization>,
) -> ApiResult<Organization> {
    Ok(ApiResponse::created(state.organizations().create(&ctx, body).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<OrganizationUpdate>,
) -> ApiResult<Organization> {
    Ok(ApiResponse::success(state.organizations().update(&ctx, id, body).await?))
}

/// DELETE /api/organizations/:id - 409 while anything still hangs off it
pub async fn delete(State(state): State<AppState>, Access(ctx): Access, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Value> {
    state.organizations().delete(&ctx, id).await?;
    Ok(ApiResponse::deleted(id))
}
