// handlers/protected/reports.rs - GET /api/reports/membership

use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::{Access, ApiQuery, ApiResponse, ApiResult};
use crate::services::reports::MembershipReport;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub organization_id: Option<Uuid>,
}

pub async fn membership(
    State(state): State<AppState>,
    Access(ctx): Access,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<MembershipReport> {
    Ok(ApiResponse::success(
        state.reports().membership(&ctx, query.organization_id).await?,
    ))
}
