// handlers/public/system.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - service info
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "unionhub",
            "version": env!("CARGO_PKG_VERSION"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "endpoints": {
                "auth": "/api/auth/* (login and register are public)",
                "organizations": "/api/organizations[/:id], /api/organizations/tree",
                "users": "/api/users[/:id]",
                "applications": "/api/applications[/:id[/documents|/validate|/fees]]",
                "documents": "/api/documents[/:id[/participants/:user_id]]",
                "notifications": "/api/notifications",
                "news": "/api/news[/:id]",
                "tasks": "/api/tasks[/:id[/status]]",
                "messages": "/api/messages[/:id/read]",
                "reports": "/api/reports/membership",
            }
        }
    }))
}

/// GET /health - store ping; 503 while the store is unreachable
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
