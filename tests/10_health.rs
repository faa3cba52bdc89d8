mod common;

use axum::http::{Method, StatusCode};

#[tokio::test]
async fn health_reports_ok_in_process() {
    let app = common::TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn root_describes_service() {
    let app = common::TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "unionhub");
}

#[tokio::test]
async fn binary_serves_health_with_memory_store() {
    let server = common::start_server().await.expect("server should start");

    let resp = reqwest::get(format!("{}/health", server.base_url))
        .await
        .expect("health request failed");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = resp.json().await.expect("health body");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn binary_rejects_protected_route_without_session() {
    let server = common::start_server().await.expect("server should start");

    let resp = reqwest::get(format!("{}/api/auth/me", server.base_url))
        .await
        .expect("me request failed");
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}
