mod common;

use axum::http::{header, Method, StatusCode};
use serde_json::json;
use unionhub::database::Store;
use unionhub::permissions::Role;

use common::{TestApp, PASSWORD};

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    let user = app.create_user(Role::PrimaryMember, app.primary).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": user.email, "password": "not-the-password" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Неверный email или пароль");
}

#[tokio::test]
async fn login_with_unknown_email_matches_wrong_password() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@union.test", "password": PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Неверный email или пароль");
}

#[tokio::test]
async fn inactive_account_cannot_log_in() {
    let app = TestApp::new().await;
    let mut user = app.create_user(Role::PrimaryMember, app.primary).await;
    user.is_active = false;
    app.store.update_user(&user).await.unwrap();

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": user.email, "password": PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_sets_session_cookie() {
    let app = TestApp::new().await;
    let user = app.create_user(Role::LocalChairman, app.local).await;

    let response = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": user.email.to_uppercase(), "password": PASSWORD })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie")
        .to_string();
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn protected_routes_require_session() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Требуется авторизация");

    let (status, _) = app
        .request(Method::GET, "/api/organizations", Some("bogus-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_user_organization_and_permissions() {
    let app = TestApp::new().await;
    let user = app.create_user(Role::PrimaryChairman, app.primary).await;
    let token = app.login(&user).await;

    let (status, body) = app.request(Method::GET, "/api/auth/me", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], user.email.as_str());
    assert!(body["data"]["user"].get("password_hash").is_none());
    assert_eq!(body["data"]["organization"]["id"], app.primary.to_string());
    assert!(body["data"]["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "applications_validate"));
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new().await;
    let user = app.create_user(Role::PrimaryMember, app.primary).await;
    let token = app.login(&user).await;

    let (status, _) = app.request(Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.request(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "new.member@union.test",
                "password": "long-enough-password",
                "full_name": "Иван Петров",
                "organization_id": app.primary,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["role"], "PRIMARY_MEMBER");
    assert_eq!(body["data"]["membership_validated"], false);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "NEW.member@union.test",
                "password": "long-enough-password",
                "full_name": "Иван Петров",
                "organization_id": app.primary,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "new.member@union.test", "password": "long-enough-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_json_is_invalid_json() {
    let app = TestApp::new().await;

    let response = app.request_raw(Method::POST, "/api/auth/login", "{not json").await;
    assert_eq!(response.0, StatusCode::BAD_REQUEST);
    assert_eq!(response.1["code"], "INVALID_JSON");
}
