mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use unionhub::database::Store;
use unionhub::permissions::Role;

use common::TestApp;

/// Create an application as `token`, sign and send every document, and
/// return the application id once it is pending validation.
async fn submit_application(app: &TestApp, token: &str) -> String {
    let (status, body) = app
        .request(
            Method::POST,
            "/api/applications",
            Some(token),
            Some(json!({
                "first_name": "Анна",
                "last_name": "Смирнова",
                "email": "anna.smirnova@union.test",
                "workplace": "Завод",
                "organization_id": app.primary,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "DRAFT");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let mut documents: Vec<Value> = body["data"]["documents"].as_array().cloned().unwrap_or_default();
    if documents.is_empty() {
        let (status, doc) = app
            .request(
                Method::POST,
                &format!("/api/applications/{}/documents", id),
                Some(token),
                Some(json!({ "title": "Заявление о вступлении" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        documents.push(doc["data"].clone());
    }

    let mut last = Value::Null;
    for doc in &documents {
        let doc_id = doc["id"].as_str().unwrap();
        let (status, _) = app
            .request(
                Method::POST,
                &format!("/api/applications/{}/documents/{}/sign", id, doc_id),
                Some(token),
                Some(json!({})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .request(
                Method::POST,
                &format!("/api/applications/{}/documents/{}/send", id, doc_id),
                Some(token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        last = body;
    }
    assert_eq!(last["data"]["status"], "PENDING_VALIDATION");
    id
}

#[tokio::test]
async fn approval_provisions_member_and_counts_them() {
    let app = TestApp::new().await;
    let officer = app.create_user(Role::PrimaryDeputyChairman, app.primary).await;
    let chairman = app.create_user(Role::PrimaryChairman, app.primary).await;
    let officer_token = app.login(&officer).await;
    let chairman_token = app.login(&chairman).await;

    let id = submit_application(&app, &officer_token).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/applications/{}/validate", id),
            Some(&chairman_token),
            Some(json!({ "status": "APPROVED" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "APPROVED");
    assert_eq!(body["data"]["reviewed_by"], chairman.id.to_string());

    let user_id: uuid::Uuid = body["data"]["user_id"].as_str().unwrap().parse().unwrap();
    let member = app.store.get_user(user_id).await.unwrap().expect("provisioned member");
    assert_eq!(member.role, Role::PrimaryMember);
    assert!(member.membership_validated);

    let org = app.store.get_organization(app.primary).await.unwrap().unwrap();
    assert_eq!(org.members_count, 1);
}

#[tokio::test]
async fn second_review_is_a_conflict() {
    let app = TestApp::new().await;
    let officer = app.create_user(Role::PrimaryDeputyChairman, app.primary).await;
    let chairman = app.create_user(Role::PrimaryChairman, app.primary).await;
    let officer_token = app.login(&officer).await;
    let chairman_token = app.login(&chairman).await;
    let id = submit_application(&app, &officer_token).await;
    let uri = format!("/api/applications/{}/validate", id);

    let (status, _) = app
        .request(
            Method::POST,
            &uri,
            Some(&chairman_token),
            Some(json!({ "status": "REJECTED", "rejection_reason": "Неполные данные" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::POST, &uri, Some(&chairman_token), Some(json!({ "status": "APPROVED" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn concurrent_reviews_have_one_winner() {
    let app = TestApp::new().await;
    let officer = app.create_user(Role::PrimaryDeputyChairman, app.primary).await;
    let chairman = app.create_user(Role::PrimaryChairman, app.primary).await;
    let local_chairman = app.create_user(Role::LocalChairman, app.local).await;
    let officer_token = app.login(&officer).await;
    let first = app.login(&chairman).await;
    let second = app.login(&local_chairman).await;
    let id = submit_application(&app, &officer_token).await;
    let uri = format!("/api/applications/{}/validate", id);

    let approve = Some(json!({ "status": "APPROVED" }));
    let (a, b) = tokio::join!(
        app.request(Method::POST, &uri, Some(&first), approve.clone()),
        app.request(Method::POST, &uri, Some(&second), approve.clone()),
    );

    let mut statuses = vec![a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let org = app.store.get_organization(app.primary).await.unwrap().unwrap();
    assert_eq!(org.members_count, 1);
}

#[tokio::test]
async fn review_status_must_be_terminal() {
    let app = TestApp::new().await;
    let officer = app.create_user(Role::PrimaryDeputyChairman, app.primary).await;
    let chairman = app.create_user(Role::PrimaryChairman, app.primary).await;
    let officer_token = app.login(&officer).await;
    let chairman_token = app.login(&chairman).await;
    let id = submit_application(&app, &officer_token).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/applications/{}/validate", id),
            Some(&chairman_token),
            Some(json!({ "status": "DRAFT" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn officers_cannot_validate() {
    let app = TestApp::new().await;
    let officer = app.create_user(Role::PrimaryDeputyChairman, app.primary).await;
    let officer_token = app.login(&officer).await;
    let id = submit_application(&app, &officer_token).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/applications/{}/validate", id),
            Some(&officer_token),
            Some(json!({ "status": "APPROVED" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn members_see_only_their_own_applications() {
    let app = TestApp::new().await;
    let officer = app.create_user(Role::PrimaryDeputyChairman, app.primary).await;
    let member = app.create_user(Role::PrimaryMember, app.primary).await;
    let officer_token = app.login(&officer).await;
    let member_token = app.login(&member).await;
    let id = submit_application(&app, &officer_token).await;

    let (status, body) = app.request(Method::GET, "/api/applications", Some(&member_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = app
        .request(Method::GET, &format!("/api/applications/{}", id), Some(&member_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
