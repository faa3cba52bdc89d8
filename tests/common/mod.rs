#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use unionhub::app::{self, AppState};
use unionhub::auth;
use unionhub::config::{AppConfig, StoreBackend};
use unionhub::database::models::{Organization, OrganizationType, User};
use unionhub::database::{MemoryStore, Store};
use unionhub::mail::LogMailer;
use unionhub::permissions::Role;

pub const PASSWORD: &str = "correct-horse";

/// Router over a seeded in-memory store, driven with `oneshot`
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub federal: Uuid,
    pub region: Uuid,
    pub local: Uuid,
    pub primary: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut config = AppConfig::development();
        config.store = StoreBackend::Memory;
        config.security.bcrypt_cost = 4;

        let store = Arc::new(MemoryStore::new());
        let federal = Organization::new("Федеральный совет", OrganizationType::Federal, None);
        let region = Organization::new("Северный регион", OrganizationType::Regional, Some(federal.id));
        let local = Organization::new("Городская организация", OrganizationType::Local, Some(region.id));
        let primary = Organization::new("Первичка завода", OrganizationType::Primary, Some(local.id));
        for org in [&federal, &region, &local, &primary] {
            store.insert_organization(org).await.expect("seed organization");
        }

        let state = AppState::new(store.clone(), Arc::new(LogMailer), config);
        Self {
            router: app::router(state),
            store,
            federal: federal.id,
            region: region.id,
            local: local.id,
            primary: primary.id,
        }
    }

    pub async fn create_user(&self, role: Role, organization_id: Uuid) -> User {
        let hash = auth::hash_password(PASSWORD, 4).await.expect("hash password");
        let email = format!("{}@union.test", Uuid::new_v4().simple());
        let user = User::new(&email, hash, format!("{} user", role), role, Some(organization_id));
        self.store.insert_user(&user).await.expect("insert user");
        user
    }

    /// Log in over HTTP and return the bearer token.
    pub async fn login(&self, user: &User) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": user.email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["token"].as_str().expect("token").to_string()
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    /// Send an unparsed body, for exercising rejection paths.
    pub async fn request_raw(&self, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request");
        let response = self.router.clone().oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.router.clone().oneshot(request).await.expect("router response")
    }
}

/// The real binary on a free port with the in-memory store; killed on drop
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_unionhub"))
            .arg("serve")
            .env("APP_ENV", "development")
            .env("STORE_BACKEND", "memory")
            .env("MAIL_TRANSPORT", "log")
            .env("HOST", "127.0.0.1")
            .env("PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK.as_u16() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

pub async fn start_server() -> Result<TestServer> {
    let server = TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}
