//! Shared fixtures for unit tests: a seeded in-memory store, a mailer that
//! records what it was asked to send, and service constructors.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth;
use crate::config::{AppConfig, StoreBackend};
use crate::database::models::{MembershipApplication, Organization, OrganizationType, User};
use crate::database::store::Store;
use crate::database::MemoryStore;
use crate::mail::{MailError, MailMessage, Mailer};
use crate::permissions::Role;
use crate::services::documents::DocumentService;
use crate::services::membership::{MembershipService, NewApplication, ReviewDecision, ReviewRequest, SignDocument};
use crate::services::messages::MessageService;
use crate::services::news::NewsService;
use crate::services::organizations::OrganizationService;
use crate::services::reports::ReportService;
use crate::services::sessions::{LoginRequest, SessionService};
use crate::services::tasks::TaskService;
use crate::services::users::UserService;
use crate::services::AccessContext;
use crate::services::hierarchy::OrgTree;

pub const TEST_PASSWORD: &str = "test-password";

/// Federal → region → local → primary → sub_primary, plus a second region
/// hanging off federal.
pub struct OrgFixture {
    pub organizations: Vec<Organization>,
    pub federal: Uuid,
    pub region: Uuid,
    pub local: Uuid,
    pub primary: Uuid,
    pub sub_primary: Uuid,
    pub other_region: Uuid,
}

impl OrgFixture {
    pub fn new() -> Self {
        let federal = Organization::new("Федеральный совет", OrganizationType::Federal, None);
        let region = Organization::new("Северный регион", OrganizationType::Regional, Some(federal.id));
        let local = Organization::new("Городская организация", OrganizationType::Local, Some(region.id));
        let primary = Organization::new("Первичка завода", OrganizationType::Primary, Some(local.id));
        let sub_primary = Organization::new("Цеховая первичка", OrganizationType::Primary, Some(primary.id));
        let other_region = Organization::new("Южный регион", OrganizationType::Regional, Some(federal.id));

        Self {
            federal: federal.id,
            region: region.id,
            local: local.id,
            primary: primary.id,
            sub_primary: sub_primary.id,
            other_region: other_region.id,
            organizations: vec![federal, region, local, primary, sub_primary, other_region],
        }
    }

    pub fn tree(&self) -> OrgTree {
        OrgTree::from_organizations(&self.organizations)
    }

    /// Unsaved user with an unusable password hash
    pub fn user(&self, role: Role, organization_id: Uuid) -> User {
        User::new(
            &format!("{}@union.test", Uuid::new_v4().simple()),
            String::new(),
            format!("{} user", role),
            role,
            Some(organization_id),
        )
    }
}

/// Mailer that keeps every message, or fails every send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Other("connection refused".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.store = StoreBackend::Memory;
    config.security.bcrypt_cost = 4;
    config
}

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub config: AppConfig,
    pub orgs: OrgFixture,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_mailer(RecordingMailer::default()).await
    }

    pub async fn with_failing_mailer() -> Self {
        Self::with_mailer(RecordingMailer::failing()).await
    }

    async fn with_mailer(mailer: RecordingMailer) -> Self {
        let store = Arc::new(MemoryStore::new());
        let orgs = OrgFixture::new();
        for org in &orgs.organizations {
            store.insert_organization(org).await.expect("seed organization");
        }
        Self {
            store,
            mailer: Arc::new(mailer),
            config: test_config(),
            orgs,
        }
    }

    /// Persisted active user whose password is [`TEST_PASSWORD`].
    pub async fn create_user(&self, role: Role, organization_id: Uuid) -> User {
        let mut user = self.orgs.user(role, organization_id);
        user.password_hash = auth::hash_password(TEST_PASSWORD, self.config.security.bcrypt_cost)
            .await
            .expect("hash password");
        self.store.insert_user(&user).await.expect("insert user");
        user
    }

    pub async fn access(&self, user: &User) -> AccessContext {
        AccessContext::load(self.store.as_ref(), user.clone())
            .await
            .expect("load access context")
    }

    /// Session token for `user`
    pub async fn login(&self, user: &User) -> String {
        self.sessions()
            .login(LoginRequest {
                email: user.email.clone(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("login")
            .token
    }

    /// Take a fresh application for `org` from creation to approval, acting
    /// as a new SUPER_ADMIN.
    pub async fn approved_application(&self, org: Uuid) -> MembershipApplication {
        let admin = self.create_user(Role::SuperAdmin, self.orgs.federal).await;
        let ctx = self.access(&admin).await;
        let svc = self.membership();

        let detail = svc
            .create(
                &ctx,
                NewApplication {
                    first_name: "Пётр".into(),
                    last_name: "Сидоров".into(),
                    middle_name: None,
                    birth_date: None,
                    email: "petr.sidorov@example.org".into(),
                    phone: None,
                    workplace: None,
                    position: None,
                    organization_id: Some(org),
                },
            )
            .await
            .expect("create application");
        for doc in &detail.documents {
            svc.sign_document(&ctx, detail.application.id, doc.id, SignDocument::default())
                .await
                .expect("sign document");
            svc.send_document(&ctx, detail.application.id, doc.id)
                .await
                .expect("send document");
        }
        svc.review(
            &ctx,
            detail.application.id,
            ReviewRequest {
                status: ReviewDecision::Approved,
                rejection_reason: None,
            },
        )
        .await
        .expect("approve application")
        .application
    }

    pub fn membership(&self) -> MembershipService<'_> {
        MembershipService::new(self.store.as_ref(), self.mailer.as_ref(), &self.config)
    }

    pub fn documents(&self) -> DocumentService<'_> {
        DocumentService::new(self.store.as_ref(), self.mailer.as_ref())
    }

    pub fn sessions(&self) -> SessionService<'_> {
        SessionService::new(self.store.as_ref(), &self.config)
    }

    pub fn organizations(&self) -> OrganizationService<'_> {
        OrganizationService::new(self.store.as_ref())
    }

    pub fn users(&self) -> UserService<'_> {
        UserService::new(self.store.as_ref(), self.mailer.as_ref(), &self.config)
    }

    pub fn news(&self) -> NewsService<'_> {
        NewsService::new(self.store.as_ref())
    }

    pub fn tasks(&self) -> TaskService<'_> {
        TaskService::new(self.store.as_ref(), self.mailer.as_ref())
    }

    pub fn messages(&self) -> MessageService<'_> {
        MessageService::new(self.store.as_ref(), self.mailer.as_ref())
    }

    pub fn reports(&self) -> ReportService<'_> {
        ReportService::new(self.store.as_ref())
    }
}
