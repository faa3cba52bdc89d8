//! Membership-application workflow.
//!
//! An application moves DRAFT → PENDING_VALIDATION once every attached
//! document has been signed and sent to the union, then a chairman moves it
//! to APPROVED or REJECTED. Both moves are compare-and-set commits in the
//! store, so a second concurrent reviewer loses with a conflict.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth;
use crate::config::AppConfig;
use crate::database::models::{
    ApplicationFilter, ApplicationStatus, FeesStatus, MembershipApplication, MembershipDocument,
    MembershipDocumentStatus, Notification, NotificationKind, ReviewCommit, User,
};
use crate::database::store::Store;
use crate::mail::{MailMessage, Mailer};
use crate::permissions::{Permission, Role};
use crate::services::access::{AccessContext, FORBIDDEN_MESSAGE};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::notifier::Notifier;
use crate::services::{is_valid_email, non_empty};

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: MembershipApplication,
    pub documents: Vec<MembershipDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApplication {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub workplace: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    /// Members may omit this; it must match their own organization
    #[serde(default)]
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub workplace: Option<String>,
    pub position: Option<String>,
    pub organization_id: Option<Uuid>,
}

/// Only terminal outcomes are accepted; anything else fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for ApplicationStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => ApplicationStatus::Approved,
            ReviewDecision::Rejected => ApplicationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub status: ReviewDecision,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeesUpdate {
    pub fees_status: FeesStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMembershipDocument {
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignDocument {
    #[serde(default)]
    pub file_path: Option<String>,
}

pub struct MembershipService<'a> {
    store: &'a dyn Store,
    notifier: Notifier<'a>,
    config: &'a AppConfig,
}

impl<'a> MembershipService<'a> {
    pub fn new(store: &'a dyn Store, mailer: &'a dyn Mailer, config: &'a AppConfig) -> Self {
        Self {
            store,
            notifier: Notifier::new(store, mailer),
            config,
        }
    }

    pub async fn list(
        &self,
        ctx: &AccessContext,
        status: Option<ApplicationStatus>,
    ) -> ServiceResult<Vec<MembershipApplication>> {
        let filter = if ctx.can(Permission::ApplicationsView) {
            ApplicationFilter {
                organization_ids: ctx.scope.org_ids(),
                user_id: None,
                status,
            }
        } else {
            ApplicationFilter {
                organization_ids: None,
                user_id: Some(ctx.user.id),
                status,
            }
        };
        Ok(self.store.list_applications(&filter).await?)
    }

    pub async fn get(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<ApplicationDetail> {
        let application = self.load(id).await?;
        if !can_view(ctx, &application) {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        self.detail(application).await
    }

    pub async fn create(&self, ctx: &AccessContext, input: NewApplication) -> ServiceResult<ApplicationDetail> {
        ctx.require(Permission::ApplicationsSubmit)?;
        validate_personal(&input.first_name, &input.last_name, &input.email)?;

        let (organization_id, user_id) = if ctx.user.role == Role::PrimaryMember {
            if ctx.user.membership_validated {
                return Err(ServiceError::conflict("Членство уже подтверждено"));
            }
            let existing = self
                .store
                .list_applications(&ApplicationFilter {
                    user_id: Some(ctx.user.id),
                    ..Default::default()
                })
                .await?;
            if existing.iter().any(|a| a.status != ApplicationStatus::Rejected) {
                return Err(ServiceError::conflict("У вас уже есть активное заявление"));
            }
            let org = own_organization(ctx, input.organization_id)?;
            (org, Some(ctx.user.id))
        } else {
            let org = input
                .organization_id
                .ok_or_else(|| ServiceError::invalid_field("organization_id", "Укажите организацию"))?;
            ctx.require_scope(org)?;
            (org, None)
        };
        require_active_organization(ctx, organization_id)?;

        let now = Utc::now();
        let application = MembershipApplication {
            id: Uuid::new_v4(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            middle_name: non_empty(input.middle_name),
            birth_date: input.birth_date,
            email: input.email.trim().to_lowercase(),
            phone: non_empty(input.phone),
            workplace: non_empty(input.workplace),
            position: non_empty(input.position),
            organization_id,
            user_id,
            status: ApplicationStatus::Draft,
            fees_status: FeesStatus::NotPaid,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        let documents: Vec<MembershipDocument> = self
            .config
            .membership
            .default_documents
            .iter()
            .map(|title| MembershipDocument::new(application.id, title.as_str()))
            .collect();

        self.store.insert_application(&application, &documents).await?;
        tracing::info!(
            "Application {} created for organization {} by {}",
            application.id,
            organization_id,
            ctx.user.id
        );

        Ok(ApplicationDetail {
            application,
            documents,
        })
    }

    pub async fn update(
        &self,
        ctx: &AccessContext,
        id: Uuid,
        input: ApplicationUpdate,
    ) -> ServiceResult<ApplicationDetail> {
        let mut application = self.load_draft_for_edit(ctx, id).await?;

        if let Some(v) = input.first_name {
            application.first_name = v.trim().to_string();
        }
        if let Some(v) = input.last_name {
            application.last_name = v.trim().to_string();
        }
        if let Some(v) = input.email {
            application.email = v.trim().to_lowercase();
        }
        if input.middle_name.is_some() {
            application.middle_name = non_empty(input.middle_name);
        }
        if input.birth_date.is_some() {
            application.birth_date = input.birth_date;
        }
        if input.phone.is_some() {
            application.phone = non_empty(input.phone);
        }
        if input.workplace.is_some() {
            application.workplace = non_empty(input.workplace);
        }
        if input.position.is_some() {
            application.position = non_empty(input.position);
        }
        if let Some(org) = input.organization_id {
            if org != application.organization_id {
                if application.user_id == Some(ctx.user.id) {
                    own_organization(ctx, Some(org))?;
                } else {
                    ctx.require_scope(org)?;
                }
                require_active_organization(ctx, org)?;
                application.organization_id = org;
            }
        }
        validate_personal(&application.first_name, &application.last_name, &application.email)?;

        application.updated_at = Utc::now();
        self.store.update_application(&application).await?;
        self.detail(application).await
    }

    pub async fn delete(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<()> {
        let application = self.load_draft_for_edit(ctx, id).await?;
        self.store.delete_application(application.id).await?;
        tracing::info!("Application {} deleted by {}", application.id, ctx.user.id);
        Ok(())
    }

    pub async fn add_document(
        &self,
        ctx: &AccessContext,
        id: Uuid,
        input: NewMembershipDocument,
    ) -> ServiceResult<MembershipDocument> {
        let application = self.load_draft_for_edit(ctx, id).await?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ServiceError::invalid_field("title", "Обязательное поле"));
        }
        let document = MembershipDocument::new(application.id, title);
        self.store.insert_membership_document(&document).await?;
        Ok(document)
    }

    pub async fn sign_document(
        &self,
        ctx: &AccessContext,
        id: Uuid,
        document_id: Uuid,
        input: SignDocument,
    ) -> ServiceResult<MembershipDocument> {
        let application = self.load_draft_for_edit(ctx, id).await?;
        let mut document = self.load_document(&application, document_id).await?;
        if document.sent_to_union {
            return Err(ServiceError::conflict("Документ уже отправлен в профсоюз"));
        }

        document.status = MembershipDocumentStatus::Signed;
        document.signed_at = document.signed_at.or_else(|| Some(Utc::now()));
        if let Some(path) = non_empty(input.file_path) {
            document.file_path = Some(path);
        }
        self.store.update_membership_document(&document).await?;
        Ok(document)
    }

    /// Mark a signed document as sent. Sending the last outstanding document
    /// submits the application for validation.
    pub async fn send_document(
        &self,
        ctx: &AccessContext,
        id: Uuid,
        document_id: Uuid,
    ) -> ServiceResult<ApplicationDetail> {
        let application = self.load(id).await?;
        if !can_edit(ctx, &application) {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        let mut document = self.load_document(&application, document_id).await?;
        if document.sent_to_union {
            return self.detail(application).await;
        }
        if application.status != ApplicationStatus::Draft {
            return Err(ServiceError::conflict("Заявление уже отправлено на проверку"));
        }
        if document.status != MembershipDocumentStatus::Signed {
            return Err(ServiceError::invalid_field(
                "status",
                "Документ должен быть подписан перед отправкой",
            ));
        }

        let now = Utc::now();
        document.sent_to_union = true;
        document.sent_at = Some(now);
        self.store.update_membership_document(&document).await?;

        let documents = self.store.list_membership_documents(application.id).await?;
        if !documents.is_empty() && documents.iter().all(|d| d.sent_to_union) {
            let mut submitted = application.clone();
            submitted.status = ApplicationStatus::PendingValidation;
            submitted.updated_at = now;

            let commit = ReviewCommit {
                application: submitted.clone(),
                expected: ApplicationStatus::Draft,
                provisioned_user: None,
                validated_user_id: None,
                increment_members: false,
            };
            if self.store.commit_review(&commit).await? {
                tracing::info!("Application {} submitted for validation", submitted.id);
                self.notify_submitted(&submitted).await;
                return Ok(ApplicationDetail {
                    application: submitted,
                    documents,
                });
            }
        }

        let application = self.load(id).await?;
        Ok(ApplicationDetail {
            application,
            documents,
        })
    }

    /// Approve or reject a pending application.
    pub async fn review(&self, ctx: &AccessContext, id: Uuid, input: ReviewRequest) -> ServiceResult<ApplicationDetail> {
        let application = self.load(id).await?;
        if !ctx.can_review(application.organization_id) {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        if application.status != ApplicationStatus::PendingValidation {
            return Err(ServiceError::conflict("Заявление не ожидает проверки"));
        }

        let now = Utc::now();
        let mut reviewed = application.clone();
        reviewed.status = input.status.into();
        reviewed.reviewed_by = Some(ctx.user.id);
        reviewed.reviewed_at = Some(now);
        reviewed.updated_at = now;

        let mut provisioned_user = None;
        let mut temporary_password = None;
        let mut validated_user_id = None;
        let mut increment_members = false;

        match input.status {
            ReviewDecision::Approved => {
                reviewed.rejection_reason = None;
                match application.user_id {
                    Some(user_id) => {
                        self.check_applicant(user_id, application.organization_id).await?;
                        validated_user_id = Some(user_id);
                    }
                    None => {
                        let password = auth::generate_temporary_password();
                        let hash = auth::hash_password(&password, self.config.security.bcrypt_cost).await?;
                        let mut user = User::new(
                            &self.placeholder_email(&application),
                            hash,
                            application.full_name(),
                            Role::PrimaryMember,
                            Some(application.organization_id),
                        );
                        user.membership_validated = true;
                        reviewed.user_id = Some(user.id);
                        provisioned_user = Some(user);
                        temporary_password = Some(password);
                    }
                }
                increment_members = true;
            }
            ReviewDecision::Rejected => {
                reviewed.rejection_reason = non_empty(input.rejection_reason);
            }
        }

        let commit = ReviewCommit {
            application: reviewed.clone(),
            expected: ApplicationStatus::PendingValidation,
            provisioned_user: provisioned_user.clone(),
            validated_user_id,
            increment_members,
        };
        if !self.store.commit_review(&commit).await? {
            return Err(ServiceError::conflict("Заявление уже рассмотрено"));
        }
        tracing::info!(
            "Application {} {:?} by {}",
            reviewed.id,
            reviewed.status,
            ctx.user.id
        );

        self.after_review(&reviewed, provisioned_user.as_ref(), temporary_password.as_deref())
            .await;
        self.detail(reviewed).await
    }

    pub async fn set_fees(&self, ctx: &AccessContext, id: Uuid, input: FeesUpdate) -> ServiceResult<ApplicationDetail> {
        let mut application = self.load(id).await?;
        if !ctx.can_review(application.organization_id) {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        application.fees_status = input.fees_status;
        application.updated_at = Utc::now();
        self.store.update_application(&application).await?;
        self.detail(application).await
    }

    /// The linked account must still be a rank-and-file member of the
    /// organization the application counts toward.
    async fn check_applicant(&self, user_id: Uuid, organization_id: Uuid) -> ServiceResult<()> {
        let applicant = self.store.get_user(user_id).await?;
        match applicant {
            Some(user) if user.role == Role::PrimaryMember && user.organization_id == Some(organization_id) => Ok(()),
            _ => Err(ServiceError::conflict(
                "Заявитель больше не состоит рядовым членом этой организации",
            )),
        }
    }

    fn placeholder_email(&self, application: &MembershipApplication) -> String {
        format!(
            "member-{}@{}",
            application.id.simple(),
            self.config.membership.placeholder_domain
        )
    }

    async fn notify_submitted(&self, application: &MembershipApplication) {
        let Some(org) = self.organization(application.organization_id).await else {
            return;
        };
        let message = format!("Новое заявление на вступление: {}", application.full_name());
        self.notifier
            .notify_chairman(&org, |chairman| {
                Notification::new(chairman, NotificationKind::ApplicationSubmitted, message)
                    .for_application(application.id)
            })
            .await;
    }

    async fn after_review(
        &self,
        application: &MembershipApplication,
        provisioned: Option<&User>,
        temporary_password: Option<&str>,
    ) {
        let org = self.organization(application.organization_id).await;
        let org_name = org.as_ref().map(|o| o.name.as_str()).unwrap_or("");

        match application.status {
            ApplicationStatus::Approved => {
                if let Some(user_id) = application.user_id {
                    self.notifier
                        .notify(
                            Notification::new(
                                user_id,
                                NotificationKind::ApplicationApproved,
                                "Ваше заявление о вступлении в профсоюз одобрено",
                            )
                            .for_application(application.id),
                        )
                        .await;
                }

                let mut text = format!(
                    "Здравствуйте, {}!\n\nВаше заявление о вступлении в профсоюз ({}) одобрено.",
                    application.full_name(),
                    org_name
                );
                if let (Some(user), Some(password)) = (provisioned, temporary_password) {
                    text.push_str(&format!(
                        "\n\nДанные для входа:\nЛогин: {}\nВременный пароль: {}\n\nСмените пароль после первого входа.",
                        user.email, password
                    ));
                }
                self.notifier
                    .email(MailMessage::new(&application.email, "Заявление одобрено", text))
                    .await;

                if let Some(org) = &org {
                    let message = format!("Новый член профсоюза: {}", application.full_name());
                    self.notifier
                        .notify_chairman(org, |chairman| {
                            Notification::new(chairman, NotificationKind::NewMember, message)
                                .for_application(application.id)
                        })
                        .await;
                }
            }
            ApplicationStatus::Rejected => {
                let reason = application
                    .rejection_reason
                    .as_deref()
                    .map(|r| format!(" Причина: {}", r))
                    .unwrap_or_default();

                if let Some(user_id) = application.user_id {
                    self.notifier
                        .notify(
                            Notification::new(
                                user_id,
                                NotificationKind::ApplicationRejected,
                                format!("Ваше заявление о вступлении отклонено.{}", reason),
                            )
                            .for_application(application.id),
                        )
                        .await;
                }

                let text = format!(
                    "Здравствуйте, {}!\n\nВаше заявление о вступлении в профсоюз ({}) отклонено.{}",
                    application.full_name(),
                    org_name,
                    reason
                );
                self.notifier
                    .email(MailMessage::new(&application.email, "Заявление отклонено", text))
                    .await;

                if let Some(org) = &org {
                    let message = format!("Заявление отклонено: {}", application.full_name());
                    self.notifier
                        .notify_chairman(org, |chairman| {
                            Notification::new(chairman, NotificationKind::ApplicationRejected, message)
                                .for_application(application.id)
                        })
                        .await;
                }
            }
            _ => {}
        }
    }

    async fn organization(&self, id: Uuid) -> Option<crate::database::models::Organization> {
        match self.store.get_organization(id).await {
            Ok(org) => org,
            Err(e) => {
                tracing::warn!("Could not load organization {}: {}", id, e);
                None
            }
        }
    }

    async fn load(&self, id: Uuid) -> ServiceResult<MembershipApplication> {
        self.store
            .get_application(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Заявление не найдено"))
    }

    async fn load_draft_for_edit(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<MembershipApplication> {
        let application = self.load(id).await?;
        if !can_edit(ctx, &application) {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        if application.status != ApplicationStatus::Draft {
            return Err(ServiceError::conflict("Изменять можно только черновик заявления"));
        }
        Ok(application)
    }

    async fn load_document(
        &self,
        application: &MembershipApplication,
        document_id: Uuid,
    ) -> ServiceResult<MembershipDocument> {
        self.store
            .get_membership_document(document_id)
            .await?
            .filter(|d| d.application_id == application.id)
            .ok_or_else(|| ServiceError::not_found("Документ не найден"))
    }

    async fn detail(&self, application: MembershipApplication) -> ServiceResult<ApplicationDetail> {
        let documents = self.store.list_membership_documents(application.id).await?;
        Ok(ApplicationDetail {
            application,
            documents,
        })
    }
}

fn can_view(ctx: &AccessContext, application: &MembershipApplication) -> bool {
    application.user_id == Some(ctx.user.id)
        || (ctx.can(Permission::ApplicationsView) && ctx.in_scope(application.organization_id))
}

/// The applicant themselves, or an officer entering applications for an
/// organization in their scope.
fn can_edit(ctx: &AccessContext, application: &MembershipApplication) -> bool {
    application.user_id == Some(ctx.user.id)
        || (ctx.user.role != Role::PrimaryMember
            && ctx.can(Permission::ApplicationsSubmit)
            && ctx.in_scope(application.organization_id))
}

/// Members apply to the organization they already belong to.
fn own_organization(ctx: &AccessContext, requested: Option<Uuid>) -> ServiceResult<Uuid> {
    let home = ctx
        .user
        .organization_id
        .ok_or_else(|| ServiceError::invalid_field("organization_id", "Вы не состоите ни в одной организации"))?;
    match requested {
        Some(org) if org != home => Err(ServiceError::invalid_field(
            "organization_id",
            "Заявление подается только в свою организацию",
        )),
        _ => Ok(home),
    }
}

fn require_active_organization(ctx: &AccessContext, org_id: Uuid) -> ServiceResult<()> {
    match ctx.tree.get(org_id) {
        Some(org) if org.is_active => Ok(()),
        _ => Err(ServiceError::invalid_field(
            "organization_id",
            "Организация не найдена или неактивна",
        )),
    }
}

fn validate_personal(first_name: &str, last_name: &str, email: &str) -> ServiceResult<()> {
    if first_name.trim().is_empty() {
        return Err(ServiceError::invalid_field("first_name", "Обязательное поле"));
    }
    if last_name.trim().is_empty() {
        return Err(ServiceError::invalid_field("last_name", "Обязательное поле"));
    }
    if !is_valid_email(email) {
        return Err(ServiceError::invalid_field("email", "Некорректный email"));
    }
    Ok(())
}
