use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth;
use crate::config::AppConfig;
use crate::database::manager::DatabaseError;
use crate::database::models::{user::normalize_email, User, WorkflowDocumentStatus};
use crate::database::store::Store;
use crate::mail::Mailer;
use crate::permissions::{Permission, Role};
use crate::services::access::{AccessContext, FORBIDDEN_MESSAGE};
use crate::services::deserialize_some;
use crate::services::documents::DocumentService;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::sessions::check_password_strength;
use crate::services::{is_valid_email, non_empty};

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub organization_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
    pub membership_validated: Option<bool>,
    pub password: Option<String>,
}

fn user_in_scope(ctx: &AccessContext, user: &User) -> bool {
    ctx.is_admin() || user.organization_id.map_or(false, |org| ctx.in_scope(org))
}

pub struct UserService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    config: &'a AppConfig,
}

impl<'a> UserService<'a> {
    pub fn new(store: &'a dyn Store, mailer: &'a dyn Mailer, config: &'a AppConfig) -> Self {
        Self { store, mailer, config }
    }

    pub async fn list(&self, ctx: &AccessContext, organization_id: Option<Uuid>) -> ServiceResult<Vec<User>> {
        ctx.require(Permission::UsersView)?;
        let users = match organization_id {
            Some(org) => {
                ctx.require_scope(org)?;
                self.store.list_users(Some(&[org])).await?
            }
            None => {
                let ids = ctx.scope.org_ids();
                self.store.list_users(ids.as_deref()).await?
            }
        };
        Ok(users)
    }

    pub async fn get(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<User> {
        let user = self.load(id).await?;
        if user.id == ctx.user.id || (ctx.can(Permission::UsersView) && user_in_scope(ctx, &user)) {
            Ok(user)
        } else {
            Err(ServiceError::forbidden(FORBIDDEN_MESSAGE))
        }
    }

    pub async fn create(&self, ctx: &AccessContext, input: NewUser) -> ServiceResult<User> {
        ctx.require(Permission::UsersManage)?;
        if !ctx.user.role.can_assign(input.role) {
            return Err(ServiceError::forbidden("Недостаточно прав для назначения этой роли"));
        }
        match input.organization_id {
            Some(org) => {
                if !ctx.tree.contains(org) {
                    return Err(ServiceError::invalid_field("organization_id", "Организация не найдена"));
                }
                ctx.require_scope(org)?;
            }
            None if !ctx.is_admin() => {
                return Err(ServiceError::invalid_field("organization_id", "Обязательное поле"));
            }
            None => {}
        }

        let email = normalize_email(&input.email);
        if !is_valid_email(&email) {
            return Err(ServiceError::invalid_field("email", "Некорректный email"));
        }
        check_password_strength(&input.password)?;
        let full_name = non_empty(Some(input.full_name))
            .ok_or_else(|| ServiceError::invalid_field("full_name", "Обязательное поле"))?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::conflict("Пользователь с таким email уже существует"));
        }

        let hash = auth::hash_password(&input.password, self.config.security.bcrypt_cost).await?;
        let user = User::new(&email, hash, full_name, input.role, input.organization_id);
        self.store.insert_user(&user).await?;
        tracing::info!("User {} ({}) created by {}", user.id, user.role, ctx.user.id);
        Ok(user)
    }

    pub async fn update(&self, ctx: &AccessContext, id: Uuid, input: UserUpdate) -> ServiceResult<User> {
        ctx.require(Permission::UsersManage)?;
        let mut user = self.load(id).await?;
        if !user_in_scope(ctx, &user) || !ctx.user.role.can_assign(user.role) {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        let is_self = user.id == ctx.user.id;

        if let Some(email) = input.email {
            let email = normalize_email(&email);
            if !is_valid_email(&email) {
                return Err(ServiceError::invalid_field("email", "Некорректный email"));
            }
            if email != user.email {
                if self.store.find_user_by_email(&email).await?.is_some() {
                    return Err(ServiceError::conflict("Пользователь с таким email уже существует"));
                }
                user.email = email;
            }
        }
        if let Some(full_name) = input.full_name {
            user.full_name = non_empty(Some(full_name))
                .ok_or_else(|| ServiceError::invalid_field("full_name", "Обязательное поле"))?;
        }
        if let Some(role) = input.role {
            if is_self && role != user.role {
                return Err(ServiceError::invalid_field("role", "Нельзя изменить собственную роль"));
            }
            if !ctx.user.role.can_assign(role) {
                return Err(ServiceError::forbidden("Недостаточно прав для назначения этой роли"));
            }
            user.role = role;
        }
        if let Some(organization_id) = input.organization_id {
            match organization_id {
                Some(org) => {
                    if !ctx.tree.contains(org) {
                        return Err(ServiceError::invalid_field("organization_id", "Организация не найдена"));
                    }
                    ctx.require_scope(org)?;
                }
                None if !ctx.is_admin() => return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE)),
                None => {}
            }
            user.organization_id = organization_id;
        }
        if let Some(validated) = input.membership_validated {
            user.membership_validated = validated;
        }
        if let Some(password) = input.password {
            check_password_strength(&password)?;
            user.password_hash = auth::hash_password(&password, self.config.security.bcrypt_cost).await?;
        }

        let deactivated = input.is_active == Some(false) && user.is_active;
        if let Some(is_active) = input.is_active {
            if is_self && !is_active {
                return Err(ServiceError::invalid_field("is_active", "Нельзя отключить собственную учетную запись"));
            }
            user.is_active = is_active;
        }

        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        if deactivated {
            let ended = self.store.delete_user_sessions(user.id).await?;
            tracing::info!("User {} deactivated, {} sessions ended", user.id, ended);
        }
        tracing::info!("User {} updated by {}", user.id, ctx.user.id);
        Ok(user)
    }

    pub async fn delete(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<()> {
        ctx.require(Permission::UsersManage)?;
        let user = self.load(id).await?;
        if user.role == Role::SuperAdmin {
            return Err(ServiceError::validation("Нельзя удалить суперадминистратора"));
        }
        if user.id == ctx.user.id {
            return Err(ServiceError::validation("Нельзя удалить собственную учетную запись"));
        }
        if !user_in_scope(ctx, &user) || !ctx.user.role.can_assign(user.role) {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }

        // Participant rows go with the user, which can leave a document
        // whose remaining participants have all signed.
        let pending: Vec<_> = self
            .store
            .list_workflow_documents(id, Some(&[]))
            .await?
            .into_iter()
            .filter(|d| d.status == WorkflowDocumentStatus::InProgress)
            .collect();

        match self.store.delete_user(id).await {
            Ok(true) => {}
            Ok(false) => return Err(ServiceError::not_found("Пользователь не найден")),
            Err(DatabaseError::Conflict(_)) => {
                return Err(ServiceError::conflict(
                    "Пользователь является автором документов, новостей или поручений",
                ))
            }
            Err(err) => return Err(err.into()),
        }
        tracing::info!("User {} deleted by {}", id, ctx.user.id);

        let documents = DocumentService::new(self.store, self.mailer);
        for document in pending {
            documents.complete_if_signed(document).await?;
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Пользователь не найден"))
    }
}
