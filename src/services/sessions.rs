use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth;
use crate::config::AppConfig;
use crate::database::models::{user::normalize_email, Session, User};
use crate::database::store::Store;
use crate::permissions::{permissions_for, Permission, Role};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::{is_valid_email, non_empty};

pub const INVALID_CREDENTIALS: &str = "Неверный email или пароль";
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
    pub permissions: BTreeSet<Permission>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub organization_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

pub(crate) fn check_password_strength(password: &str) -> ServiceResult<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ServiceError::invalid_field(
            "password",
            format!("Пароль должен содержать не менее {} символов", PASSWORD_MIN_LEN),
        ));
    }
    Ok(())
}

pub struct SessionService<'a> {
    store: &'a dyn Store,
    config: &'a AppConfig,
}

impl<'a> SessionService<'a> {
    pub fn new(store: &'a dyn Store, config: &'a AppConfig) -> Self {
        Self { store, config }
    }

    /// Verify credentials and open a session. The raw token is returned to
    /// the caller once and only its hash is stored.
    pub async fn login(&self, input: LoginRequest) -> ServiceResult<LoginResult> {
        let email = normalize_email(&input.email);
        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                auth::verify_dummy_password(&input.password, self.config.security.bcrypt_cost).await;
                tracing::info!("Login failed: unknown email");
                return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
            }
        };

        if !auth::verify_password(&input.password, &user.password_hash).await {
            tracing::info!("Login failed for user {}: wrong password", user.id);
            return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
        }
        if !user.is_active {
            tracing::info!("Login refused for inactive user {}", user.id);
            return Err(ServiceError::forbidden("Учетная запись отключена"));
        }

        let token = auth::generate_session_token();
        let now = Utc::now();
        let session = Session {
            token_hash: auth::hash_token(&token),
            user_id: user.id,
            expires_at: now + Duration::days(self.config.session.ttl_days),
            created_at: now,
        };
        self.store.insert_session(&session).await?;
        tracing::info!("User {} logged in", user.id);

        Ok(LoginResult {
            token,
            expires_at: session.expires_at,
            permissions: permissions_for(user.role),
            user,
        })
    }

    /// Resolve a bearer token to an active user. Expired sessions are
    /// removed as they are found.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Option<User>> {
        let token_hash = auth::hash_token(token);
        let Some(session) = self.store.find_session(&token_hash).await? else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            tracing::debug!("Session for user {} expired", session.user_id);
            self.store.delete_session(&token_hash).await?;
            return Ok(None);
        }

        Ok(self.store.get_user(session.user_id).await?.filter(|u| u.is_active))
    }

    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.store.delete_session(&auth::hash_token(token)).await?;
        Ok(())
    }

    /// Self-registration. The new account is an unvalidated PRIMARY_MEMBER
    /// until an application for it is approved.
    pub async fn register(&self, input: RegisterRequest) -> ServiceResult<User> {
        let email = normalize_email(&input.email);
        if !is_valid_email(&email) {
            return Err(ServiceError::invalid_field("email", "Некорректный email"));
        }
        check_password_strength(&input.password)?;
        let full_name = non_empty(Some(input.full_name))
            .ok_or_else(|| ServiceError::invalid_field("full_name", "Обязательное поле"))?;

        match self.store.get_organization(input.organization_id).await? {
            Some(org) if org.is_active => {}
            _ => {
                return Err(ServiceError::invalid_field(
                    "organization_id",
                    "Организация не найдена или неактивна",
                ))
            }
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::conflict("Пользователь с таким email уже существует"));
        }

        let hash = auth::hash_password(&input.password, self.config.security.bcrypt_cost).await?;
        let user = User::new(&email, hash, full_name, Role::PrimaryMember, Some(input.organization_id));
        self.store.insert_user(&user).await?;
        tracing::info!("Registered user {} in organization {}", user.id, input.organization_id);
        Ok(user)
    }

    /// Change the caller's own password and end every session they hold.
    pub async fn change_password(&self, user: &User, input: PasswordChange) -> ServiceResult<()> {
        if !auth::verify_password(&input.current_password, &user.password_hash).await {
            return Err(ServiceError::unauthorized("Неверный текущий пароль"));
        }
        check_password_strength(&input.new_password)?;

        let mut updated = user.clone();
        updated.password_hash = auth::hash_password(&input.new_password, self.config.security.bcrypt_cost).await?;
        updated.updated_at = Utc::now();
        self.store.update_user(&updated).await?;

        let ended = self.store.delete_user_sessions(user.id).await?;
        tracing::info!("User {} changed password, {} sessions ended", user.id, ended);
        Ok(())
    }
}
