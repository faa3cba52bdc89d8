//! Credential and session-token primitives.
//!
//! Passwords are bcrypt hashes. Session tokens are random strings handed to
//! the client once; the server keeps only their SHA-256 digest.

use axum::http::{header, HeaderMap};
use cookie::{Cookie, SameSite};
use once_cell::sync::OnceCell;
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::SessionConfig;

const TOKEN_LENGTH: usize = 48;
const TEMPORARY_PASSWORD_LENGTH: usize = 12;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hash a password on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
        Ok(Ok(valid)) => valid,
        Ok(Err(e)) => {
            tracing::warn!("Stored password hash could not be verified: {}", e);
            false
        }
        Err(e) => {
            tracing::error!("Password verification task failed: {}", e);
            false
        }
    }
}

static DUMMY_HASH: OnceCell<String> = OnceCell::new();

/// Spend the same bcrypt work as a real check when there is no account to
/// check against, so unknown emails answer as slowly as wrong passwords.
pub async fn verify_dummy_password(password: &str, cost: u32) {
    let hash = match DUMMY_HASH.get() {
        Some(hash) => hash.clone(),
        None => match hash_password(&random_string(TEMPORARY_PASSWORD_LENGTH), cost).await {
            Ok(hash) => DUMMY_HASH.get_or_init(|| hash).clone(),
            Err(e) => {
                tracing::error!("Dummy password hash failed: {}", e);
                return;
            }
        },
    };
    verify_password(password, &hash).await;
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_session_token() -> String {
    random_string(TOKEN_LENGTH)
}

pub fn generate_temporary_password() -> String {
    random_string(TEMPORARY_PASSWORD_LENGTH)
}

/// Hex SHA-256 of a session token, as stored in `sessions.token_hash`
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Pull the session token from the cookie, falling back to a bearer header.
pub fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == cookie_name && !c.value().is_empty())
        .map(|c| c.value().to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

pub fn session_cookie(config: &SessionConfig, token: &str) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookie)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::days(config.ttl_days))
        .build()
}

pub fn expired_session_cookie(config: &SessionConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), String::new()))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookie)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}
