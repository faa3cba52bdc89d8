use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::auth;
use crate::database::models::User;
use crate::error::ApiError;
use crate::services::AccessContext;

pub const UNAUTHORIZED_MESSAGE: &str = "Требуется авторизация";

/// Authenticated user resolved from the session token
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Raw token of the current session, needed to end it
#[derive(Clone, Debug)]
pub struct SessionToken(pub String);

/// Caller plus organization scope, loaded once for the request
pub struct Access(pub AccessContext);

/// Resolve the session cookie or bearer token and attach the user.
///
/// Requests without a valid session pass through untouched; handlers that
/// need a user reject them through the [`CurrentUser`] extractor.
pub async fn session_auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = auth::token_from_headers(request.headers(), &state.config.session.cookie_name) {
        match state.sessions().authenticate(&token).await {
            Ok(Some(user)) => {
                tracing::debug!("Session resolved to user {} ({})", user.id, user.role);
                request.extensions_mut().insert(CurrentUser(user));
                request.extensions_mut().insert(SessionToken(token));
            }
            Ok(None) => tracing::debug!("Session token did not resolve to an active user"),
            Err(e) => return ApiError::from(e).into_response(),
        }
    }

    next.run(request).await
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(UNAUTHORIZED_MESSAGE))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionToken>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(UNAUTHORIZED_MESSAGE))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Access {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        let ctx = AccessContext::load(state.store.as_ref(), user).await?;
        Ok(Access(ctx))
    }
}
