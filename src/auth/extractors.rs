//! Session middleware and the extractor handlers use to read its result.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

use super::errors::{AuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use crate::jwt::AccessTokenError;

/// Identity resolved from a verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
}

/// Read the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware for every route that reads or mutates user-scoped data.
/// Verifies the bearer token and stores a [`CurrentUser`] in the request
/// extensions, or rejects with 401 before the handler runs.
pub async fn require_auth<S>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let token = bearer_token(request.headers())
        .ok_or(AuthError::new(AuthErrorKind::NotAuthenticated))?;

    let user_id = state.jwt().verify(token).map_err(|e| match e {
        AccessTokenError::Expired => AuthError::new(AuthErrorKind::TokenExpired),
        AccessTokenError::Invalid => AuthError::new(AuthErrorKind::InvalidToken),
        other => {
            tracing::error!(error = %other, "Access token verification failed");
            AuthError::new(AuthErrorKind::InvalidToken)
        }
    })?;

    request.extensions_mut().insert(CurrentUser { user_id });
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or(AuthError::new(AuthErrorKind::NotAuthenticated))
    }
}
