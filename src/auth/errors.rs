//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a protected request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No `Authorization: Bearer` header.
    NotAuthenticated,
    /// Malformed token or bad signature.
    InvalidToken,
    /// Well-formed token past its expiry.
    TokenExpired,
}

/// 401 rejection returned by the session middleware and extractor.
#[derive(Debug)]
pub struct AuthError {
    pub(super) kind: AuthErrorKind,
}

impl AuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    fn code(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::TokenExpired => "token_expired",
            AuthErrorKind::NotAuthenticated | AuthErrorKind::InvalidToken => "unauthorized",
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InvalidToken | AuthErrorKind::TokenExpired => {
                "Invalid or expired token"
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            code: &'static str,
        }

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.message(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}
