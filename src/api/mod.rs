mod appointments;
mod auth;
mod error;
mod profile;
mod users;
mod validation;

use axum::Router;
use std::sync::Arc;

use crate::auth::RefreshTokenManager;
use crate::db::Database;
use crate::jwt::JwtConfig;

pub use error::{ApiError, FieldError, JsonBody, ResultExt};

/// Session policy shared by the auth endpoints.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Whether to set the Secure flag on the refresh cookie.
    pub secure_cookies: bool,
    /// Revoke and reissue the refresh token on every successful refresh.
    pub rotate_refresh_tokens: bool,
}

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    refresh: RefreshTokenManager,
    settings: SessionSettings,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        refresh,
        secure_cookies: settings.secure_cookies,
        rotate_refresh_tokens: settings.rotate_refresh_tokens,
    };

    let users_state = users::UsersState { jwt: jwt.clone() };

    let appointments_state = appointments::AppointmentsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let profile_state = profile::ProfileState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
        .nest("/appointments", appointments::router(appointments_state))
        .nest("/profile", profile::router(profile_state))
}
