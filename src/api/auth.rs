//! Registration, login and session endpoints.
//!
//! - POST `/register` - Create a user and its empty profile
//! - POST `/login` - Check credentials, issue access token + refresh cookie
//! - POST `/refresh-token` - Exchange the refresh cookie for a new access token
//! - POST `/logout` - Revoke the refresh cookie's token and clear it
//! - POST `/logout-all` - Revoke every refresh token of the current user
//! - GET `/sessions` - List the current user's live refresh tokens

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::error::{ApiError, JsonBody, ResultExt};
use super::validation::{Validator, is_valid_email, is_valid_password, normalize_email};
use crate::auth::{
    CurrentUser, REFRESH_COOKIE_NAME, RefreshTokenError, RefreshTokenManager,
    clear_refresh_cookie, get_cookie, refresh_cookie, require_auth,
};
use crate::db::{Database, NewUser, PublicUser, is_unique_violation, now_unix};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::password::{
    hash_password_blocking, verify_dummy_blocking, verify_password_blocking,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_SESSION: &str = "Invalid or expired session";

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub refresh: RefreshTokenManager,
    pub secure_cookies: bool,
    pub rotate_refresh_tokens: bool,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let protected = Router::new()
        .route("/logout-all", post(logout_all))
        .route("/sessions", get(list_sessions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<AuthState>,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(state)
        .merge(protected)
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    phone: Option<String>,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    user: PublicUser,
}

async fn register(
    State(state): State<AuthState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);
    let name = payload.name.trim();
    let phone = payload
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let mut validator = Validator::default();
    validator
        .check(is_valid_email(&email), "email", "Invalid email address")
        .check(!name.is_empty(), "name", "Name is required")
        .check(
            is_valid_password(&payload.password),
            "password",
            "Password must be at least 6 characters",
        );
    validator.finish()?;

    let available = state
        .db
        .users()
        .is_email_available(&email)
        .await
        .db_err("Failed to check email availability")?;
    if !available {
        return Err(email_taken());
    }

    let password_hash = hash_password_blocking(payload.password)
        .await
        .internal_err("Failed to hash password")?;

    let user = match state
        .db
        .users()
        .create_with_profile(&NewUser {
            email: &email,
            name,
            phone,
            password_hash: &password_hash,
        })
        .await
    {
        Ok(user) => user,
        // Lost a race with a concurrent registration of the same email
        Err(e) if is_unique_violation(&e) => return Err(email_taken()),
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    info!(user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: PublicUser::from(user),
        }),
    ))
}

fn email_taken() -> ApiError {
    ApiError::conflict("A user with this email already exists")
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    user: PublicUser,
}

async fn login(
    State(state): State<AuthState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);

    let mut validator = Validator::default();
    validator
        .check(is_valid_email(&email), "email", "Invalid email address")
        .check(!payload.password.is_empty(), "password", "Password is required");
    validator.finish()?;

    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to look up user")?;

    let Some(user) = user else {
        verify_dummy_blocking(payload.password).await;
        info!("Login failed: unknown account");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await {
        info!(user_id = user.id, "Login failed: wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let access = state
        .jwt
        .issue(user.id)
        .internal_err("Failed to issue access token")?;
    let refresh = state
        .refresh
        .issue(user.id)
        .await
        .db_err("Failed to issue refresh token")?;

    info!(user_id = user.id, "User logged in");

    let cookie = refresh_cookie(&refresh.token, refresh.max_age(), state.secure_cookies);
    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            access_token: access.token,
            user: PublicUser::from(user),
        }),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Exchange the refresh cookie for a new access token. Every kind of
/// refresh failure yields the same 401 and clears the cookie.
async fn refresh_token(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    match exchange_refresh_token(&state, &headers).await {
        Ok(response) => response,
        Err(e @ ApiError::Unauthorized(_)) => (
            [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
            e,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn exchange_refresh_token(
    state: &AuthState,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let token = get_cookie(headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized(INVALID_SESSION))?;

    let (user_id, rotated) = if state.rotate_refresh_tokens {
        let (user_id, issued) = state.refresh.rotate(token).await.map_err(refresh_error)?;
        (user_id, Some(issued))
    } else {
        let user_id = state.refresh.validate(token).await.map_err(refresh_error)?;
        (user_id, None)
    };

    let access = state
        .jwt
        .issue(user_id)
        .internal_err("Failed to issue access token")?;

    let body = Json(RefreshResponse {
        access_token: access.token,
    });

    Ok(match rotated {
        Some(issued) => {
            let cookie = refresh_cookie(&issued.token, issued.max_age(), state.secure_cookies);
            ([(SET_COOKIE, cookie)], body).into_response()
        }
        None => body.into_response(),
    })
}

fn refresh_error(e: RefreshTokenError) -> ApiError {
    match e {
        RefreshTokenError::Database(e) => ApiError::db_error("Failed to check refresh token", e),
        other => {
            info!(reason = %other, "Refresh rejected");
            ApiError::unauthorized(INVALID_SESSION)
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Logout never fails from the client's point of view: a missing, unknown
/// or already revoked cookie still yields 200 and a cleared cookie.
async fn logout(State(state): State<AuthState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        if let Err(e) = state.refresh.revoke(token).await {
            error!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    (
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(MessageResponse {
            message: "Logged out",
        }),
    )
}

#[derive(Serialize)]
struct LogoutAllResponse {
    revoked: u64,
}

async fn logout_all(
    State(state): State<AuthState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state
        .refresh
        .revoke_all_for_user(current.user_id)
        .await
        .db_err("Failed to revoke refresh tokens")?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(LogoutAllResponse { revoked }),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionInfo {
    id: i64,
    created_at: i64,
    expires_at: i64,
}

#[derive(Serialize)]
struct ListSessionsResponse {
    sessions: Vec<SessionInfo>,
}

async fn list_sessions(
    State(state): State<AuthState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = state
        .db
        .refresh_tokens()
        .list_active_by_user(current.user_id, now_unix())
        .await
        .db_err("Failed to list sessions")?;

    let sessions = tokens
        .into_iter()
        .map(|t| SessionInfo {
            id: t.id,
            created_at: t.created_at,
            expires_at: t.expires_at,
        })
        .collect();

    Ok(Json(ListSessionsResponse { sessions }))
}
