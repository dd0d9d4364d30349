//! Profile endpoints. The profile view flattens the profile row together with
//! the user's contact fields; updates to either side commit together.

use axum::{Json, Router, extract::State, middleware, response::IntoResponse, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, JsonBody, ResultExt};
use super::validation::{Validator, is_valid_email, normalize_email};
use crate::auth::{CurrentUser, require_auth};
use crate::db::{Database, ProfileChanges, UserChanges, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct ProfileState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(ProfileState);

pub fn router(state: ProfileState) -> Router {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<ProfileState>,
        ))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    id: i64,
    user_id: i64,
    email: String,
    phone: Option<String>,
    full_name: String,
    profession: Option<String>,
    company: Option<String>,
    address: Option<String>,
    website: Option<String>,
    bio: Option<String>,
    avatar: Option<String>,
}

async fn load_profile(db: &Database, user_id: i64) -> Result<ProfileResponse, ApiError> {
    let user = db
        .users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to get user")?;
    let profile = db
        .profiles()
        .get(user_id)
        .await
        .db_err("Failed to get profile")?;

    let (Some(user), Some(profile)) = (user, profile) else {
        return Err(profile_not_found());
    };

    Ok(ProfileResponse {
        id: profile.id,
        user_id: user.id,
        email: user.email,
        phone: user.phone,
        full_name: profile.full_name.unwrap_or(user.name),
        profession: profile.profession,
        company: profile.company,
        address: profile.address,
        website: profile.website,
        bio: profile.bio,
        avatar: profile.avatar,
    })
}

async fn get_profile(
    State(state): State<ProfileState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(load_profile(&state.db, current.user_id).await?))
}

/// Absent fields are left unchanged.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    profession: Option<String>,
    company: Option<String>,
    address: Option<String>,
    website: Option<String>,
    bio: Option<String>,
    avatar: Option<String>,
}

async fn update_profile(
    State(state): State<ProfileState>,
    current: CurrentUser,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.as_deref().map(normalize_email);
    let full_name = payload.full_name.as_deref().map(|n| n.trim().to_string());

    let mut validator = Validator::default();
    validator
        .check(
            email.as_deref().is_none_or(is_valid_email),
            "email",
            "Invalid email address",
        )
        .check(
            full_name.as_deref().is_none_or(|n| !n.is_empty()),
            "fullName",
            "Full name cannot be empty",
        );
    validator.finish()?;

    if let Some(email) = email.as_deref() {
        let owner = state
            .db
            .users()
            .get_by_email(email)
            .await
            .db_err("Failed to check email")?;
        if owner.is_some_and(|u| u.id != current.user_id) {
            return Err(email_taken());
        }
    }

    let profile_changes = ProfileChanges {
        full_name: full_name.clone(),
        profession: payload.profession,
        company: payload.company,
        address: payload.address,
        website: payload.website,
        bio: payload.bio,
        avatar: payload.avatar,
    };
    let user_changes = UserChanges {
        name: full_name,
        email,
        phone: payload.phone,
    };

    let updated = match state
        .db
        .profiles()
        .update(current.user_id, &profile_changes, &user_changes)
        .await
    {
        Ok(updated) => updated,
        Err(e) if is_unique_violation(&e) => return Err(email_taken()),
        Err(e) => return Err(ApiError::db_error("Failed to update profile", e)),
    };
    if !updated {
        return Err(profile_not_found());
    }

    tracing::info!(user_id = current.user_id, "Profile updated");

    Ok(Json(load_profile(&state.db, current.user_id).await?))
}

fn profile_not_found() -> ApiError {
    ApiError::not_found("Profile not found")
}

fn email_taken() -> ApiError {
    ApiError::conflict("This email is already used by another account")
}
