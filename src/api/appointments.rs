//! Appointment endpoints. Every route is scoped to the current user;
//! appointments owned by someone else are reported as not found.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, JsonBody, ResultExt, parse_id};
use super::validation::{Validator, normalize_date};
use crate::auth::{CurrentUser, require_auth};
use crate::db::{Appointment, Database};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct AppointmentsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(AppointmentsState);

pub fn router(state: AppointmentsState) -> Router {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/{id}", get(get_appointment).delete(delete_appointment))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<AppointmentsState>,
        ))
        .with_state(state)
}

async fn list_appointments(
    State(state): State<AppointmentsState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let appointments = state
        .db
        .appointments()
        .list_by_user(current.user_id)
        .await
        .db_err("Failed to list appointments")?;

    Ok(Json(appointments))
}

#[derive(Deserialize)]
struct CreateAppointmentRequest {
    #[serde(default)]
    date: String,
    #[serde(default)]
    client: String,
}

async fn create_appointment(
    State(state): State<AppointmentsState>,
    current: CurrentUser,
    JsonBody(payload): JsonBody<CreateAppointmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let date = normalize_date(&payload.date);
    let client = payload.client.trim();

    let mut validator = Validator::default();
    validator
        .check(date.is_some(), "date", "Date must be an RFC 3339 timestamp")
        .check(!client.is_empty(), "client", "Client is required");
    validator.finish()?;
    let date = date.unwrap_or_default();

    let appointment = state
        .db
        .appointments()
        .create(current.user_id, &date, client)
        .await
        .db_err("Failed to create appointment")?;

    tracing::info!(
        user_id = current.user_id,
        appointment_id = appointment.id,
        "Appointment created"
    );

    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn get_appointment(
    State(state): State<AppointmentsState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "appointment")?;

    let appointment = state
        .db
        .appointments()
        .get_owned(id, current.user_id)
        .await
        .db_err("Failed to get appointment")?
        .ok_or_else(appointment_not_found)?;

    Ok(Json(appointment))
}

#[derive(Serialize)]
struct DeleteAppointmentResponse {
    message: String,
    deleted: Appointment,
}

async fn delete_appointment(
    State(state): State<AppointmentsState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "appointment")?;
    let store = state.db.appointments();

    let appointment = store
        .get_owned(id, current.user_id)
        .await
        .db_err("Failed to get appointment")?
        .ok_or_else(appointment_not_found)?;

    let deleted = store
        .delete_owned(id, current.user_id)
        .await
        .db_err("Failed to delete appointment")?;
    if !deleted {
        return Err(appointment_not_found());
    }

    Ok(Json(DeleteAppointmentResponse {
        message: format!("Appointment {} deleted", id),
        deleted: appointment,
    }))
}

fn appointment_not_found() -> ApiError {
    ApiError::not_found("Appointment not found")
}
