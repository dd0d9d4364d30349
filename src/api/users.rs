use axum::{Json, Router, middleware, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{CurrentUser, require_auth};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<UsersState>,
        ))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    message: &'static str,
    user_id: i64,
}

async fn me(current: CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        message: "Authenticated",
        user_id: current.user_id,
    })
}
