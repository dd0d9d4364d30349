//! Shared error handling for API endpoints.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::error;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    /// Log a database failure and hide it behind a generic 500.
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
    /// Same, for failures outside the database (hashing, signing).
    fn internal_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }

    fn internal_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal_error(msg, e))
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    /// Request body failed field validation.
    Validation(Vec<FieldError>),
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal() -> Self {
        Self::Internal("Internal server error".into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, source = "database", "{}", context);
        Self::internal()
    }

    pub fn internal_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, "{}", context);
        Self::internal()
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = match self {
            ApiError::Validation(details) => ("Invalid request".to_string(), details),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => (msg, Vec::new()),
        };
        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
                details,
            }),
        )
            .into_response()
    }
}

/// JSON body extractor whose rejection uses the API error shape.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::bad_request("Expected a JSON request body")
        }
        other => ApiError::bad_request(other.body_text()),
    }
}

/// Parse a numeric path id, rejecting anything else with 400.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("Invalid {} ID", what)))
}
