use reqwest::StatusCode;
use tokio::task::JoinError;

/// Errors returned by [`ApiClient`](super::ApiClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a JSON error body.
    #[error("{message} ({status}, {code})")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    /// Refresh failed; the session has been logged out.
    #[error("session expired, log in again")]
    SessionExpired,

    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            _ => None,
        }
    }
}

/// Why a shared refresh call failed. Cloned to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("refresh token rejected")]
    Unauthorized,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("refresh task aborted")]
    Aborted,
}

impl From<JoinError> for RefreshFailure {
    fn from(_: JoinError) -> Self {
        RefreshFailure::Aborted
    }
}
