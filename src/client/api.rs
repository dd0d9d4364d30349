//! HTTP client for the API with session handling.
//!
//! Every protected request goes through the same stages:
//! 1. wait while the session is bootstrapping,
//! 2. attach the current access token as a bearer header,
//! 3. send,
//! 4. on a first 401, refresh through the shared single-flight call and
//!    retry once with the new token, or force a logout if refresh fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, cookie::Jar};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use super::error::{ClientError, RefreshFailure};
use super::session::{SessionContext, SessionStatus};
use super::single_flight::{SharedCall, SingleFlight};
use super::types::{
    Appointment, DeleteAppointmentResponse, ErrorBody, LoginResponse, LogoutAllResponse, Me,
    Profile, ProfileUpdate, RefreshResponse, RegisterResponse, Registration, User,
};

/// How long bootstrap waits for the refresh call before giving up.
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_millis(3000);

const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";
const BOOTSTRAP_TIMEOUT_NOTICE: &str = "Could not restore your session. Please log in again.";

struct ClientInner {
    http: Client,
    base_url: String,
    session: SessionContext,
    refresh: SingleFlight<String, RefreshFailure>,
}

/// API client bound to one [`SessionContext`]. Cloning shares the session,
/// the cookie store and the in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client with its own cookie store.
    pub fn new(base_url: &str, session: SessionContext) -> Result<Self, ClientError> {
        Self::with_cookie_jar(base_url, session, Arc::new(Jar::default()))
    }

    /// Create a client on an existing cookie store, e.g. to restore a
    /// session whose refresh cookie another client received.
    pub fn with_cookie_jar(
        base_url: &str,
        session: SessionContext,
        jar: Arc<Jar>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .cookie_provider(jar)
            .timeout(Duration::from_secs(30))
            .build()?;
        Self::with_http_client(base_url, session, http)
    }

    /// Create a client with a custom reqwest::Client. The client needs a
    /// cookie store for the refresh cookie to round-trip.
    pub fn with_http_client(
        base_url: &str,
        session: SessionContext,
        http: Client,
    ) -> Result<Self, ClientError> {
        Url::parse(base_url)?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                session,
                refresh: SingleFlight::new(),
            }),
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    // -------------------------------------------------------------------------
    // Session lifecycle
    // -------------------------------------------------------------------------

    /// Restore the session on startup.
    ///
    /// With a token already held, loading ends immediately. Otherwise one
    /// refresh call is made. If it fails, or does not finish within
    /// `timeout`, the session is logged out with a notice; a refresh that
    /// resolves after that is ignored.
    pub async fn bootstrap(&self, timeout: Duration) -> SessionStatus {
        let session = &self.inner.session;
        if session.access_token().is_some() {
            session.finish_loading();
            return session.status();
        }

        let generation = session.begin_bootstrap();
        match tokio::time::timeout(timeout, self.shared_refresh(generation)).await {
            Ok(Ok(token)) => {
                session.apply_refreshed(generation, &token);
            }
            Ok(Err(failure)) => {
                info!(reason = %failure, "Session restore failed");
                session.force_logout_if_current(generation, Some(SESSION_EXPIRED_NOTICE.into()));
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Session restore timed out");
                session
                    .force_logout_if_current(generation, Some(BOOTSTRAP_TIMEOUT_NOTICE.into()));
            }
        }
        session.status()
    }

    /// Refresh the access token now. Joins a refresh already in flight for
    /// the current login.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        self.refresh_or_logout().await
    }

    async fn refresh_or_logout(&self) -> Result<String, ClientError> {
        let session = &self.inner.session;
        let generation = session.generation();

        match self.shared_refresh(generation).await {
            Ok(token) => {
                if session.apply_refreshed(generation, &token) {
                    return Ok(token);
                }
                // Logged in or out while refreshing; this token is stale.
                match session.status() {
                    SessionStatus::Authenticated => {
                        session.access_token().ok_or(ClientError::SessionExpired)
                    }
                    _ => Err(ClientError::SessionExpired),
                }
            }
            Err(failure) => {
                info!(reason = %failure, "Refresh failed, logging out");
                session.force_logout_if_current(generation, Some(SESSION_EXPIRED_NOTICE.into()));
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// The single in-flight refresh call for `generation`. A call started
    /// under an older generation is never joined. Only the refreshing flag is
    /// written here; callers apply the token after checking it is current.
    fn shared_refresh(&self, generation: u64) -> SharedCall<String, RefreshFailure> {
        let http = self.inner.http.clone();
        let url = self.url("/api/auth/refresh-token");
        let session = self.inner.session.clone();

        self.inner.refresh.run(generation, move || async move {
            session.set_refreshing_if_current(generation, true);
            let result = request_refresh(&http, &url).await;
            session.set_refreshing_if_current(generation, false);
            result
        })
    }

    // -------------------------------------------------------------------------
    // Request pipeline
    // -------------------------------------------------------------------------

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner.http.request(method, self.url(path))
    }

    async fn send_protected<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        self.inner.session.wait_until_ready().await;

        let token = self.inner.session.access_token();
        let response = self
            .build_protected(method.clone(), path, body, token.as_deref())
            .send()
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // Someone else may have refreshed while this request was out.
        let current = self.inner.session.access_token();
        let token = match current {
            Some(current) if Some(&current) != token.as_ref() => current,
            _ => {
                debug!(path, "Access token rejected, refreshing");
                self.refresh_or_logout().await?
            }
        };

        Ok(self
            .build_protected(method, path, body, Some(&token))
            .send()
            .await?)
    }

    fn build_protected<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> RequestBuilder {
        let mut request = self.request(method, path);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
    }

    async fn get_protected<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.send_protected::<()>(Method::GET, path, None).await?;
        parse_json(response).await
    }

    // -------------------------------------------------------------------------
    // Public endpoints
    // -------------------------------------------------------------------------

    pub async fn register(&self, registration: &Registration<'_>) -> Result<User, ClientError> {
        let response = self
            .request(Method::POST, "/api/auth/register")
            .json(registration)
            .send()
            .await?;
        let body: RegisterResponse = parse_json(response).await?;
        Ok(body.user)
    }

    /// Log in and store the access token. The refresh cookie lands in the
    /// client's cookie store.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let response = self
            .request(Method::POST, "/api/auth/login")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: LoginResponse = parse_json(response).await?;
        self.inner.session.set_authenticated(body.access_token);
        Ok(body.user)
    }

    /// Log out on the server and locally. The local logout happens even if
    /// the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.request(Method::POST, "/api/auth/logout").send().await;
        self.inner.session.force_logout(None);
        check_status(result?).await
    }

    // -------------------------------------------------------------------------
    // Protected endpoints
    // -------------------------------------------------------------------------

    /// Revoke every refresh token of the user and log out locally.
    pub async fn logout_all(&self) -> Result<u64, ClientError> {
        let response = self
            .send_protected::<()>(Method::POST, "/api/auth/logout-all", None)
            .await?;
        let body: LogoutAllResponse = parse_json(response).await?;
        self.inner.session.force_logout(None);
        Ok(body.revoked)
    }

    pub async fn me(&self) -> Result<Me, ClientError> {
        self.get_protected("/api/users/me").await
    }

    pub async fn list_appointments(&self) -> Result<Vec<Appointment>, ClientError> {
        self.get_protected("/api/appointments").await
    }

    pub async fn create_appointment(
        &self,
        date: DateTime<Utc>,
        client: &str,
    ) -> Result<Appointment, ClientError> {
        let body = serde_json::json!({
            "date": date.to_rfc3339_opts(SecondsFormat::Millis, true),
            "client": client,
        });
        let response = self
            .send_protected(Method::POST, "/api/appointments", Some(&body))
            .await?;
        parse_json(response).await
    }

    pub async fn get_appointment(&self, id: i64) -> Result<Appointment, ClientError> {
        self.get_protected(&format!("/api/appointments/{}", id)).await
    }

    /// Delete an appointment and return it.
    pub async fn delete_appointment(&self, id: i64) -> Result<Appointment, ClientError> {
        let response = self
            .send_protected::<()>(Method::DELETE, &format!("/api/appointments/{}", id), None)
            .await?;
        let body: DeleteAppointmentResponse = parse_json(response).await?;
        Ok(body.deleted)
    }

    pub async fn get_profile(&self) -> Result<Profile, ClientError> {
        self.get_protected("/api/profile").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ClientError> {
        let response = self
            .send_protected(Method::PUT, "/api/profile", Some(update))
            .await?;
        parse_json(response).await
    }
}

async fn request_refresh(http: &Client, url: &str) -> Result<String, RefreshFailure> {
    let response = http
        .post(url)
        .send()
        .await
        .map_err(|e| RefreshFailure::Network(e.to_string()))?;

    match response.status() {
        StatusCode::OK => {
            let body: RefreshResponse = response
                .json()
                .await
                .map_err(|e| RefreshFailure::Network(e.to_string()))?;
            Ok(body.access_token)
        }
        StatusCode::UNAUTHORIZED => Err(RefreshFailure::Unauthorized),
        other => Err(RefreshFailure::Status(other.as_u16())),
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    if response.status().is_success() {
        Ok(response.json().await?)
    } else {
        Err(api_error(response).await)
    }
}

async fn check_status(response: Response) -> Result<(), ClientError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(api_error(response).await)
    }
}

async fn api_error(response: Response) -> ClientError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => ClientError::Api {
            status,
            code: body.code,
            message: body.error,
        },
        Err(_) => ClientError::Api {
            status,
            code: String::new(),
            message: text,
        },
    }
}
