pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod client;
pub mod db;
pub mod jwt;
pub mod password;

use api::{ApiError, SessionSettings, create_api_router};
use auth::RefreshTokenManager;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    response::{IntoResponse, Response},
};
use db::Database;
use jwt::JwtConfig;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing access tokens
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl_secs: i64,
    /// Revoke and reissue the refresh token on every refresh
    pub rotate_refresh_tokens: bool,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Origins allowed to make credentialed cross-origin requests
    pub cors_origins: Vec<String>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(
        &config.jwt_secret,
        config.access_token_ttl_secs,
    ));
    let refresh = RefreshTokenManager::new(config.db.clone(), config.refresh_token_ttl_secs);

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        refresh,
        SessionSettings {
            secure_cookies: config.secure_cookies,
            rotate_refresh_tokens: config.rotate_refresh_tokens,
        },
    );

    Router::new()
        .nest("/api", api_router)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::internal().into_response()
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
