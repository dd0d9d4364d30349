//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::DEFAULT_REFRESH_TOKEN_TTL_SECS;
use crate::db::Database;
use crate::jwt::DEFAULT_ACCESS_TOKEN_TTL_SECS;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Used only when no secret is configured. Anyone can forge tokens with it.
const DEV_JWT_SECRET: &str = "agenda-insecure-development-secret-do-not-deploy";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "agenda", about = "Appointment scheduling API")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_URL", default_value = "agenda.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Origins allowed to call the API with credentials (comma separated)
    #[arg(
        long = "cors-origin",
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173",
        value_parser = validate_origin
    )]
    pub cors_origins: Vec<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_TOKEN_TTL_SECS,
        value_parser = clap::value_parser!(i64).range(1..))]
    pub refresh_token_ttl: i64,

    /// Revoke and reissue the refresh token on every refresh
    #[arg(long)]
    pub rotate_refresh_tokens: bool,

    /// Omit the Secure cookie attribute (plain-HTTP local development only)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Accept an http(s) origin and return its canonical form (no path, no trailing slash).
fn validate_origin(s: &str) -> Result<String, String> {
    let url = Url::parse(s.trim()).map_err(|e| format!("Invalid origin '{}': {}", s, e))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("Origin must use http or https: {}", s));
    }
    if url.host_str().is_none() {
        return Err(format!("Origin must have a host: {}", s));
    }

    Ok(url.origin().ascii_serialization())
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides
/// the default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Load JWT secret from environment variable or file, falling back to a
/// development secret when neither is configured.
/// Returns None and logs an error if a configured secret cannot be used.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        warn!(
            "No JWT secret configured, using the built-in development secret. \
             This is UNSAFE for production: set JWT_SECRET or --jwt-secret-file"
        );
        return Some(DEV_JWT_SECRET.to_string());
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    if args.insecure_cookies {
        warn!("Refresh cookie will be sent without the Secure attribute");
    }

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_ttl_secs: args.access_token_ttl,
        refresh_token_ttl_secs: args.refresh_token_ttl,
        rotate_refresh_tokens: args.rotate_refresh_tokens,
        secure_cookies: !args.insecure_cookies,
        cors_origins: args.cors_origins.clone(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
