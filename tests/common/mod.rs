#![allow(dead_code)]

use agenda::{ServerConfig, create_app, db::Database};
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::Value;
use std::net::SocketAddr;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &[u8] = b"test-jwt-secret-at-least-32-bytes-long";
pub const TEST_PASSWORD: &str = "secret1";

/// Server config for tests: in-memory database, insecure cookies.
pub async fn test_config() -> ServerConfig {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    ServerConfig {
        db,
        jwt_secret: TEST_JWT_SECRET.to_vec(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 7 * 24 * 60 * 60,
        rotate_refresh_tokens: false,
        secure_cookies: false,
        cors_origins: vec!["http://localhost:5173".to_string()],
    }
}

/// Create a test app and return (app, db).
pub async fn create_test_app() -> (Router, Database) {
    let config = test_config().await;
    (create_app(&config), config.db.clone())
}

/// Create a test app after adjusting the default config.
pub async fn create_test_app_with(adjust: impl FnOnce(&mut ServerConfig)) -> (Router, Database) {
    let mut config = test_config().await;
    adjust(&mut config);
    (create_app(&config), config.db.clone())
}

/// Serve `app` on a random local port.
pub async fn spawn_app(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` of the refresh cookie set by this response, if any.
    pub fn refresh_cookie(&self) -> Option<String> {
        set_cookie(&self.headers, "refreshToken")
    }

    pub fn set_cookie_header(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("refreshToken="))
            .map(str::to_string)
    }
}

/// Extract `name=value` from a Set-Cookie header.
pub fn set_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}

/// Builder for a single request against the router.
pub struct TestRequest {
    method: Method,
    uri: String,
    bearer: Option<String>,
    cookie: Option<String>,
    body: Option<Value>,
}

impl TestRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            bearer: None,
            cookie: None,
            body: None,
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn put(uri: &str) -> Self {
        Self::new(Method::PUT, uri)
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn cookie(mut self, cookie: &str) -> Self {
        self.cookie = Some(cookie.to_string());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub async fn send(self, app: &Router) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(token) = self.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookie) = self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match self.body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Register a user with [`TEST_PASSWORD`] and return its id.
pub async fn register(app: &Router, email: &str, name: &str) -> i64 {
    let response = TestRequest::post("/api/auth/register")
        .json(serde_json::json!({
            "email": email,
            "name": name,
            "password": TEST_PASSWORD,
        }))
        .send(app)
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body["user"]["id"].as_i64().unwrap()
}

/// Log in and return (access_token, refresh_cookie).
pub async fn login(app: &Router, email: &str) -> (String, String) {
    let response = TestRequest::post("/api/auth/login")
        .json(serde_json::json!({ "email": email, "password": TEST_PASSWORD }))
        .send(app)
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    let token = response.body["accessToken"].as_str().unwrap().to_string();
    let cookie = response.refresh_cookie().expect("login sets refresh cookie");
    (token, cookie)
}

/// Register and log in, returning (user_id, access_token, refresh_cookie).
pub async fn register_and_login(app: &Router, email: &str) -> (i64, String, String) {
    let id = register(app, email, "Test User").await;
    let (token, cookie) = login(app, email).await;
    (id, token, cookie)
}
