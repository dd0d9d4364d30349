//! Tests for startup validation (JWT secret, CLI flags) and the embedded server.

mod common;

use std::fs;
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

const LONG_SECRET: &str = "test-secret-that-is-long-enough-32chars";

fn agenda() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_agenda"));
    command
        .args(["--database", ":memory:"])
        .env_remove("JWT_SECRET")
        .env_remove("PORT")
        .env_remove("DATABASE_URL")
        .env_remove("CORS_ORIGINS")
        .stderr(Stdio::piped())
        .stdout(Stdio::piped());
    command
}

fn combined_output(output: &Output) -> String {
    // tracing logs to stdout by default
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

/// Give the server a moment to start, then assert it is still running.
fn assert_keeps_running(mut child: Child) -> String {
    std::thread::sleep(Duration::from_millis(500));

    match child.try_wait() {
        Ok(Some(status)) => {
            let output = child.wait_with_output().unwrap();
            panic!(
                "Server exited unexpectedly with status {:?}, output: {}",
                status,
                combined_output(&output)
            );
        }
        Ok(None) => {
            child.kill().ok();
            let output = child.wait_with_output().unwrap();
            combined_output(&output)
        }
        Err(e) => panic!("Error checking process status: {}", e),
    }
}

#[test]
fn test_missing_secret_falls_back_with_warning() {
    let child = agenda()
        .args(["--port", "0"])
        .spawn()
        .expect("Failed to run binary");

    let output = assert_keeps_running(child);
    assert!(
        output.contains("development secret"),
        "Should warn about the development secret, got: {}",
        output
    );
}

#[test]
fn test_jwt_secret_env() {
    let child = agenda()
        .env("JWT_SECRET", LONG_SECRET)
        .args(["--port", "0"])
        .spawn()
        .expect("Failed to run binary");

    let output = assert_keeps_running(child);
    assert!(!output.contains("development secret"));
}

#[test]
fn test_short_jwt_secret_exits_with_error() {
    let output = agenda()
        .env("JWT_SECRET", "short")
        .args(["--port", "0"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("shorter than"),
        "Should mention minimum length requirement, got: {}",
        combined
    );
}

#[test]
fn test_jwt_secret_file() {
    let secret_file =
        std::env::temp_dir().join(format!("agenda_jwt_secret_{}", std::process::id()));
    fs::write(&secret_file, "this-is-a-long-secret-from-file-for-testing\n").unwrap();

    let child = agenda()
        .args([
            "--jwt-secret-file",
            secret_file.to_str().unwrap(),
            "--port",
            "0",
        ])
        .spawn()
        .expect("Failed to run binary");

    let output = assert_keeps_running(child);
    let _ = fs::remove_file(&secret_file);
    assert!(!output.contains("development secret"));
}

#[test]
fn test_jwt_secret_file_not_found() {
    let output = agenda()
        .args(["--jwt-secret-file", "/nonexistent/path/to/secret"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("Failed to read JWT secret file"),
        "Should mention failed to read file, got: {}",
        combined
    );
}

#[test]
fn test_invalid_cors_origin() {
    let output = agenda()
        .env("JWT_SECRET", LONG_SECRET)
        .args(["--cors-origin", "ftp://example.com"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("http or https"),
        "Should reject the origin, got: {}",
        combined
    );
}

#[test]
fn test_zero_access_token_ttl_rejected() {
    let output = agenda()
        .env("JWT_SECRET", LONG_SECRET)
        .args(["--access-token-ttl", "0"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
}

#[tokio::test]
async fn test_start_server_serves_api() {
    let config = common::test_config().await;
    let (handle, addr) = agenda::start_server(config, 0).await.unwrap();

    let response = reqwest::get(format!("http://{}/api/users/me", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "unauthorized");

    handle.abort();
}
