//! Scheduled cleanup of expired refresh tokens.

use crate::db::{Database, now_unix};
use std::time::Duration;
use tracing::{error, info};

/// Expired refresh tokens (revoked or not) are kept this long for audit.
const EXPIRED_TOKEN_RETENTION_SECS: i64 = 30 * 24 * 60 * 60;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    let cutoff = now_unix() - EXPIRED_TOKEN_RETENTION_SECS;
    match db.refresh_tokens().delete_expired_before(cutoff).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired refresh tokens: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately and startup already ran a pass.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
