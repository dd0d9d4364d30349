//! Refresh token persistence.
//!
//! Rows are revoked by stamping `revoked_at`, never deleted on logout. Only the
//! retention cleanup removes rows, long after they expired.

use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub expires_at: i64,
    pub revoked_at: Option<i64>,
    pub created_at: i64,
}

pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        token: &str,
        user_id: i64,
        expires_at: i64,
        created_at: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, token: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, token, user_id, expires_at, revoked_at, created_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Stamp `revoked_at` if the token exists and is not already revoked.
    /// Returns whether a row changed.
    pub async fn revoke(&self, token: &str, now: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(now)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every unrevoked token of a user (logout everywhere).
    pub async fn revoke_all_for_user(&self, user_id: i64, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// List usable tokens of a user, newest first.
    pub async fn list_active_by_user(
        &self,
        user_id: i64,
        now: i64,
    ) -> Result<Vec<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, token, user_id, expires_at, revoked_at, created_at FROM refresh_tokens WHERE user_id = ? AND revoked_at IS NULL AND expires_at > ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    /// Delete rows that expired before `cutoff`.
    pub async fn delete_expired_before(&self, cutoff: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
