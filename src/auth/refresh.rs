//! Refresh token lifecycle: issue, validate, revoke.
//!
//! Refresh tokens are opaque UUID v4 strings persisted in `refresh_tokens`.
//! Validation does not rotate the token unless rotation is enabled, in which
//! case [`RefreshTokenManager::rotate`] revokes the presented token and issues
//! a fresh one.

use crate::db::{Database, RefreshTokenRecord, now_unix};

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// A freshly issued refresh token.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: i64,
}

impl IssuedRefreshToken {
    /// Seconds until expiry, for the cookie `Max-Age`.
    pub fn max_age(&self) -> i64 {
        (self.expires_at - now_unix()).max(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenError {
    #[error("refresh token not found")]
    NotFound,
    #[error("refresh token revoked")]
    Revoked,
    #[error("refresh token expired")]
    Expired,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct RefreshTokenManager {
    db: Database,
    ttl_secs: i64,
}

impl RefreshTokenManager {
    pub fn new(db: Database, ttl_secs: i64) -> Self {
        Self { db, ttl_secs }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue and persist a new refresh token for `user_id`.
    pub async fn issue(&self, user_id: i64) -> Result<IssuedRefreshToken, sqlx::Error> {
        let token = uuid::Uuid::new_v4().to_string();
        let now = now_unix();
        let expires_at = now.saturating_add(self.ttl_secs);

        self.db
            .refresh_tokens()
            .create(&token, user_id, expires_at, now)
            .await?;

        Ok(IssuedRefreshToken { token, expires_at })
    }

    /// Return the owning user id if the token is usable.
    pub async fn validate(&self, token: &str) -> Result<i64, RefreshTokenError> {
        let record = self
            .db
            .refresh_tokens()
            .get(token)
            .await?
            .ok_or(RefreshTokenError::NotFound)?;

        check_usable(&record, now_unix())?;
        Ok(record.user_id)
    }

    /// Revoke a token. Missing or already revoked tokens are a no-op.
    pub async fn revoke(&self, token: &str) -> Result<(), sqlx::Error> {
        let revoked = self.db.refresh_tokens().revoke(token, now_unix()).await?;
        if revoked {
            tracing::info!("Refresh token revoked");
        }
        Ok(())
    }

    /// Revoke every live token of a user. Returns how many were revoked.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let count = self
            .db
            .refresh_tokens()
            .revoke_all_for_user(user_id, now_unix())
            .await?;
        tracing::info!(user_id, count, "Revoked all refresh tokens for user");
        Ok(count)
    }

    /// Validate `token`, revoke it and issue a replacement for the same user.
    pub async fn rotate(
        &self,
        token: &str,
    ) -> Result<(i64, IssuedRefreshToken), RefreshTokenError> {
        let user_id = self.validate(token).await?;

        // Only the caller that flips revoked_at wins; a concurrent rotation of
        // the same token sees Revoked.
        let won = self.db.refresh_tokens().revoke(token, now_unix()).await?;
        if !won {
            return Err(RefreshTokenError::Revoked);
        }

        let issued = self.issue(user_id).await?;
        Ok((user_id, issued))
    }
}

fn check_usable(record: &RefreshTokenRecord, now: i64) -> Result<(), RefreshTokenError> {
    if record.revoked_at.is_some() {
        return Err(RefreshTokenError::Revoked);
    }
    if now >= record.expires_at {
        return Err(RefreshTokenError::Expired);
    }
    Ok(())
}
