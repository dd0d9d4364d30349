//! Access token issuance and verification.
//!
//! Access tokens are short-lived, stateless HS256 JWTs carrying only the user
//! id. The server never looks them up; signature and expiry are the whole
//! check. Refresh tokens are opaque and live in the database (see
//! `auth::refresh`).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;

/// Token type marker, so a JWT minted for another purpose is never accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id, as a decimal string)
    pub sub: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of issuing an access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Errors returned by [`JwtConfig`].
#[derive(Debug, thiserror::Error)]
pub enum AccessTokenError {
    /// Bad signature, wrong algorithm, garbage input or wrong token type.
    #[error("malformed or badly signed token")]
    Invalid,
    /// Signature is fine but `now >= exp`.
    #[error("token expired")]
    Expired,
    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("system time error")]
    TimeError,
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
}

pub(crate) fn unix_now() -> Result<u64, AccessTokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| AccessTokenError::TimeError)
}

impl JwtConfig {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue an access token for `user_id` using the configured lifetime.
    pub fn issue(&self, user_id: i64) -> Result<AccessToken, AccessTokenError> {
        self.issue_with_ttl(user_id, self.ttl_secs)
    }

    /// Issue an access token with an explicit lifetime.
    pub fn issue_with_ttl(
        &self,
        user_id: i64,
        ttl_secs: u64,
    ) -> Result<AccessToken, AccessTokenError> {
        let now = unix_now()?;
        let exp = now.saturating_add(ttl_secs);

        let claims = AccessClaims {
            sub: user_id.to_string(),
            token_type: TokenType::Access,
            iat: now,
            exp,
        };

        let token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
                .map_err(AccessTokenError::Encoding)?;

        Ok(AccessToken {
            token,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Verify a token and return the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<i64, AccessTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below so it can be reported separately.
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AccessTokenError::Invalid)?;
        let claims = data.claims;

        if claims.token_type != TokenType::Access {
            return Err(AccessTokenError::Invalid);
        }

        if unix_now()? >= claims.exp {
            return Err(AccessTokenError::Expired);
        }

        claims.sub.parse().map_err(|_| AccessTokenError::Invalid)
    }
}
