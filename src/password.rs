//! Password hashing with Argon2id.

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};
use rand::RngCore;
use std::sync::LazyLock;

/// Raw salt length in bytes before base64 encoding.
const SALT_LEN: usize = 16;

/// Hash checked when the account does not exist, so an unknown email costs
/// the same Argon2 work as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("agenda-dummy-password").ok());

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
/// An unparsable hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::Hash(e.to_string()))?
}

/// [`verify_password`] on the blocking pool. A panicked task counts as a mismatch.
pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}

/// Burn one verification against [`DUMMY_HASH`]. Always `false`.
pub async fn verify_dummy_blocking(password: String) -> bool {
    tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = verify_password(&password, hash);
        }
        false
    })
    .await
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("secret1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("secret1").unwrap();
        let b = hash_password("secret1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_mismatch() {
        assert!(!verify_password("secret1", "not-a-hash"));
        assert!(!verify_password("secret1", ""));
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password_blocking("pw123456".into()).await.unwrap();
        assert!(verify_password_blocking("pw123456".into(), hash.clone()).await);
        assert!(!verify_password_blocking("nope".into(), hash).await);
    }

    #[tokio::test]
    async fn test_dummy_verification_never_matches() {
        assert!(DUMMY_HASH.as_deref().is_some_and(|h| h.starts_with("$argon2id$")));
        assert!(!verify_dummy_blocking("agenda-dummy-password".into()).await);
        assert!(!verify_dummy_blocking("secret1".into()).await);
    }
}
