use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::now_unix;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub created_at: i64,
}

/// User fields safe to return to clients. Never carries the password hash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            phone: user.phone,
        }
    }
}

/// Input for [`UserStore::create_with_profile`].
#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub phone: Option<&'a str>,
    pub password_hash: &'a str,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user and its empty profile in one transaction.
    /// Either both rows exist afterwards or neither does.
    pub async fn create_with_profile(&self, new_user: &NewUser<'_>) -> Result<User, sqlx::Error> {
        let created_at = now_unix();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO users (email, name, phone, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_user.email)
        .bind(new_user.name)
        .bind(new_user.phone)
        .bind(new_user.password_hash)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        sqlx::query("INSERT INTO profiles (user_id, full_name) VALUES (?, ?)")
            .bind(id)
            .bind(new_user.name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(User {
            id,
            email: new_user.email.to_string(),
            name: new_user.name.to_string(),
            phone: new_user.phone.map(str::to_string),
            password_hash: new_user.password_hash.to_string(),
            created_at,
        })
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, email, name, phone, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, email, name, phone, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Check whether an email is free.
    pub async fn is_email_available(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let user = db
            .users()
            .create_with_profile(&NewUser {
                email: "a@x.com",
                name: "Alice",
                phone: Some("0600000000"),
                password_hash: "hash",
            })
            .await
            .unwrap();

        let by_email = db.users().get_by_email("A@x.COM").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.phone.as_deref(), Some("0600000000"));

        let by_id = db.users().get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");

        let profile = db.profiles().get(user.id).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_email_availability() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(db.users().is_email_available("a@x.com").await.unwrap());

        db.users()
            .create_with_profile(&NewUser {
                email: "a@x.com",
                name: "Alice",
                phone: None,
                password_hash: "hash",
            })
            .await
            .unwrap();

        assert!(!db.users().is_email_available("a@x.com").await.unwrap());
    }

    #[test]
    fn test_public_user_hides_hash() {
        let user = User {
            id: 1,
            email: "a@x.com".into(),
            name: "Alice".into(),
            phone: None,
            password_hash: "secret-hash".into(),
            created_at: 0,
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("phone"));
    }
}
