mod appointment;
mod profile;
mod token;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::{SystemTime, UNIX_EPOCH};

pub use appointment::{Appointment, AppointmentStore};
pub use profile::{Profile, ProfileChanges, ProfileStore, UserChanges};
pub use token::{RefreshTokenRecord, RefreshTokenStore};
pub use user::{NewUser, PublicUser, User, UserStore};

/// Current time as Unix seconds.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Whether an error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let mut options = SqlitePoolOptions::new().max_connections(5);
        if path == ":memory:" {
            // An in-memory database is dropped with its last connection.
            options = options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(&url).await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    name TEXT NOT NULL,
                    phone TEXT,
                    password_hash TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )",
                "CREATE TABLE profiles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    full_name TEXT,
                    profession TEXT,
                    company TEXT,
                    address TEXT,
                    website TEXT,
                    bio TEXT,
                    avatar TEXT
                )",
                // Refresh tokens are revoked, never deleted, until retention cleanup.
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    token TEXT UNIQUE NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    expires_at INTEGER NOT NULL,
                    revoked_at INTEGER,
                    created_at INTEGER NOT NULL
                )",
                "CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
                "CREATE INDEX idx_refresh_tokens_expires_at ON refresh_tokens(expires_at)",
                "CREATE TABLE appointments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    client TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )",
                "CREATE INDEX idx_appointments_user_date ON appointments(user_id, date)",
            ],
        )
        .await
    }

    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    pub fn profiles(&self) -> ProfileStore {
        ProfileStore::new(self.pool.clone())
    }

    pub fn refresh_tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    pub fn appointments(&self) -> AppointmentStore {
        AppointmentStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(email: &'a str) -> NewUser<'a> {
        NewUser {
            email,
            name: "Alice",
            phone: None,
            password_hash: "hash",
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.get_version().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_violation_detected() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create_with_profile(&new_user("a@x.com")).await.unwrap();
        let err = db
            .users()
            .create_with_profile(&new_user("A@X.com"))
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_user_delete_cascades() {
        let db = Database::open(":memory:").await.unwrap();

        let user = db.users().create_with_profile(&new_user("a@x.com")).await.unwrap();
        db.refresh_tokens()
            .create("tok", user.id, now_unix() + 60, now_unix())
            .await
            .unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(db.profiles().get(user.id).await.unwrap().is_none());
        assert!(db.refresh_tokens().get("tok").await.unwrap().is_none());
    }
}
