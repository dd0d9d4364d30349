use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::now_unix;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub user_id: i64,
    /// RFC 3339, UTC
    pub date: String,
    pub client: String,
    pub created_at: i64,
}

pub struct AppointmentStore {
    pool: SqlitePool,
}

impl AppointmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        date: &str,
        client: &str,
    ) -> Result<Appointment, sqlx::Error> {
        let created_at = now_unix();
        let result = sqlx::query(
            "INSERT INTO appointments (user_id, date, client, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(date)
        .bind(client)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(Appointment {
            id: result.last_insert_rowid(),
            user_id,
            date: date.to_string(),
            client: client.to_string(),
            created_at,
        })
    }

    /// All appointments of a user, earliest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, date, client, created_at FROM appointments WHERE user_id = ? ORDER BY date ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Get an appointment only if `user_id` owns it.
    pub async fn get_owned(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, date, client, created_at FROM appointments WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete an appointment only if `user_id` owns it.
    pub async fn delete_owned(&self, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, NewUser};

    async fn create_user(db: &Database, email: &str) -> i64 {
        db.users()
            .create_with_profile(&NewUser {
                email,
                name: "Alice",
                phone: None,
                password_hash: "hash",
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_date() {
        let db = Database::open(":memory:").await.unwrap();
        let user = create_user(&db, "a@x.com").await;
        let store = db.appointments();

        store.create(user, "2025-03-01T09:00:00Z", "Late").await.unwrap();
        store.create(user, "2025-01-01T09:00:00Z", "Early").await.unwrap();

        let list = store.list_by_user(user).await.unwrap();
        let clients: Vec<_> = list.iter().map(|a| a.client.as_str()).collect();
        assert_eq!(clients, ["Early", "Late"]);
    }

    #[tokio::test]
    async fn test_ownership_is_enforced() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = create_user(&db, "a@x.com").await;
        let bob = create_user(&db, "b@x.com").await;
        let store = db.appointments();

        let appt = store
            .create(alice, "2025-01-01T09:00:00Z", "Client")
            .await
            .unwrap();

        assert!(store.get_owned(appt.id, bob).await.unwrap().is_none());
        assert!(!store.delete_owned(appt.id, bob).await.unwrap());
        assert!(store.get_owned(appt.id, alice).await.unwrap().is_some());
        assert!(store.delete_owned(appt.id, alice).await.unwrap());
        assert!(store.list_by_user(alice).await.unwrap().is_empty());
    }
}
