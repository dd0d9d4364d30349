use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub full_name: Option<String>,
    pub profession: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Profile columns to overwrite. `None` leaves a column untouched.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub profession: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// User columns editable through the profile. `None` leaves a column untouched.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl UserChanges {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, full_name, profession, company, address, website, bio, avatar FROM profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Apply profile and user changes in one transaction.
    /// Returns `false` (and changes nothing) if the user has no profile.
    pub async fn update(
        &self,
        user_id: i64,
        profile: &ProfileChanges,
        user: &UserChanges,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE profiles SET
                full_name = COALESCE(?, full_name),
                profession = COALESCE(?, profession),
                company = COALESCE(?, company),
                address = COALESCE(?, address),
                website = COALESCE(?, website),
                bio = COALESCE(?, bio),
                avatar = COALESCE(?, avatar)
            WHERE user_id = ?",
        )
        .bind(profile.full_name.as_deref())
        .bind(profile.profession.as_deref())
        .bind(profile.company.as_deref())
        .bind(profile.address.as_deref())
        .bind(profile.website.as_deref())
        .bind(profile.bio.as_deref())
        .bind(profile.avatar.as_deref())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if !user.is_empty() {
            sqlx::query(
                "UPDATE users SET
                    name = COALESCE(?, name),
                    email = COALESCE(?, email),
                    phone = COALESCE(?, phone)
                WHERE id = ?",
            )
            .bind(user.name.as_deref())
            .bind(user.email.as_deref())
            .bind(user.phone.as_deref())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewUser, is_unique_violation};

    async fn create(db: &Database, email: &str) -> i64 {
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
    async fn test_partial_update() {
        let db = Database::open(":memory:").await.unwrap();
        let id = create(&db, "a@x.com").await;

        let changed = db
            .profiles()
            .update(
                id,
                &ProfileChanges {
                    company: Some("Acme".into()),
                    ..Default::default()
                },
                &UserChanges {
                    phone: Some("0611".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(changed);

        let profile = db.profiles().get(id).await.unwrap().unwrap();
        assert_eq!(profile.company.as_deref(), Some("Acme"));
        assert_eq!(profile.full_name.as_deref(), Some("Alice"));

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.phone.as_deref(), Some("0611"));
        assert_eq!(user.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_email_conflict_rolls_back_profile() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = create(&db, "a@x.com").await;
        create(&db, "b@x.com").await;

        let err = db
            .profiles()
            .update(
                alice,
                &ProfileChanges {
                    bio: Some("hello".into()),
                    ..Default::default()
                },
                &UserChanges {
                    email: Some("b@x.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let profile = db.profiles().get(alice).await.unwrap().unwrap();
        assert!(profile.bio.is_none());
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let db = Database::open(":memory:").await.unwrap();
        let changed = db
            .profiles()
            .update(999, &ProfileChanges::default(), &UserChanges::default())
            .await
            .unwrap();
        assert!(!changed);
    }
}
