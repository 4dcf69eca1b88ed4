//! Account repository — registration, lookup and profile mutation

use crate::{now_rfc3339, DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A registered account row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_login: Option<String>,
}

/// Fields required to insert a new account (hash computed by the caller)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_verification_token: String,
}

/// Partial profile update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
}

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, \
     is_active, is_verified, email_verification_token, password_reset_token, \
     password_reset_expires, created_at, updated_at, last_login";

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account. Duplicate email/username surfaces as
    /// `DbError::Conflict` so the route can answer 409.
    pub async fn create(&self, new: NewUser) -> DbResult<UserRecord> {
        if self.find_by_email(&new.email).await?.is_some() {
            return Err(DbError::Conflict("Email already registered".into()));
        }
        if self.find_by_username(&new.username).await?.is_some() {
            return Err(DbError::Conflict("Username already taken".into()));
        }

        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, username, password_hash, first_name, last_name,
                               email_verification_token, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email_verification_token)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.find_by_id(result.last_insert_rowid())
            .await?
            .ok_or(DbError::NotFound("user"))
    }

    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Stamp a successful login
    pub async fn touch_last_login(&self, id: i64) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(now_rfc3339())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Apply a partial profile update. Uniqueness of a changed email/username
    /// must be checked by the caller first (it has the conflict context).
    pub async fn update_profile(&self, id: i64, changes: ProfileChanges) -> DbResult<UserRecord> {
        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<Option<String>> = Vec::new();

        if let Some(email) = changes.email {
            sets.push("email = ?");
            binds.push(Some(email));
        }
        if let Some(username) = changes.username {
            sets.push("username = ?");
            binds.push(Some(username));
        }
        if let Some(first_name) = changes.first_name {
            sets.push("first_name = ?");
            binds.push(first_name);
        }
        if let Some(last_name) = changes.last_name {
            sets.push("last_name = ?");
            binds.push(last_name);
        }

        if !sets.is_empty() {
            sets.push("updated_at = ?");
            binds.push(Some(now_rfc3339()));

            let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
            let mut query = sqlx::query(&sql);
            for b in &binds {
                query = query.bind(b);
            }
            query.bind(id).execute(self.pool).await?;
        }

        self.find_by_id(id).await?.ok_or(DbError::NotFound("user"))
    }

    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now_rfc3339())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_password_reset_token(
        &self,
        id: i64,
        token: &str,
        expires_at: &str,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token = ?, password_reset_expires = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(token)
        .bind(expires_at)
        .bind(now_rfc3339())
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Delete the account. The user_id foreign keys cascade, removing saved
    /// items, portfolio rows, alerts, history and settings with it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("user"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn sample_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            first_name: None,
            last_name: None,
            email_verification_token: "tok".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        repo.create(sample_user("a@example.com", "alice")).await.unwrap();
        let err = repo
            .create(sample_user("a@example.com", "alice2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // No duplicate row was created
        assert!(repo.find_by_username("alice2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        repo.create(sample_user("a@example.com", "alice")).await.unwrap();
        let err = repo
            .create(sample_user("b@example.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn profile_update_bumps_updated_at() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        let user = repo.create(sample_user("a@example.com", "alice")).await.unwrap();
        let updated = repo
            .update_profile(
                user.id,
                ProfileChanges {
                    first_name: Some(Some("Alice".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name.as_deref(), Some("Alice"));
        assert!(updated.updated_at >= user.updated_at);
    }
}
