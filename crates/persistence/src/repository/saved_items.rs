//! Saved marketplace listings — one bookmark per (user, listing)

use crate::{now_rfc3339, DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A bookmarked marketplace listing
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedItemRecord {
    pub id: i64,
    pub user_id: i64,
    pub listing_id: String,
    pub title: String,
    pub price: String,
    pub currency: String,
    pub image_url: Option<String>,
    pub item_url: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub shipping_cost: Option<String>,
    pub estimated_profit: Option<String>,
    pub confidence_score: Option<f64>,
    pub market_data: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub is_favorite: bool,
    pub status: String,
    pub purchase_price: Option<String>,
    pub purchase_date: Option<String>,
    pub sale_price: Option<String>,
    pub sale_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SavedItemRecord {
    /// Comma-joined tags column split into a list
    pub fn tags_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewSavedItem {
    pub user_id: i64,
    pub listing_id: String,
    pub title: String,
    pub price: String,
    pub currency: String,
    pub image_url: Option<String>,
    pub item_url: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub shipping_cost: Option<String>,
    pub estimated_profit: Option<String>,
    pub confidence_score: Option<f64>,
    pub notes: Option<String>,
}

/// Allowlisted partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct SavedItemChanges {
    pub title: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
    pub item_url: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub shipping_cost: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub is_favorite: Option<bool>,
    pub status: Option<String>,
    pub estimated_profit: Option<String>,
}

const SAVED_ITEM_COLUMNS: &str = "id, user_id, listing_id, title, price, currency, image_url, \
     item_url, condition, location, shipping_cost, estimated_profit, confidence_score, \
     market_data, notes, tags, is_favorite, status, purchase_price, purchase_date, \
     sale_price, sale_date, created_at, updated_at";

pub struct SavedItemRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SavedItemRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Bookmark a listing. Saving the same listing twice for one user is a
    /// `DbError::Conflict` (409 upstream).
    pub async fn insert(&self, new: NewSavedItem) -> DbResult<SavedItemRecord> {
        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM saved_items WHERE user_id = ? AND listing_id = ?",
        )
        .bind(new.user_id)
        .bind(&new.listing_id)
        .fetch_optional(self.pool)
        .await?;
        if existing.is_some() {
            return Err(DbError::Conflict("Item already saved".into()));
        }

        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO saved_items (
                user_id, listing_id, title, price, currency, image_url, item_url,
                condition, location, shipping_cost, estimated_profit, confidence_score,
                notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.user_id)
        .bind(&new.listing_id)
        .bind(&new.title)
        .bind(&new.price)
        .bind(&new.currency)
        .bind(&new.image_url)
        .bind(&new.item_url)
        .bind(&new.condition)
        .bind(&new.location)
        .bind(&new.shipping_cost)
        .bind(&new.estimated_profit)
        .bind(new.confidence_score)
        .bind(&new.notes)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get(new.user_id, result.last_insert_rowid())
            .await?
            .ok_or(DbError::NotFound("saved item"))
    }

    pub async fn get(&self, user_id: i64, id: i64) -> DbResult<Option<SavedItemRecord>> {
        let record = sqlx::query_as::<_, SavedItemRecord>(&format!(
            "SELECT {SAVED_ITEM_COLUMNS} FROM saved_items WHERE user_id = ? AND id = ?"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Paginated listing with optional status / favorite filters
    pub async fn list(
        &self,
        user_id: i64,
        status: Option<&str>,
        favorites_only: bool,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<SavedItemRecord>, i64)> {
        let mut where_clauses = vec!["user_id = ?".to_string()];
        let mut binds: Vec<String> = Vec::new();

        if let Some(st) = status {
            where_clauses.push("status = ?".to_string());
            binds.push(st.to_string());
        }
        if favorites_only {
            where_clauses.push("is_favorite = 1".to_string());
        }

        let where_sql = where_clauses.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM saved_items WHERE {where_sql}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(user_id);
        for b in &binds {
            count_query = count_query.bind(b);
        }
        let (total,) = count_query.fetch_one(self.pool).await?;

        let data_sql = format!(
            "SELECT {SAVED_ITEM_COLUMNS} FROM saved_items WHERE {where_sql} \
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let mut data_query = sqlx::query_as::<_, SavedItemRecord>(&data_sql).bind(user_id);
        for b in &binds {
            data_query = data_query.bind(b);
        }
        let records = data_query
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        Ok((records, total))
    }

    /// Apply a partial update; `NotFound` if the row does not belong to the user
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        changes: SavedItemChanges,
    ) -> DbResult<SavedItemRecord> {
        if self.get(user_id, id).await?.is_none() {
            return Err(DbError::NotFound("saved item"));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        macro_rules! set_text {
            ($field:expr, $column:literal) => {
                if let Some(value) = $field {
                    sets.push(concat!($column, " = ?"));
                    binds.push(value);
                }
            };
        }

        set_text!(changes.title, "title");
        set_text!(changes.price, "price");
        set_text!(changes.currency, "currency");
        set_text!(changes.image_url, "image_url");
        set_text!(changes.item_url, "item_url");
        set_text!(changes.condition, "condition");
        set_text!(changes.location, "location");
        set_text!(changes.shipping_cost, "shipping_cost");
        set_text!(changes.notes, "notes");
        set_text!(changes.tags, "tags");
        set_text!(changes.status, "status");
        set_text!(changes.estimated_profit, "estimated_profit");
        if let Some(fav) = changes.is_favorite {
            sets.push(if fav { "is_favorite = 1" } else { "is_favorite = 0" });
        }

        sets.push("updated_at = ?");
        binds.push(now_rfc3339());

        let sql = format!(
            "UPDATE saved_items SET {} WHERE user_id = ? AND id = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        query.bind(user_id).bind(id).execute(self.pool).await?;

        self.get(user_id, id).await?.ok_or(DbError::NotFound("saved item"))
    }

    /// Remove a bookmark, returning the deleted row
    pub async fn delete(&self, user_id: i64, id: i64) -> DbResult<SavedItemRecord> {
        let record = self
            .get(user_id, id)
            .await?
            .ok_or(DbError::NotFound("saved item"))?;

        sqlx::query("DELETE FROM saved_items WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(record)
    }

    pub async fn count_for_user(&self, user_id: i64) -> DbResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM saved_items WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::users::{NewUser, UserRepository};
    use crate::Database;

    async fn seed_user(db: &Database) -> i64 {
        UserRepository::new(db.pool())
            .create(NewUser {
                email: "a@example.com".to_string(),
                username: "alice".to_string(),
                password_hash: "$argon2id$fake".to_string(),
                first_name: None,
                last_name: None,
                email_verification_token: "tok".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    fn sample_item(user_id: i64, listing_id: &str) -> NewSavedItem {
        NewSavedItem {
            user_id,
            listing_id: listing_id.to_string(),
            title: "iPhone 13 128GB".to_string(),
            price: "429.99".to_string(),
            currency: "USD".to_string(),
            image_url: None,
            item_url: None,
            condition: Some("Used".to_string()),
            location: None,
            shipping_cost: None,
            estimated_profit: Some("86.45".to_string()),
            confidence_score: Some(0.86),
            notes: None,
        }
    }

    #[tokio::test]
    async fn saving_same_listing_twice_conflicts() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = SavedItemRepository::new(db.pool());

        repo.insert(sample_item(user_id, "v1|12345|0")).await.unwrap();
        let err = repo.insert(sample_item(user_id, "v1|12345|0")).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let (_, total) = repo.list(user_id, None, false, 20, 0).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn update_advances_updated_at_and_missing_row_is_not_found() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = SavedItemRepository::new(db.pool());

        let item = repo.insert(sample_item(user_id, "v1|12345|0")).await.unwrap();
        let updated = repo
            .update(
                user_id,
                item.id,
                SavedItemChanges {
                    notes: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("x"));
        assert!(updated.updated_at >= item.updated_at);

        let err = repo
            .update(user_id, 9999, SavedItemChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn tags_round_trip_as_comma_joined_text() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = SavedItemRepository::new(db.pool());

        let item = repo.insert(sample_item(user_id, "v1|77|0")).await.unwrap();
        let updated = repo
            .update(
                user_id,
                item.id,
                SavedItemChanges {
                    tags: Some("electronics, apple".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tags_list(), vec!["electronics", "apple"]);
    }
}
