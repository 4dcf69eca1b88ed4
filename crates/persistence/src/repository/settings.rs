//! Per-user settings — a one-to-one preference bag

use crate::{now_rfc3339, DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSettingsRecord {
    pub id: i64,
    pub user_id: i64,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub price_alert_notifications: bool,
    pub market_update_notifications: bool,
    pub newsletter_notifications: bool,
    pub dark_mode: bool,
    pub currency: String,
    pub language: String,
    pub timezone: String,
    pub items_per_page: i64,
    pub default_sort_order: String,
    pub show_profit_percentage: bool,
    pub show_rating: bool,
    pub profile_visibility: String,
    pub share_analytics: bool,
    pub ebay_connected: bool,
    pub ebay_username: Option<String>,
    pub poshmark_connected: bool,
    pub poshmark_username: Option<String>,
    pub mercari_connected: bool,
    pub mercari_username: Option<String>,
    pub auto_update_market_prices: bool,
    pub price_update_frequency: String,
    pub enable_experimental_features: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial settings update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct SettingsChanges {
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub price_alert_notifications: Option<bool>,
    pub market_update_notifications: Option<bool>,
    pub newsletter_notifications: Option<bool>,
    pub dark_mode: Option<bool>,
    pub currency: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub items_per_page: Option<i64>,
    pub default_sort_order: Option<String>,
    pub show_profit_percentage: Option<bool>,
    pub show_rating: Option<bool>,
    pub profile_visibility: Option<String>,
    pub share_analytics: Option<bool>,
    pub ebay_connected: Option<bool>,
    pub ebay_username: Option<Option<String>>,
    pub poshmark_connected: Option<bool>,
    pub poshmark_username: Option<Option<String>>,
    pub mercari_connected: Option<bool>,
    pub mercari_username: Option<Option<String>>,
    pub auto_update_market_prices: Option<bool>,
    pub price_update_frequency: Option<String>,
    pub enable_experimental_features: Option<bool>,
}

const SETTINGS_COLUMNS: &str = "id, user_id, email_notifications, push_notifications, \
     price_alert_notifications, market_update_notifications, newsletter_notifications, \
     dark_mode, currency, language, timezone, items_per_page, default_sort_order, \
     show_profit_percentage, show_rating, profile_visibility, share_analytics, \
     ebay_connected, ebay_username, poshmark_connected, poshmark_username, \
     mercari_connected, mercari_username, auto_update_market_prices, \
     price_update_frequency, enable_experimental_features, created_at, updated_at";

pub struct SettingsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the user's settings row, creating the defaults on first access
    pub async fn get_or_create(&self, user_id: i64) -> DbResult<UserSettingsRecord> {
        if let Some(existing) = self.get(user_id).await? {
            return Ok(existing);
        }

        let now = now_rfc3339();
        sqlx::query("INSERT INTO user_settings (user_id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&now)
            .bind(&now)
            .execute(self.pool)
            .await?;

        self.get(user_id).await?.ok_or(DbError::NotFound("settings"))
    }

    pub async fn get(&self, user_id: i64) -> DbResult<Option<UserSettingsRecord>> {
        let record = sqlx::query_as::<_, UserSettingsRecord>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    pub async fn update(
        &self,
        user_id: i64,
        changes: SettingsChanges,
    ) -> DbResult<UserSettingsRecord> {
        // Make sure the row exists before mutating it
        self.get_or_create(user_id).await?;

        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<Option<String>> = Vec::new();

        macro_rules! set_bool {
            ($field:expr, $column:literal) => {
                if let Some(value) = $field {
                    sets.push(if value {
                        concat!($column, " = 1")
                    } else {
                        concat!($column, " = 0")
                    });
                }
            };
        }
        macro_rules! set_value {
            ($field:expr, $column:literal) => {
                if let Some(value) = $field {
                    sets.push(concat!($column, " = ?"));
                    binds.push(Some(value.to_string()));
                }
            };
        }
        macro_rules! set_nullable {
            ($field:expr, $column:literal) => {
                if let Some(value) = $field {
                    sets.push(concat!($column, " = ?"));
                    binds.push(value);
                }
            };
        }

        set_bool!(changes.email_notifications, "email_notifications");
        set_bool!(changes.push_notifications, "push_notifications");
        set_bool!(changes.price_alert_notifications, "price_alert_notifications");
        set_bool!(changes.market_update_notifications, "market_update_notifications");
        set_bool!(changes.newsletter_notifications, "newsletter_notifications");
        set_bool!(changes.dark_mode, "dark_mode");
        set_value!(changes.currency, "currency");
        set_value!(changes.language, "language");
        set_value!(changes.timezone, "timezone");
        set_value!(changes.items_per_page, "items_per_page");
        set_value!(changes.default_sort_order, "default_sort_order");
        set_bool!(changes.show_profit_percentage, "show_profit_percentage");
        set_bool!(changes.show_rating, "show_rating");
        set_value!(changes.profile_visibility, "profile_visibility");
        set_bool!(changes.share_analytics, "share_analytics");
        set_bool!(changes.ebay_connected, "ebay_connected");
        set_nullable!(changes.ebay_username, "ebay_username");
        set_bool!(changes.poshmark_connected, "poshmark_connected");
        set_nullable!(changes.poshmark_username, "poshmark_username");
        set_bool!(changes.mercari_connected, "mercari_connected");
        set_nullable!(changes.mercari_username, "mercari_username");
        set_bool!(changes.auto_update_market_prices, "auto_update_market_prices");
        set_value!(changes.price_update_frequency, "price_update_frequency");
        set_bool!(changes.enable_experimental_features, "enable_experimental_features");

        sets.push("updated_at = ?");
        binds.push(Some(now_rfc3339()));

        let sql = format!(
            "UPDATE user_settings SET {} WHERE user_id = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        query.bind(user_id).execute(self.pool).await?;

        self.get(user_id).await?.ok_or(DbError::NotFound("settings"))
    }

    /// Reset every preference back to its default
    pub async fn reset(&self, user_id: i64) -> DbResult<UserSettingsRecord> {
        self.get_or_create(user_id).await?;

        sqlx::query(
            r#"
            UPDATE user_settings SET
                email_notifications = 1, push_notifications = 1,
                price_alert_notifications = 1, market_update_notifications = 0,
                newsletter_notifications = 0, dark_mode = 0,
                currency = 'USD', language = 'en', timezone = 'UTC',
                items_per_page = 20, default_sort_order = 'created_at_desc',
                show_profit_percentage = 1, show_rating = 1,
                profile_visibility = 'private', share_analytics = 0,
                auto_update_market_prices = 1, price_update_frequency = 'daily',
                enable_experimental_features = 0, updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(now_rfc3339())
        .bind(user_id)
        .execute(self.pool)
        .await?;

        self.get(user_id).await?.ok_or(DbError::NotFound("settings"))
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

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = SettingsRepository::new(db.pool());

        let first = repo.get_or_create(user_id).await.unwrap();
        let second = repo.get_or_create(user_id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.currency, "USD");
        assert!(first.email_notifications);
    }

    #[tokio::test]
    async fn update_then_reset_restores_defaults() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = SettingsRepository::new(db.pool());

        let updated = repo
            .update(
                user_id,
                SettingsChanges {
                    dark_mode: Some(true),
                    currency: Some("EUR".to_string()),
                    items_per_page: Some(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.dark_mode);
        assert_eq!(updated.currency, "EUR");
        assert_eq!(updated.items_per_page, 50);

        let reset = repo.reset(user_id).await.unwrap();
        assert!(!reset.dark_mode);
        assert_eq!(reset.currency, "USD");
        assert_eq!(reset.items_per_page, 20);
    }
}
