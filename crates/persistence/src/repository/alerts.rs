//! Price alerts and their notification log

use crate::{now_rfc3339, DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A configured price alert
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceAlertRecord {
    pub id: i64,
    pub user_id: i64,
    pub item_identifier: String,
    pub platform: Option<String>,
    pub condition: Option<String>,
    pub alert_type: String,
    pub threshold_price: Option<String>,
    pub percentage_change: Option<f64>,
    pub is_active: bool,
    pub notification_method: String,
    pub baseline_price: Option<String>,
    pub last_checked_price: Option<String>,
    pub last_triggered: Option<String>,
    pub trigger_count: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One entry in the notification log
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertNotificationRecord {
    pub id: i64,
    pub alert_id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub status: String,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
    pub trigger_price: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewPriceAlert {
    pub user_id: i64,
    pub item_identifier: String,
    pub platform: Option<String>,
    pub condition: Option<String>,
    pub alert_type: String,
    pub threshold_price: Option<String>,
    pub percentage_change: Option<f64>,
    pub notification_method: String,
    pub baseline_price: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PriceAlertChanges {
    pub platform: Option<String>,
    pub condition: Option<String>,
    pub threshold_price: Option<String>,
    pub percentage_change: Option<f64>,
    pub notification_method: Option<String>,
    pub baseline_price: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStats {
    pub total_alerts: i64,
    pub active_alerts: i64,
    pub triggered_alerts: i64,
    pub inactive_alerts: i64,
}

const ALERT_COLUMNS: &str = "id, user_id, item_identifier, platform, condition, alert_type, \
     threshold_price, percentage_change, is_active, notification_method, baseline_price, \
     last_checked_price, last_triggered, trigger_count, notes, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, alert_id, user_id, notification_type, title, message, \
     status, sent_at, error_message, trigger_price, created_at";

pub struct AlertRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: NewPriceAlert) -> DbResult<PriceAlertRecord> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO price_alerts (
                user_id, item_identifier, platform, condition, alert_type,
                threshold_price, percentage_change, notification_method,
                baseline_price, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.user_id)
        .bind(&new.item_identifier)
        .bind(&new.platform)
        .bind(&new.condition)
        .bind(&new.alert_type)
        .bind(&new.threshold_price)
        .bind(new.percentage_change)
        .bind(&new.notification_method)
        .bind(&new.baseline_price)
        .bind(&new.notes)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get(new.user_id, result.last_insert_rowid())
            .await?
            .ok_or(DbError::NotFound("alert"))
    }

    pub async fn get(&self, user_id: i64, id: i64) -> DbResult<Option<PriceAlertRecord>> {
        let record = sqlx::query_as::<_, PriceAlertRecord>(&format!(
            "SELECT {ALERT_COLUMNS} FROM price_alerts WHERE user_id = ? AND id = ?"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Newest-first listing with optional active / type filters
    pub async fn list(
        &self,
        user_id: i64,
        is_active: Option<bool>,
        alert_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<PriceAlertRecord>, i64)> {
        let mut where_clauses = vec!["user_id = ?".to_string()];
        let mut binds: Vec<String> = Vec::new();

        if let Some(active) = is_active {
            where_clauses.push(format!("is_active = {}", if active { 1 } else { 0 }));
        }
        if let Some(kind) = alert_type {
            where_clauses.push("alert_type = ?".to_string());
            binds.push(kind.to_string());
        }

        let where_sql = where_clauses.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM price_alerts WHERE {where_sql}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(user_id);
        for b in &binds {
            count_query = count_query.bind(b);
        }
        let (total,) = count_query.fetch_one(self.pool).await?;

        let data_sql = format!(
            "SELECT {ALERT_COLUMNS} FROM price_alerts WHERE {where_sql} \
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let mut data_query = sqlx::query_as::<_, PriceAlertRecord>(&data_sql).bind(user_id);
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

    pub async fn stats(&self, user_id: i64) -> DbResult<AlertStats> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM price_alerts WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        let (active,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM price_alerts WHERE user_id = ? AND is_active = 1")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        let (triggered,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM price_alerts WHERE user_id = ? AND last_triggered IS NOT NULL",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(AlertStats {
            total_alerts: total,
            active_alerts: active,
            triggered_alerts: triggered,
            inactive_alerts: total - active,
        })
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        changes: PriceAlertChanges,
    ) -> DbResult<PriceAlertRecord> {
        if self.get(user_id, id).await?.is_none() {
            return Err(DbError::NotFound("alert"));
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

        set_text!(changes.platform, "platform");
        set_text!(changes.condition, "condition");
        set_text!(changes.threshold_price, "threshold_price");
        set_text!(changes.notification_method, "notification_method");
        set_text!(changes.baseline_price, "baseline_price");
        set_text!(changes.notes, "notes");
        if let Some(pct) = changes.percentage_change {
            sets.push("percentage_change = ?");
            binds.push(pct.to_string());
        }

        sets.push("updated_at = ?");
        binds.push(now_rfc3339());

        let sql = format!(
            "UPDATE price_alerts SET {} WHERE user_id = ? AND id = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        query.bind(user_id).bind(id).execute(self.pool).await?;

        self.get(user_id, id).await?.ok_or(DbError::NotFound("alert"))
    }

    /// Flip the active flag, returning the new state
    pub async fn set_active(&self, user_id: i64, id: i64, active: bool) -> DbResult<PriceAlertRecord> {
        let result = sqlx::query(
            "UPDATE price_alerts SET is_active = ?, updated_at = ? WHERE user_id = ? AND id = ?",
        )
        .bind(if active { 1 } else { 0 })
        .bind(now_rfc3339())
        .bind(user_id)
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("alert"));
        }
        self.get(user_id, id).await?.ok_or(DbError::NotFound("alert"))
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM price_alerts WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("alert"));
        }
        Ok(())
    }

    /// Active alerts watching an item, across all users (alert evaluation
    /// runs when new price data for the item arrives)
    pub async fn active_for_item(&self, item_identifier: &str) -> DbResult<Vec<PriceAlertRecord>> {
        let records = sqlx::query_as::<_, PriceAlertRecord>(&format!(
            "SELECT {ALERT_COLUMNS} FROM price_alerts WHERE item_identifier = ? AND is_active = 1"
        ))
        .bind(item_identifier)
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    /// Stamp a trigger: bump the counter and remember the checked price
    pub async fn record_trigger(&self, alert_id: i64, checked_price: &str) -> DbResult<()> {
        let now = now_rfc3339();
        sqlx::query(
            "UPDATE price_alerts SET trigger_count = trigger_count + 1, last_triggered = ?, \
             last_checked_price = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(checked_price)
        .bind(&now)
        .bind(alert_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_checked_price(&self, alert_id: i64, checked_price: &str) -> DbResult<()> {
        sqlx::query("UPDATE price_alerts SET last_checked_price = ? WHERE id = ?")
            .bind(checked_price)
            .bind(alert_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_notification(
        &self,
        alert_id: i64,
        user_id: i64,
        notification_type: &str,
        title: &str,
        message: &str,
        trigger_price: Option<&str>,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO alert_notifications (
                alert_id, user_id, notification_type, title, message, trigger_price, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(alert_id)
        .bind(user_id)
        .bind(notification_type)
        .bind(title)
        .bind(message)
        .bind(trigger_price)
        .bind(now_rfc3339())
        .execute(self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn notifications_for_alert(
        &self,
        user_id: i64,
        alert_id: i64,
    ) -> DbResult<Vec<AlertNotificationRecord>> {
        let records = sqlx::query_as::<_, AlertNotificationRecord>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM alert_notifications \
             WHERE user_id = ? AND alert_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(alert_id)
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    pub async fn count_for_user(&self, user_id: i64) -> DbResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM price_alerts WHERE user_id = ?")
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

    fn threshold_alert(user_id: i64, item: &str) -> NewPriceAlert {
        NewPriceAlert {
            user_id,
            item_identifier: item.to_string(),
            platform: None,
            condition: None,
            alert_type: "threshold".to_string(),
            threshold_price: Some("300".to_string()),
            percentage_change: None,
            notification_method: "email".to_string(),
            baseline_price: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn toggle_flips_active_flag() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = AlertRepository::new(db.pool());

        let alert = repo.insert(threshold_alert(user_id, "iphone 13")).await.unwrap();
        assert!(alert.is_active);

        let toggled = repo.set_active(user_id, alert.id, false).await.unwrap();
        assert!(!toggled.is_active);

        let stats = repo.stats(user_id).await.unwrap();
        assert_eq!(stats.total_alerts, 1);
        assert_eq!(stats.active_alerts, 0);
        assert_eq!(stats.inactive_alerts, 1);
    }

    #[tokio::test]
    async fn trigger_bumps_counter_and_logs_notification() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = AlertRepository::new(db.pool());

        let alert = repo.insert(threshold_alert(user_id, "iphone 13")).await.unwrap();
        repo.record_trigger(alert.id, "289.99").await.unwrap();
        repo.insert_notification(alert.id, user_id, "email", "Price alert", "below threshold", Some("289.99"))
            .await
            .unwrap();

        let refreshed = repo.get(user_id, alert.id).await.unwrap().unwrap();
        assert_eq!(refreshed.trigger_count, 1);
        assert!(refreshed.last_triggered.is_some());
        assert_eq!(refreshed.last_checked_price.as_deref(), Some("289.99"));

        let log = repo.notifications_for_alert(user_id, alert.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, "pending");
    }
}
