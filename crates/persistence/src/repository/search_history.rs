//! Search history — per-query analytics snapshots

use crate::{now_rfc3339, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SearchHistoryRecord {
    pub id: i64,
    pub user_id: i64,
    pub query: String,
    pub results_count: i64,
    pub search_duration: Option<f64>,
    pub limit_requested: i64,
    pub avg_price: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub top_conditions: Option<String>,
    pub top_locations: Option<String>,
    pub items_saved_from_search: i64,
    pub search_success: bool,
    pub error_message: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewSearchRecord {
    pub user_id: i64,
    pub query: String,
    pub results_count: i64,
    pub search_duration: Option<f64>,
    pub limit_requested: i64,
    pub avg_price: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub top_conditions: Option<String>,
    pub top_locations: Option<String>,
    pub search_success: bool,
    pub error_message: Option<String>,
}

const HISTORY_COLUMNS: &str = "id, user_id, query, results_count, search_duration, \
     limit_requested, avg_price, min_price, max_price, top_conditions, top_locations, \
     items_saved_from_search, search_success, error_message, created_at";

pub struct SearchHistoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SearchHistoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: NewSearchRecord) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO search_history (
                user_id, query, results_count, search_duration, limit_requested,
                avg_price, min_price, max_price, top_conditions, top_locations,
                search_success, error_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.user_id)
        .bind(&new.query)
        .bind(new.results_count)
        .bind(new.search_duration)
        .bind(new.limit_requested)
        .bind(&new.avg_price)
        .bind(&new.min_price)
        .bind(&new.max_price)
        .bind(&new.top_conditions)
        .bind(&new.top_locations)
        .bind(if new.search_success { 1 } else { 0 })
        .bind(&new.error_message)
        .bind(now_rfc3339())
        .execute(self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn recent_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> DbResult<Vec<SearchHistoryRecord>> {
        let records = sqlx::query_as::<_, SearchHistoryRecord>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM search_history \
             WHERE user_id = ? ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    pub async fn count_for_user(&self, user_id: i64) -> DbResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM search_history WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

}
