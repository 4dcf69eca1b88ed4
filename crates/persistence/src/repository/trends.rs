//! Market trend time series — price points per item/platform/condition

use crate::{now_rfc3339, DbError, DbResult};
use chrono::{Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

/// One recorded price observation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketTrendRecord {
    pub id: i64,
    pub item_identifier: String,
    pub platform: String,
    pub condition: String,
    pub price: String,
    pub currency: String,
    pub listing_count: i64,
    pub sold_count: i64,
    pub average_days_to_sell: Option<f64>,
    pub data_source: Option<String>,
    pub confidence_score: f64,
    pub recorded_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMarketTrend {
    pub item_identifier: String,
    pub platform: String,
    pub condition: String,
    pub price: String,
    pub currency: String,
    pub listing_count: i64,
    pub sold_count: i64,
    pub data_source: Option<String>,
    pub confidence_score: f64,
}

/// Window statistics over the recorded prices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub average: f64,
    pub median: f64,
    pub lowest: f64,
    pub highest: f64,
    pub count: i64,
    pub period_days: i64,
}

const TREND_COLUMNS: &str = "id, item_identifier, platform, condition, price, currency, \
     listing_count, sold_count, average_days_to_sell, data_source, confidence_score, \
     recorded_at, created_at";

pub struct MarketTrendRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MarketTrendRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, new: NewMarketTrend) -> DbResult<MarketTrendRecord> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO market_trends (
                item_identifier, platform, condition, price, currency,
                listing_count, sold_count, data_source, confidence_score,
                recorded_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.item_identifier)
        .bind(&new.platform)
        .bind(&new.condition)
        .bind(&new.price)
        .bind(&new.currency)
        .bind(new.listing_count)
        .bind(new.sold_count)
        .bind(&new.data_source)
        .bind(new.confidence_score)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        let record = sqlx::query_as::<_, MarketTrendRecord>(&format!(
            "SELECT {TREND_COLUMNS} FROM market_trends WHERE id = ?"
        ))
        .bind(result.last_insert_rowid())
        .fetch_optional(self.pool)
        .await?;
        record.ok_or(DbError::NotFound("market trend"))
    }

    /// Price points for an item within the trailing window, oldest first.
    /// RFC 3339 UTC timestamps compare correctly as text.
    pub async fn price_trends(
        &self,
        item_identifier: &str,
        platform: Option<&str>,
        condition: Option<&str>,
        days_back: i64,
        limit: i64,
    ) -> DbResult<Vec<MarketTrendRecord>> {
        let cutoff = (Utc::now() - Duration::days(days_back)).to_rfc3339();

        let mut sql = format!(
            "SELECT {TREND_COLUMNS} FROM market_trends \
             WHERE item_identifier = ? AND recorded_at >= ?"
        );
        let mut binds: Vec<String> = Vec::new();

        if let Some(p) = platform {
            sql.push_str(" AND platform = ?");
            binds.push(p.to_string());
        }
        if let Some(c) = condition {
            sql.push_str(" AND condition = ?");
            binds.push(c.to_string());
        }
        sql.push_str(" ORDER BY recorded_at ASC LIMIT ?");

        let mut query = sqlx::query_as::<_, MarketTrendRecord>(&sql)
            .bind(item_identifier)
            .bind(&cutoff);
        for b in &binds {
            query = query.bind(b);
        }
        let records = query.bind(limit).fetch_all(self.pool).await?;
        Ok(records)
    }

    /// Average/median/low/high over the window; `None` when no data exists
    pub async fn summary(
        &self,
        item_identifier: &str,
        platform: Option<&str>,
        condition: Option<&str>,
        days_back: i64,
    ) -> DbResult<Option<MarketSummary>> {
        let records = self
            .price_trends(item_identifier, platform, condition, days_back, 1000)
            .await?;

        let mut prices: Vec<Decimal> = records
            .iter()
            .filter_map(|r| Decimal::from_str(&r.price).ok())
            .collect();
        if prices.is_empty() {
            return Ok(None);
        }
        prices.sort();

        let count = prices.len();
        let sum: Decimal = prices.iter().copied().sum();
        let average = (sum / Decimal::from(count)).round_dp(2);
        let median = prices[count / 2];

        Ok(Some(MarketSummary {
            average: average.to_f64().unwrap_or(0.0),
            median: median.to_f64().unwrap_or(0.0),
            lowest: prices[0].to_f64().unwrap_or(0.0),
            highest: prices[count - 1].to_f64().unwrap_or(0.0),
            count: count as i64,
            period_days: days_back,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn point(item: &str, price: &str) -> NewMarketTrend {
        NewMarketTrend {
            item_identifier: item.to_string(),
            platform: "ebay".to_string(),
            condition: "good".to_string(),
            price: price.to_string(),
            currency: "USD".to_string(),
            listing_count: 1,
            sold_count: 0,
            data_source: Some("portfolio_update".to_string()),
            confidence_score: 0.5,
        }
    }

    #[tokio::test]
    async fn summary_reports_window_statistics() {
        let db = Database::in_memory().await.unwrap();
        let repo = MarketTrendRepository::new(db.pool());

        for price in ["100", "120", "90", "110"] {
            repo.record(point("iphone 13", price)).await.unwrap();
        }

        let summary = repo
            .summary("iphone 13", Some("ebay"), None, 30)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.lowest, 90.0);
        assert_eq!(summary.highest, 120.0);
        assert_eq!(summary.average, 105.0);
        // Upper median of [90, 100, 110, 120]
        assert_eq!(summary.median, 110.0);
    }

    #[tokio::test]
    async fn summary_is_none_without_data() {
        let db = Database::in_memory().await.unwrap();
        let repo = MarketTrendRepository::new(db.pool());
        assert!(repo.summary("nothing", None, None, 30).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn trends_filter_by_platform() {
        let db = Database::in_memory().await.unwrap();
        let repo = MarketTrendRepository::new(db.pool());

        repo.record(point("ps5", "450")).await.unwrap();
        let mut other = point("ps5", "470");
        other.platform = "mercari".to_string();
        repo.record(other).await.unwrap();

        let ebay_only = repo
            .price_trends("ps5", Some("ebay"), None, 30, 100)
            .await
            .unwrap();
        assert_eq!(ebay_only.len(), 1);
        assert_eq!(ebay_only[0].price, "450");
    }
}
