//! Portfolio repository — owned items through the owned -> listed -> sold lifecycle

use crate::{now_rfc3339, DbError, DbResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

/// An owned item row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioItemRecord {
    pub id: i64,
    pub user_id: i64,
    pub item_name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub condition: String,
    pub category: Option<String>,
    pub purchase_price: String,
    pub purchase_date: String,
    pub purchase_platform: Option<String>,
    pub purchase_location: Option<String>,
    pub current_market_price: Option<String>,
    pub last_price_update: Option<String>,
    pub rating: Option<f64>,
    pub rating_factors: Option<String>,
    pub status: String,
    pub listing_price: Option<String>,
    pub listing_platform: Option<String>,
    pub listing_date: Option<String>,
    pub sale_price: Option<String>,
    pub sale_date: Option<String>,
    pub sale_platform: Option<String>,
    pub images: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PortfolioItemRecord {
    fn decimal(value: Option<&str>) -> Option<Decimal> {
        value.and_then(|v| Decimal::from_str(v).ok())
    }

    /// Realized profit when sold, otherwise unrealized against the market price
    pub fn profit_loss(&self) -> Option<Decimal> {
        let purchase = Self::decimal(Some(&self.purchase_price))?;
        if self.status == "sold" {
            return Self::decimal(self.sale_price.as_deref()).map(|sale| sale - purchase);
        }
        Self::decimal(self.current_market_price.as_deref()).map(|market| market - purchase)
    }

    pub fn profit_percentage(&self) -> Option<f64> {
        let purchase = Self::decimal(Some(&self.purchase_price))?;
        if purchase.is_zero() {
            return None;
        }
        let profit = self.profit_loss()?;
        (profit / purchase * Decimal::from(100)).to_f64()
    }
}

#[derive(Debug, Clone)]
pub struct NewPortfolioItem {
    pub user_id: i64,
    pub item_name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub condition: String,
    pub category: Option<String>,
    pub purchase_price: String,
    pub purchase_date: String,
    pub purchase_platform: Option<String>,
    pub purchase_location: Option<String>,
    pub rating: Option<f64>,
    pub rating_factors: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct PortfolioItemChanges {
    pub item_name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub condition: Option<String>,
    pub category: Option<String>,
    pub purchase_price: Option<String>,
    pub purchase_date: Option<String>,
    pub purchase_platform: Option<String>,
    pub purchase_location: Option<String>,
    pub listing_price: Option<String>,
    pub listing_platform: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
}

/// Aggregates shown alongside the portfolio listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_items: i64,
    pub owned_items: i64,
    pub listed_items: i64,
    pub sold_items: i64,
    pub total_investment: String,
    pub current_value: String,
    pub total_profit_loss: String,
    pub profit_percentage: f64,
}

const PORTFOLIO_COLUMNS: &str = "id, user_id, item_name, brand, model, size, color, condition, \
     category, purchase_price, purchase_date, purchase_platform, purchase_location, \
     current_market_price, last_price_update, rating, rating_factors, status, \
     listing_price, listing_platform, listing_date, sale_price, sale_date, sale_platform, \
     images, notes, tags, created_at, updated_at";

pub struct PortfolioRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PortfolioRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: NewPortfolioItem) -> DbResult<PortfolioItemRecord> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO portfolio_items (
                user_id, item_name, brand, model, size, color, condition, category,
                purchase_price, purchase_date, purchase_platform, purchase_location,
                rating, rating_factors, notes, tags, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.user_id)
        .bind(&new.item_name)
        .bind(&new.brand)
        .bind(&new.model)
        .bind(&new.size)
        .bind(&new.color)
        .bind(&new.condition)
        .bind(&new.category)
        .bind(&new.purchase_price)
        .bind(&new.purchase_date)
        .bind(&new.purchase_platform)
        .bind(&new.purchase_location)
        .bind(new.rating)
        .bind(&new.rating_factors)
        .bind(&new.notes)
        .bind(&new.tags)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get(new.user_id, result.last_insert_rowid())
            .await?
            .ok_or(DbError::NotFound("portfolio item"))
    }

    pub async fn get(&self, user_id: i64, id: i64) -> DbResult<Option<PortfolioItemRecord>> {
        let record = sqlx::query_as::<_, PortfolioItemRecord>(&format!(
            "SELECT {PORTFOLIO_COLUMNS} FROM portfolio_items WHERE user_id = ? AND id = ?"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Paginated listing with an optional status filter and whitelisted sort
    pub async fn list(
        &self,
        user_id: i64,
        status: Option<&str>,
        sort_by: Option<&str>,
        descending: bool,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<PortfolioItemRecord>, i64)> {
        let mut where_clauses = vec!["user_id = ?".to_string()];
        let mut binds: Vec<String> = Vec::new();

        if let Some(st) = status {
            where_clauses.push("status = ?".to_string());
            binds.push(st.to_string());
        }

        let where_sql = where_clauses.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM portfolio_items WHERE {where_sql}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(user_id);
        for b in &binds {
            count_query = count_query.bind(b);
        }
        let (total,) = count_query.fetch_one(self.pool).await?;

        let order_col = match sort_by {
            Some("item_name") => "item_name",
            Some("purchase_price") => "CAST(purchase_price AS REAL)",
            Some("purchase_date") => "purchase_date",
            Some("rating") => "rating",
            Some("status") => "status",
            _ => "created_at",
        };
        let order_dir = if descending { "DESC" } else { "ASC" };

        let data_sql = format!(
            "SELECT {PORTFOLIO_COLUMNS} FROM portfolio_items WHERE {where_sql} \
             ORDER BY {order_col} {order_dir} LIMIT ? OFFSET ?"
        );
        let mut data_query = sqlx::query_as::<_, PortfolioItemRecord>(&data_sql).bind(user_id);
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

    /// Status counts plus investment/value totals over every row for the user.
    /// Sold items contribute their sale price, everything else the market
    /// price when known, falling back to the purchase price.
    pub async fn summary(&self, user_id: i64) -> DbResult<PortfolioSummary> {
        let records = sqlx::query_as::<_, PortfolioItemRecord>(&format!(
            "SELECT {PORTFOLIO_COLUMNS} FROM portfolio_items WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let mut owned = 0i64;
        let mut listed = 0i64;
        let mut sold = 0i64;
        let mut total_investment = Decimal::ZERO;
        let mut current_value = Decimal::ZERO;

        for item in &records {
            match item.status.as_str() {
                "listed" => listed += 1,
                "sold" => sold += 1,
                _ => owned += 1,
            }

            let purchase =
                Decimal::from_str(&item.purchase_price).unwrap_or(Decimal::ZERO);
            total_investment += purchase;

            let value = if item.status == "sold" {
                PortfolioItemRecord::decimal(item.sale_price.as_deref())
            } else {
                PortfolioItemRecord::decimal(item.current_market_price.as_deref())
            };
            current_value += value.unwrap_or(purchase);
        }

        let total_profit_loss = current_value - total_investment;
        let profit_percentage = if total_investment.is_zero() {
            0.0
        } else {
            (total_profit_loss / total_investment * Decimal::from(100))
                .round_dp(2)
                .to_f64()
                .unwrap_or(0.0)
        };

        Ok(PortfolioSummary {
            total_items: records.len() as i64,
            owned_items: owned,
            listed_items: listed,
            sold_items: sold,
            total_investment: total_investment.round_dp(2).to_string(),
            current_value: current_value.round_dp(2).to_string(),
            total_profit_loss: total_profit_loss.round_dp(2).to_string(),
            profit_percentage,
        })
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        changes: PortfolioItemChanges,
    ) -> DbResult<PortfolioItemRecord> {
        if self.get(user_id, id).await?.is_none() {
            return Err(DbError::NotFound("portfolio item"));
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

        set_text!(changes.item_name, "item_name");
        set_text!(changes.brand, "brand");
        set_text!(changes.model, "model");
        set_text!(changes.size, "size");
        set_text!(changes.color, "color");
        set_text!(changes.condition, "condition");
        set_text!(changes.category, "category");
        set_text!(changes.purchase_price, "purchase_price");
        set_text!(changes.purchase_date, "purchase_date");
        set_text!(changes.purchase_platform, "purchase_platform");
        set_text!(changes.purchase_location, "purchase_location");
        set_text!(changes.listing_price, "listing_price");
        set_text!(changes.listing_platform, "listing_platform");
        set_text!(changes.notes, "notes");
        set_text!(changes.tags, "tags");

        sets.push("updated_at = ?");
        binds.push(now_rfc3339());

        let sql = format!(
            "UPDATE portfolio_items SET {} WHERE user_id = ? AND id = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        query.bind(user_id).bind(id).execute(self.pool).await?;

        self.get(user_id, id)
            .await?
            .ok_or(DbError::NotFound("portfolio item"))
    }

    /// Record a fresh market price along with the recomputed rating
    pub async fn update_market_price(
        &self,
        user_id: i64,
        id: i64,
        price: &str,
        rating: f64,
        rating_factors: &str,
    ) -> DbResult<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "UPDATE portfolio_items SET current_market_price = ?, last_price_update = ?, \
             rating = ?, rating_factors = ?, updated_at = ? WHERE user_id = ? AND id = ?",
        )
        .bind(price)
        .bind(&now)
        .bind(rating)
        .bind(rating_factors)
        .bind(&now)
        .bind(user_id)
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("portfolio item"));
        }
        Ok(())
    }

    /// Transition to `listed`
    pub async fn mark_listed(
        &self,
        user_id: i64,
        id: i64,
        listing_price: &str,
        platform: Option<&str>,
    ) -> DbResult<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "UPDATE portfolio_items SET status = 'listed', listing_price = ?, \
             listing_platform = ?, listing_date = ?, updated_at = ? \
             WHERE user_id = ? AND id = ?",
        )
        .bind(listing_price)
        .bind(platform)
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("portfolio item"));
        }
        Ok(())
    }

    /// Transition to `sold`
    pub async fn mark_sold(
        &self,
        user_id: i64,
        id: i64,
        sale_price: &str,
        platform: Option<&str>,
    ) -> DbResult<()> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "UPDATE portfolio_items SET status = 'sold', sale_price = ?, \
             sale_platform = ?, sale_date = ?, updated_at = ? \
             WHERE user_id = ? AND id = ?",
        )
        .bind(sale_price)
        .bind(platform)
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("portfolio item"));
        }
        Ok(())
    }

    pub async fn set_status(&self, user_id: i64, id: i64, status: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE portfolio_items SET status = ?, updated_at = ? WHERE user_id = ? AND id = ?")
                .bind(status)
                .bind(now_rfc3339())
                .bind(user_id)
                .bind(id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("portfolio item"));
        }
        Ok(())
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM portfolio_items WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("portfolio item"));
        }
        Ok(())
    }

    pub async fn count_for_user(&self, user_id: i64) -> DbResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM portfolio_items WHERE user_id = ?")
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

    fn sample_item(user_id: i64, name: &str, purchase_price: &str) -> NewPortfolioItem {
        NewPortfolioItem {
            user_id,
            item_name: name.to_string(),
            brand: Some("Nike".to_string()),
            model: None,
            size: None,
            color: None,
            condition: "good".to_string(),
            category: None,
            purchase_price: purchase_price.to_string(),
            purchase_date: "2026-01-15T00:00:00+00:00".to_string(),
            purchase_platform: None,
            purchase_location: None,
            rating: Some(6.5),
            rating_factors: None,
            notes: None,
            tags: None,
        }
    }

    #[tokio::test]
    async fn summary_tracks_lifecycle_and_totals() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = PortfolioRepository::new(db.pool());

        let a = repo.insert(sample_item(user_id, "Dunk Low", "100")).await.unwrap();
        let b = repo.insert(sample_item(user_id, "Jordan 1", "200")).await.unwrap();
        repo.mark_sold(user_id, b.id, "260", Some("ebay")).await.unwrap();
        repo.update_market_price(user_id, a.id, "150", 7.2, "{}").await.unwrap();

        let summary = repo.summary(user_id).await.unwrap();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.owned_items, 1);
        assert_eq!(summary.sold_items, 1);
        assert_eq!(summary.total_investment, "300");
        assert_eq!(summary.current_value, "410");
        assert_eq!(summary.total_profit_loss, "110");
    }

    #[tokio::test]
    async fn profit_loss_uses_sale_price_once_sold() {
        let db = Database::in_memory().await.unwrap();
        let user_id = seed_user(&db).await;
        let repo = PortfolioRepository::new(db.pool());

        let item = repo.insert(sample_item(user_id, "Dunk Low", "100")).await.unwrap();
        repo.mark_sold(user_id, item.id, "135", None).await.unwrap();
        let sold = repo.get(user_id, item.id).await.unwrap().unwrap();

        assert_eq!(sold.status, "sold");
        assert_eq!(sold.profit_loss(), Some(Decimal::from(35)));
    }
}
