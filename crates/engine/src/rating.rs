//! FlipLens rating — 0-10 score for portfolio items
//!
//! Fixed-weight heuristic over five factors. Demand and stability are flat
//! placeholders until real market feeds exist; profit potential reacts to the
//! spread between purchase price and current market price.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat demand score until search-volume data is wired in
const MARKET_DEMAND_SCORE: f64 = 7.5;
/// Flat volatility score (10 = very stable)
const PRICE_STABILITY_SCORE: f64 = 6.0;
/// Neutral factor score when no signal is available
const NEUTRAL_SCORE: f64 = 5.0;

/// Per-factor breakdown stored alongside the rating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingFactors {
    pub market_demand: f64,
    pub price_stability: f64,
    pub profit_potential: f64,
    pub condition: f64,
    pub brand_value: f64,
}

/// Inputs the rating draws on
#[derive(Debug, Clone)]
pub struct RatingInput<'a> {
    pub condition: &'a str,
    pub brand: Option<&'a str>,
    pub purchase_price: Option<Decimal>,
    pub current_market_price: Option<Decimal>,
}

fn condition_score(condition: &str) -> f64 {
    match condition.to_lowercase().as_str() {
        "new" => 10.0,
        "excellent" => 8.0,
        "very good" => 7.0,
        "good" => 6.0,
        "fair" => 4.0,
        "poor" => 2.0,
        _ => NEUTRAL_SCORE,
    }
}

fn brand_score(brand: Option<&str>) -> f64 {
    match brand.map(|b| b.to_lowercase()).as_deref() {
        Some("supreme") | Some("louis vuitton") => 10.0,
        Some("nike") | Some("gucci") => 9.0,
        Some("adidas") | Some("prada") => 8.0,
        _ => NEUTRAL_SCORE,
    }
}

/// Profit margin mapped so a 50% margin earns the full 10 points
fn profit_potential_score(purchase: Option<Decimal>, market: Option<Decimal>) -> f64 {
    match (purchase, market) {
        (Some(purchase), Some(market)) if !purchase.is_zero() => {
            let margin = ((market - purchase) / purchase).to_f64().unwrap_or(0.0);
            (margin * 20.0).clamp(0.0, 10.0)
        }
        _ => NEUTRAL_SCORE,
    }
}

/// Compute the 0-10 rating and its factor breakdown
pub fn flip_rating(input: &RatingInput<'_>) -> (f64, RatingFactors) {
    let factors = RatingFactors {
        market_demand: MARKET_DEMAND_SCORE,
        price_stability: PRICE_STABILITY_SCORE,
        profit_potential: profit_potential_score(
            input.purchase_price,
            input.current_market_price,
        ),
        condition: condition_score(input.condition),
        brand_value: brand_score(input.brand),
    };

    let total = factors.market_demand
        + factors.price_stability
        + factors.profit_potential
        + factors.condition
        + factors.brand_value;

    // Five factors of 10 points each, rescaled to 0-10 and rounded to one
    // decimal place
    let rating = ((total / 50.0) * 10.0 * 10.0).round() / 10.0;
    (rating, factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rating_stays_in_range() {
        let (best, _) = flip_rating(&RatingInput {
            condition: "new",
            brand: Some("Supreme"),
            purchase_price: Some(dec!(100)),
            current_market_price: Some(dec!(300)),
        });
        assert!(best <= 10.0);

        let (worst, _) = flip_rating(&RatingInput {
            condition: "poor",
            brand: None,
            purchase_price: Some(dec!(100)),
            current_market_price: Some(dec!(50)),
        });
        assert!(worst >= 0.0);
        assert!(worst < best);
    }

    #[test]
    fn fifty_percent_margin_maxes_profit_factor() {
        let (_, factors) = flip_rating(&RatingInput {
            condition: "good",
            brand: None,
            purchase_price: Some(dec!(100)),
            current_market_price: Some(dec!(150)),
        });
        assert_eq!(factors.profit_potential, 10.0);
    }

    #[test]
    fn missing_market_price_is_neutral() {
        let (_, factors) = flip_rating(&RatingInput {
            condition: "good",
            brand: None,
            purchase_price: Some(dec!(100)),
            current_market_price: None,
        });
        assert_eq!(factors.profit_potential, NEUTRAL_SCORE);
    }

    #[test]
    fn known_brand_outscores_unknown() {
        let known = flip_rating(&RatingInput {
            condition: "good",
            brand: Some("nike"),
            purchase_price: None,
            current_market_price: None,
        })
        .0;
        let unknown = flip_rating(&RatingInput {
            condition: "good",
            brand: Some("acme"),
            purchase_price: None,
            current_market_price: None,
        })
        .0;
        assert!(known > unknown);
    }

    #[test]
    fn baseline_rating_value() {
        // 7.5 + 6.0 + 10.0 + 6.0 + 9.0 = 38.5 of 50 -> 7.7
        let (rating, _) = flip_rating(&RatingInput {
            condition: "good",
            brand: Some("nike"),
            purchase_price: Some(dec!(100)),
            current_market_price: Some(dec!(150)),
        });
        assert_eq!(rating, 7.7);
    }
}
