//! Search result scoring — confidence heuristics and profit estimates
//!
//! Confidence starts as field completeness (how much of the listing the
//! marketplace actually returned, in [0,1]) and is then nudged upward by
//! cross-item signals from the whole result batch, capped at 1.0.

use crate::api::Listing;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Number of fields a fully-populated listing carries
const EXPECTED_FIELDS: usize = 7;

/// Sanity range for a plausible listing price, in listing currency
const PRICE_SANE_MIN: Decimal = dec!(1);
const PRICE_SANE_MAX: Decimal = dec!(10000);

/// Fixed resale fee model used for the naive profit estimate
#[derive(Debug, Clone)]
pub struct FeeModel {
    /// Marketplace final-value fee on the sale price
    pub platform_fee_rate: Decimal,
    /// Payment processor percentage fee
    pub payment_fee_rate: Decimal,
    /// Payment processor flat fee per transaction
    pub payment_fee_flat: Decimal,
    /// Flat shipping estimate
    pub shipping_estimate: Decimal,
    /// Assumed sourcing cost as a fraction of the listed price
    /// (midpoint of the 30-50% range)
    pub assumed_purchase_ratio: Decimal,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            platform_fee_rate: dec!(0.10),
            payment_fee_rate: dec!(0.029),
            payment_fee_flat: dec!(0.30),
            shipping_estimate: dec!(8.50),
            assumed_purchase_ratio: dec!(0.40),
        }
    }
}

/// Completeness score over the expected listing fields, always in [0,1].
/// Price only counts when it parses and falls in a sane range alongside a
/// currency code.
pub fn base_confidence(listing: &Listing) -> f64 {
    let mut present = 0usize;

    if !listing.title.is_empty() {
        present += 1;
    }
    if !listing.listing_id.is_empty() {
        present += 1;
    }
    if !listing.item_url.is_empty() {
        present += 1;
    }
    if !listing.image_url.is_empty() {
        present += 1;
    }
    if !listing.currency.is_empty() {
        if let Some(price) = listing.price_decimal() {
            if price >= PRICE_SANE_MIN && price <= PRICE_SANE_MAX {
                present += 1;
            }
        }
    }
    if !listing.location.is_empty() {
        present += 1;
    }
    if !listing.condition.is_empty() {
        present += 1;
    }

    let score = present as f64 / EXPECTED_FIELDS as f64;
    score.clamp(0.0, 1.0)
}

/// Second pass over a whole result batch: adjust each confidence upward with
/// cross-item signals (sample size, price proximity to the batch average,
/// condition quality, US-location heuristic), capped at 1.0.
pub fn refine_confidence(listings: &mut [Listing]) {
    let priced: Vec<Decimal> = listings.iter().filter_map(|l| l.price_decimal()).collect();
    let avg_price = if priced.is_empty() {
        None
    } else {
        Some(priced.iter().copied().sum::<Decimal>() / Decimal::from(priced.len()))
    };

    let sample_bonus = match listings.len() {
        0..=4 => 0.0,
        5..=9 => 0.03,
        _ => 0.05,
    };

    for listing in listings.iter_mut() {
        let mut bonus = sample_bonus;

        if let (Some(price), Some(avg)) = (listing.price_decimal(), avg_price) {
            if !avg.is_zero() {
                let deviation = ((price - avg) / avg).abs().to_f64().unwrap_or(1.0);
                if deviation <= 0.15 {
                    bonus += 0.05;
                } else if deviation <= 0.30 {
                    bonus += 0.02;
                }
            }
        }

        let condition = listing.condition.to_lowercase();
        if matches!(condition.as_str(), "new" | "like new" | "new with tags") {
            bonus += 0.04;
        } else if matches!(condition.as_str(), "excellent" | "very good" | "good") {
            bonus += 0.02;
        }

        let location = listing.location.to_lowercase();
        if location.contains("united states") || location.contains("usa") {
            bonus += 0.03;
        }

        listing.confidence = (listing.confidence + bonus).min(1.0);
    }
}

/// Naive flip-profit estimate against the fee model: sale proceeds minus
/// platform fee, payment fee, shipping and the assumed sourcing cost.
pub fn estimate_profit(list_price: Decimal, model: &FeeModel) -> Decimal {
    let platform_fee = list_price * model.platform_fee_rate;
    let payment_fee = list_price * model.payment_fee_rate + model.payment_fee_flat;
    let purchase_cost = list_price * model.assumed_purchase_ratio;

    (list_price - platform_fee - payment_fee - model.shipping_estimate - purchase_cost)
        .round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_listing() -> Listing {
        Listing {
            title: "iPhone 13 128GB Midnight".to_string(),
            listing_id: "v1|1234567890|0".to_string(),
            item_url: "https://www.ebay.com/itm/1234567890".to_string(),
            image_url: "https://i.ebayimg.com/images/g/abc/s-l225.jpg".to_string(),
            price: "429.99".to_string(),
            currency: "USD".to_string(),
            location: "Austin,TX,USA".to_string(),
            condition: "Used".to_string(),
            confidence: 0.0,
            estimated_profit: None,
        }
    }

    #[test]
    fn full_listing_scores_one() {
        assert_eq!(base_confidence(&full_listing()), 1.0);
    }

    #[test]
    fn empty_listing_scores_zero() {
        let empty = Listing {
            title: String::new(),
            listing_id: String::new(),
            item_url: String::new(),
            image_url: String::new(),
            price: String::new(),
            currency: String::new(),
            location: String::new(),
            condition: String::new(),
            confidence: 0.0,
            estimated_profit: None,
        };
        assert_eq!(base_confidence(&empty), 0.0);
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        // Knock fields out one at a time; the score must stay within [0,1]
        let mut listing = full_listing();
        listing.image_url.clear();
        listing.location.clear();
        let score = base_confidence(&listing);
        assert!((0.0..=1.0).contains(&score));
        assert!((score - 5.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn insane_price_does_not_count() {
        let mut listing = full_listing();
        listing.price = "999999".to_string();
        assert!((base_confidence(&listing) - 6.0 / 7.0).abs() < 1e-9);

        listing.price = "not-a-number".to_string();
        assert!((base_confidence(&listing) - 6.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn refinement_never_exceeds_one() {
        let mut batch: Vec<Listing> = (0..12).map(|_| full_listing()).collect();
        for l in &mut batch {
            l.confidence = base_confidence(l);
        }
        refine_confidence(&mut batch);
        for l in &batch {
            assert!(l.confidence <= 1.0);
            // Identical prices sit on the batch average, so every signal fires
            assert_eq!(l.confidence, 1.0);
        }
    }

    #[test]
    fn refinement_rewards_price_proximity() {
        let mut batch: Vec<Listing> = (0..5).map(|_| full_listing()).collect();
        batch[4].price = "600.00".to_string(); // off the batch average
        for l in &mut batch {
            l.confidence = 0.5;
        }
        refine_confidence(&mut batch);
        assert!(batch[0].confidence > batch[4].confidence);
    }

    #[test]
    fn profit_estimate_matches_fee_model() {
        // 100 - 10 (platform) - 3.20 (payment) - 8.50 (shipping) - 40 (sourcing)
        let profit = estimate_profit(dec!(100), &FeeModel::default());
        assert_eq!(profit, dec!(38.30));
    }

    #[test]
    fn profit_estimate_can_go_negative() {
        let profit = estimate_profit(dec!(10), &FeeModel::default());
        assert!(profit < Decimal::ZERO);
    }
}
