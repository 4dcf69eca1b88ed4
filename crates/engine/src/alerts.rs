//! Price alert evaluation

use persistence::repository::PriceAlertRecord;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Supported alert kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Fires when the price falls to or below a fixed threshold
    Threshold,
    /// Fires when the price drops by a percentage from the baseline
    PriceDrop,
    /// Fires when the price rises by a percentage from the baseline
    PriceIncrease,
}

impl AlertKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "threshold" => Some(AlertKind::Threshold),
            "price_drop" => Some(AlertKind::PriceDrop),
            "price_increase" => Some(AlertKind::PriceIncrease),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Threshold => "threshold",
            AlertKind::PriceDrop => "price_drop",
            AlertKind::PriceIncrease => "price_increase",
        }
    }

    /// Percentage kinds need both a baseline price and a percentage change
    /// to be evaluable
    pub fn requires_percentage(&self) -> bool {
        matches!(self, AlertKind::PriceDrop | AlertKind::PriceIncrease)
    }
}

fn decimal_field(value: Option<&str>) -> Option<Decimal> {
    value.and_then(|v| Decimal::from_str(v).ok())
}

/// Check whether an alert's condition is met at the given price. Inactive
/// alerts and alerts missing the fields their kind needs never fire.
pub fn alert_triggered(alert: &PriceAlertRecord, current_price: Decimal) -> bool {
    if !alert.is_active {
        return false;
    }

    let Some(kind) = AlertKind::parse(&alert.alert_type) else {
        return false;
    };

    match kind {
        AlertKind::Threshold => match decimal_field(alert.threshold_price.as_deref()) {
            Some(threshold) => current_price <= threshold,
            None => false,
        },
        AlertKind::PriceDrop => {
            match (decimal_field(alert.baseline_price.as_deref()), alert.percentage_change) {
                (Some(baseline), Some(pct)) => {
                    let drop_to = baseline
                        * (Decimal::ONE
                            - Decimal::try_from(pct / 100.0).unwrap_or(Decimal::ZERO));
                    current_price <= drop_to
                }
                _ => false,
            }
        }
        AlertKind::PriceIncrease => {
            match (decimal_field(alert.baseline_price.as_deref()), alert.percentage_change) {
                (Some(baseline), Some(pct)) => {
                    let rise_to = baseline
                        * (Decimal::ONE
                            + Decimal::try_from(pct / 100.0).unwrap_or(Decimal::ZERO));
                    current_price >= rise_to
                }
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn alert(alert_type: &str) -> PriceAlertRecord {
        PriceAlertRecord {
            id: 1,
            user_id: 1,
            item_identifier: "iphone 13".to_string(),
            platform: None,
            condition: None,
            alert_type: alert_type.to_string(),
            threshold_price: None,
            percentage_change: None,
            is_active: true,
            notification_method: "email".to_string(),
            baseline_price: None,
            last_checked_price: None,
            last_triggered: None,
            trigger_count: 0,
            notes: None,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn threshold_fires_at_or_below() {
        let mut a = alert("threshold");
        a.threshold_price = Some("300".to_string());
        assert!(alert_triggered(&a, dec!(300)));
        assert!(alert_triggered(&a, dec!(250)));
        assert!(!alert_triggered(&a, dec!(301)));
    }

    #[test]
    fn price_drop_needs_baseline_and_percentage() {
        let mut a = alert("price_drop");
        a.percentage_change = Some(10.0);
        // No baseline: never fires
        assert!(!alert_triggered(&a, dec!(1)));

        a.baseline_price = Some("200".to_string());
        assert!(alert_triggered(&a, dec!(180)));
        assert!(!alert_triggered(&a, dec!(185)));
    }

    #[test]
    fn price_increase_fires_above_baseline() {
        let mut a = alert("price_increase");
        a.baseline_price = Some("200".to_string());
        a.percentage_change = Some(25.0);
        assert!(alert_triggered(&a, dec!(250)));
        assert!(!alert_triggered(&a, dec!(249)));
    }

    #[test]
    fn inactive_alerts_never_fire() {
        let mut a = alert("threshold");
        a.threshold_price = Some("300".to_string());
        a.is_active = false;
        assert!(!alert_triggered(&a, dec!(100)));
    }

    #[test]
    fn unknown_kind_never_fires() {
        let a = alert("lunar_phase");
        assert!(!alert_triggered(&a, dec!(100)));
    }
}
