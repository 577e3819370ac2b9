//! Pure market-simulation math: how far a price is allowed to drift on one
//! tick, and whether that tick also rolls a discount or a surge. Nothing in
//! this module touches the database — it takes a price in, an `Rng` in, and
//! returns the decision, so it can be tested without a pool.

use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use qcd_core::{AppConfig, ChangeType};

/// The subset of [`AppConfig`] the simulator needs, so test code doesn't
/// have to build a whole `AppConfig` to exercise it.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub max_change_percent: f64,
    pub discount_probability: f64,
    pub surge_probability: f64,
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        EngineConfig {
            max_change_percent: config.price_update_max_change_percent,
            discount_probability: config.price_update_discount_probability,
            surge_probability: config.price_update_surge_probability,
        }
    }
}

/// The outcome of simulating one price mutation.
#[derive(Debug, Clone)]
pub struct PriceChange {
    pub new_price: Decimal,
    /// The pre-discount/pre-surge price, recorded only when one of those
    /// applied — `None` on an ordinary drift.
    pub original_price: Option<Decimal>,
    pub discount_percentage: Option<i32>,
    pub is_surge: bool,
    pub change_type: ChangeType,
    pub change_amount: Decimal,
    pub change_percentage: f64,
}

/// Time-of-day bias applied on top of the category drift: a small upward
/// nudge during the morning and evening rush, a small downward one late at
/// night, and none otherwise. Mirrors the three named windows the original
/// simulator used.
fn time_adjustment(hour: u32, rng: &mut impl Rng) -> f64 {
    const MORNING_RUSH: f64 = 0.02;
    const EVENING_RUSH: f64 = 0.02;
    const LATE_NIGHT: f64 = -0.01;

    if (7..=9).contains(&hour) {
        rng.random_range(0.0..=MORNING_RUSH)
    } else if (18..=20).contains(&hour) {
        rng.random_range(0.0..=EVENING_RUSH)
    } else if hour >= 23 || hour <= 6 {
        rng.random_range(LATE_NIGHT..=0.0)
    } else {
        0.0
    }
}

/// Rolls a discount, a surge, or neither on top of `base_price`. At most one
/// applies per tick — discount is checked first, so a product can't roll
/// both in the same cycle.
fn roll_discount_or_surge(
    base_price: Decimal,
    config: EngineConfig,
    rng: &mut impl Rng,
) -> (Decimal, Option<Decimal>, Option<i32>, bool) {
    if rng.random::<f64>() < config.discount_probability {
        let discount_percentage = rng.random_range(5..=30);
        let fraction = Decimal::from(discount_percentage) / Decimal::from(100);
        let final_price = (base_price * (Decimal::ONE - fraction)).round_dp(2);
        return (final_price, Some(base_price), Some(discount_percentage), false);
    }

    if rng.random::<f64>() < config.surge_probability {
        let multiplier = rng.random_range(1.2..=1.8);
        let final_price =
            (base_price * Decimal::try_from(multiplier).unwrap_or(Decimal::ONE)).round_dp(2);
        // Surge, no discount: original_price stays unset so a surged row never
        // looks like it satisfies `price <= original_price` by coincidence.
        return (final_price, None, None, true);
    }

    (base_price, None, None, false)
}

/// Simulates the next price for `current_price`, a product in `category`,
/// at wall-clock `now`. `volatility` scales how much of `max_change_percent`
/// this category is allowed to use — pass [`qcd_db::seed::category_volatility`].
#[must_use]
pub fn calculate_price_change(
    current_price: Decimal,
    volatility: f64,
    config: EngineConfig,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> PriceChange {
    let max_change = config.max_change_percent * volatility / 100.0;
    let mut change_fraction = rng.random_range(-max_change..=max_change);
    change_fraction += time_adjustment(now.hour(), rng);

    let drifted = current_price
        * (Decimal::ONE + Decimal::try_from(change_fraction).unwrap_or(Decimal::ZERO));
    let min_price = Decimal::new(500, 2);
    let mut new_price = drifted.round_dp(2);
    if new_price < min_price {
        new_price = min_price;
    }

    let change_type = ChangeType::classify(current_price, new_price);
    let change_amount = match change_type {
        ChangeType::Increase => new_price - current_price,
        ChangeType::Decrease => current_price - new_price,
        ChangeType::NoChange => Decimal::ZERO,
    };

    let (final_price, original_price, discount_percentage, is_surge) =
        roll_discount_or_surge(new_price, config, rng);

    PriceChange {
        new_price: final_price,
        original_price,
        discount_percentage,
        is_surge,
        change_type,
        change_amount,
        change_percentage: change_fraction.abs() * 100.0,
    }
}

/// Rolls whether this tick also flips stock status (~5% chance), picking a
/// uniformly random member of [`qcd_core::StockStatus::all`] when it does.
#[must_use]
pub fn maybe_flip_stock_status(current: &str, rng: &mut impl Rng) -> String {
    const FLIP_PROBABILITY: f64 = 0.05;
    if rng.random::<f64>() >= FLIP_PROBABILITY {
        return current.to_string();
    }
    let options = qcd_core::StockStatus::all();
    let idx = rng.random_range(0..options.len());
    options[idx].as_str().to_string()
}

#[must_use]
pub fn price_f64(price: Decimal) -> f64 {
    price.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> EngineConfig {
        EngineConfig { max_change_percent: 15.0, discount_probability: 0.0, surge_probability: 0.0 }
    }

    fn noon() -> DateTime<Utc> {
        "2026-07-27T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn price_never_drops_below_floor() {
        let mut rng = StdRng::seed_from_u64(1);
        let change = calculate_price_change(Decimal::new(550, 2), 0.8, config(), noon(), &mut rng);
        assert!(change.new_price >= Decimal::new(500, 2));
    }

    #[test]
    fn zero_volatility_never_moves_the_price() {
        let mut rng = StdRng::seed_from_u64(7);
        let change = calculate_price_change(Decimal::new(10000, 2), 0.0, config(), noon(), &mut rng);
        assert_eq!(change.change_type, ChangeType::NoChange);
        assert_eq!(change.new_price, Decimal::new(10000, 2));
    }

    #[test]
    fn discount_roll_records_original_price() {
        let mut rng = StdRng::seed_from_u64(3);
        let forced = EngineConfig { discount_probability: 1.0, ..config() };
        let change = calculate_price_change(Decimal::new(10000, 2), 0.5, forced, noon(), &mut rng);
        assert!(change.discount_percentage.is_some());
        assert!(change.original_price.is_some());
        assert!(!change.is_surge);
        assert!(change.new_price < change.original_price.unwrap());
    }

    #[test]
    fn surge_roll_increases_price_and_leaves_original_price_unset() {
        let mut rng = StdRng::seed_from_u64(11);
        let forced =
            EngineConfig { discount_probability: 0.0, surge_probability: 1.0, ..config() };
        let pre_surge = Decimal::new(10000, 2);
        let change = calculate_price_change(pre_surge, 0.5, forced, noon(), &mut rng);
        assert!(change.is_surge);
        assert!(change.original_price.is_none());
        assert!(change.new_price > pre_surge);
    }

    #[test]
    fn stock_status_flip_is_bounded_to_known_values() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let flipped = maybe_flip_stock_status("in_stock", &mut rng);
            assert!(qcd_core::StockStatus::from_str(&flipped).is_some());
        }
    }
}
