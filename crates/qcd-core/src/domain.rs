//! Shared domain vocabulary: platforms, stock status, and price-history
//! change classification. Row-shaped types for the tables that back these
//! live in `qcd-db` (the persistence crate owns `#[derive(sqlx::FromRow)]`).

/// The quick-commerce platforms this service tracks. Stable short names used
/// as the natural key for `platforms.name` and throughout request validation.
pub const KNOWN_PLATFORMS: [&str; 4] = ["Blinkit", "Zepto", "Instamart", "BigBasket"];

/// Stock status recorded on `current_prices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_stock" => Some(StockStatus::InStock),
            "low_stock" => Some(StockStatus::LowStock),
            "out_of_stock" => Some(StockStatus::OutOfStock),
            _ => None,
        }
    }

    /// The three values in their canonical draw order, for `rand`-driven
    /// stock-status randomisation in the price update engine.
    #[must_use]
    pub fn all() -> [StockStatus; 3] {
        [
            StockStatus::InStock,
            StockStatus::LowStock,
            StockStatus::OutOfStock,
        ]
    }
}

/// Classification of a single `current_prices` mutation, recorded on the
/// corresponding `price_history` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Increase,
    Decrease,
    NoChange,
}

impl ChangeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Increase => "increase",
            ChangeType::Decrease => "decrease",
            ChangeType::NoChange => "no_change",
        }
    }

    /// Classify a price mutation by comparing the new price to the old one.
    #[must_use]
    pub fn classify(old_price: rust_decimal::Decimal, new_price: rust_decimal::Decimal) -> Self {
        use std::cmp::Ordering;
        match new_price.cmp(&old_price) {
            Ordering::Greater => ChangeType::Increase,
            Ordering::Less => ChangeType::Decrease,
            Ordering::Equal => ChangeType::NoChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn classify_detects_increase_decrease_no_change() {
        assert_eq!(
            ChangeType::classify(Decimal::new(100, 2), Decimal::new(150, 2)),
            ChangeType::Increase
        );
        assert_eq!(
            ChangeType::classify(Decimal::new(150, 2), Decimal::new(100, 2)),
            ChangeType::Decrease
        );
        assert_eq!(
            ChangeType::classify(Decimal::new(100, 2), Decimal::new(100, 2)),
            ChangeType::NoChange
        );
    }

    #[test]
    fn stock_status_round_trips_through_str() {
        for status in StockStatus::all() {
            assert_eq!(StockStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn known_platforms_matches_spec_set() {
        assert_eq!(KNOWN_PLATFORMS, ["Blinkit", "Zepto", "Instamart", "BigBasket"]);
    }
}
