//! Deterministic demo catalogue used by `qcd-cli seed`.
//!
//! Mirrors the product/platform templates from the original dummy-data
//! generator, minus its randomisation — the CLI's `price-cycle` subcommand
//! is what introduces variation once the catalogue exists.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::catalog::{upsert_platform, upsert_product};
use crate::pricing::get_current_price;
use crate::DbError;

struct SeedProduct {
    name: &'static str,
    category: &'static str,
    unit: &'static str,
    base_price: i64,
}

const SEED_PLATFORMS: [(&str, &str); 4] = [
    ("Blinkit", "blinkit"),
    ("Zepto", "zepto"),
    ("Instamart", "instamart"),
    ("BigBasket", "bigbasket"),
];

const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct { name: "Bananas", category: "fruits", unit: "dozen", base_price: 40 },
    SeedProduct { name: "Apples", category: "fruits", unit: "kg", base_price: 120 },
    SeedProduct { name: "Onions", category: "vegetables", unit: "kg", base_price: 30 },
    SeedProduct { name: "Tomatoes", category: "vegetables", unit: "kg", base_price: 40 },
    SeedProduct { name: "Milk", category: "dairy", unit: "1L", base_price: 60 },
    SeedProduct { name: "Paneer", category: "dairy", unit: "200g", base_price: 80 },
    SeedProduct { name: "Chips", category: "snacks", unit: "pack", base_price: 20 },
    SeedProduct { name: "Chocolate", category: "snacks", unit: "pack", base_price: 40 },
    SeedProduct { name: "Rice", category: "staples", unit: "kg", base_price: 50 },
    SeedProduct { name: "Cooking Oil", category: "staples", unit: "1L", base_price: 120 },
];

/// Category volatility factors the price update engine uses to scale how
/// much a product's price is allowed to drift per tick. Seeded here too so
/// operators inspecting the catalogue see the same numbers the engine uses.
#[must_use]
pub fn category_volatility(category: &str) -> f64 {
    match category {
        "fruits" | "vegetables" => 0.8,
        "dairy" => 0.3,
        "snacks" => 0.2,
        "staples" => 0.1,
        _ => 0.5,
    }
}

/// Populates `platforms`, `products`, and an initial `current_prices` row
/// per `(product, platform)` pair, skipping pairs that already exist.
///
/// Returns `(platforms_created, products_created, prices_created)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails.
pub async fn seed_demo_catalog(pool: &PgPool) -> Result<(usize, usize, usize), DbError> {
    let mut platform_ids = Vec::with_capacity(SEED_PLATFORMS.len());
    for (name, slug) in SEED_PLATFORMS {
        platform_ids.push(upsert_platform(pool, name, slug).await?);
    }

    let mut product_ids = Vec::with_capacity(SEED_PRODUCTS.len());
    for product in SEED_PRODUCTS {
        product_ids.push(upsert_product(pool, product.name, product.category, product.unit).await?);
    }

    let mut prices_created = 0usize;
    for (product, product_id) in SEED_PRODUCTS.iter().zip(&product_ids) {
        for platform_id in &platform_ids {
            if get_current_price(pool, *product_id, *platform_id)
                .await?
                .is_some()
            {
                continue;
            }
            sqlx::query(
                "INSERT INTO current_prices (product_id, platform_id, price, stock_status) \
                 VALUES ($1, $2, $3, 'in_stock')",
            )
            .bind(product_id)
            .bind(platform_id)
            .bind(Decimal::from(product.base_price))
            .execute(pool)
            .await?;
            prices_created += 1;
        }
    }

    Ok((platform_ids.len(), product_ids.len(), prices_created))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_volatility_matches_known_categories() {
        assert!((category_volatility("fruits") - 0.8).abs() < f64::EPSILON);
        assert!((category_volatility("dairy") - 0.3).abs() < f64::EPSILON);
        assert!((category_volatility("snacks") - 0.2).abs() < f64::EPSILON);
        assert!((category_volatility("staples") - 0.1).abs() < f64::EPSILON);
        assert!((category_volatility("unknown") - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn seed_tables_are_nonempty() {
        assert_eq!(SEED_PLATFORMS.len(), 4);
        assert!(!SEED_PRODUCTS.is_empty());
    }
}
