use sqlx::{PgPool, Row};
use std::collections::HashMap;

use crate::models::{Locality, PropertyType, RentByType, SourceKind};
use crate::services::sources::{MetricPatch, MetricSource, SourceError, SourceFuture};

/// Commute trips assumed per month (two a day)
pub const DEFAULT_TRIPS_PER_MONTH: u32 = 60;

/// Monthly grocery basket for one person: (item name, quantity)
pub const DEFAULT_BASKET: &[(&str, f64)] = &[
    ("Rice", 10.0),
    ("Wheat", 10.0),
    ("Milk", 30.0),
    ("Eggs", 30.0),
    ("Onion", 5.0),
    ("Potato", 5.0),
    ("Tomato", 5.0),
    ("Cooking Oil", 2.0),
];

/// Average listed rent per property type
pub struct RentSource {
    pool: PgPool,
}

impl RentSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_rent(&self, locality: &Locality) -> Result<MetricPatch, SourceError> {
        let query = r#"
            SELECT property_type, AVG(rent_amount)::float8 AS avg_rent
            FROM rent_listings
            WHERE locality_id = $1
            GROUP BY property_type
        "#;

        let rows = sqlx::query(query).bind(locality.id).fetch_all(&self.pool).await?;

        let mut rent = RentByType::default();
        for row in &rows {
            let property_type: String = row.try_get("property_type")?;
            let avg_rent: Option<f64> = row.try_get("avg_rent")?;
            match property_type.parse::<PropertyType>() {
                Ok(pt) => rent.set(pt, avg_rent),
                Err(e) => tracing::debug!("Skipping rent listings for locality {}: {}", locality.id, e),
            }
        }

        Ok(MetricPatch::Rent(rent))
    }
}

impl MetricSource for RentSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Rent
    }

    fn fetch<'a>(&'a self, locality: &'a Locality) -> SourceFuture<'a> {
        Box::pin(self.fetch_rent(locality))
    }
}

/// Cost of a basket at the latest recorded prices
///
/// Items without a price are skipped; `None` when no item is priced.
pub fn basket_cost(prices: &HashMap<String, f64>, basket: &[(String, f64)]) -> Option<f64> {
    let priced: Vec<f64> = basket
        .iter()
        .filter_map(|(item, quantity)| {
            prices
                .get(&item.to_lowercase())
                .filter(|p| p.is_finite() && **p >= 0.0)
                .map(|price| price * quantity)
        })
        .collect();

    if priced.is_empty() {
        None
    } else {
        Some(priced.iter().sum())
    }
}

/// Per-person grocery basket cost from the latest scraped prices
pub struct GrocerySource {
    pool: PgPool,
    basket: Vec<(String, f64)>,
}

impl GrocerySource {
    pub fn new(pool: PgPool) -> Self {
        Self::with_basket(
            pool,
            DEFAULT_BASKET
                .iter()
                .map(|(item, quantity)| (item.to_string(), *quantity))
                .collect(),
        )
    }

    pub fn with_basket(pool: PgPool, basket: Vec<(String, f64)>) -> Self {
        Self { pool, basket }
    }

    async fn fetch_grocery(&self, locality: &Locality) -> Result<MetricPatch, SourceError> {
        let query = r#"
            SELECT DISTINCT ON (LOWER(item_name)) LOWER(item_name) AS item, price::float8 AS price
            FROM grocery_prices
            WHERE locality_id = $1
            ORDER BY LOWER(item_name), recorded_at DESC
        "#;

        let rows = sqlx::query(query).bind(locality.id).fetch_all(&self.pool).await?;

        let mut prices = HashMap::with_capacity(rows.len());
        for row in &rows {
            prices.insert(row.try_get::<String, _>("item")?, row.try_get::<f64, _>("price")?);
        }

        Ok(MetricPatch::Grocery(basket_cost(&prices, &self.basket)))
    }
}

impl MetricSource for GrocerySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Grocery
    }

    fn fetch<'a>(&'a self, locality: &'a Locality) -> SourceFuture<'a> {
        Box::pin(self.fetch_grocery(locality))
    }
}

/// Monthly commute cost from the city's current regular fare
pub struct TransportSource {
    pool: PgPool,
    trips_per_month: u32,
}

impl TransportSource {
    pub fn new(pool: PgPool, trips_per_month: u32) -> Self {
        Self {
            pool,
            trips_per_month,
        }
    }

    async fn fetch_transport(&self, locality: &Locality) -> Result<MetricPatch, SourceError> {
        let query = r#"
            SELECT fare_amount::float8 AS fare_amount
            FROM transport_fares
            WHERE LOWER(city) = LOWER($1) AND fare_type = 'Regular'
            ORDER BY effective_from DESC
            LIMIT 1
        "#;

        let row = sqlx::query(query)
            .bind(locality.city.trim())
            .fetch_optional(&self.pool)
            .await?;

        let fare: Option<f64> = row.map(|r| r.try_get("fare_amount")).transpose()?;
        Ok(MetricPatch::Transport(
            fare.map(|f| f * self.trips_per_month as f64),
        ))
    }
}

impl MetricSource for TransportSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Transport
    }

    fn fetch<'a>(&'a self, locality: &'a Locality) -> SourceFuture<'a> {
        Box::pin(self.fetch_transport(locality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basket() -> Vec<(String, f64)> {
        DEFAULT_BASKET
            .iter()
            .map(|(item, quantity)| (item.to_string(), *quantity))
            .collect()
    }

    #[test]
    fn test_basket_cost_sums_priced_items() {
        let prices = HashMap::from([
            ("rice".to_string(), 50.0),
            ("milk".to_string(), 60.0),
        ]);
        // 10 × 50 + 30 × 60
        assert_eq!(basket_cost(&prices, &basket()), Some(2300.0));
    }

    #[test]
    fn test_basket_cost_unknown_without_prices() {
        assert_eq!(basket_cost(&HashMap::new(), &basket()), None);
    }
}
