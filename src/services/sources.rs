use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::models::{
    AmenityCounts, DeliveryServices, Locality, RawMetrics, RentByType, RestaurantStats,
    SourceKind,
};

/// Errors that can occur while fetching one metric for one locality
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Locality {0} has no coordinates")]
    MissingCoordinates(i64),
}

/// The slice of [`RawMetrics`] a single source is responsible for
#[derive(Debug, Clone, PartialEq)]
pub enum MetricPatch {
    Rent(RentByType),
    /// Monthly basket cost per person; `None` when no prices are recorded
    Grocery(Option<f64>),
    /// Monthly commute cost; `None` when no fare is recorded
    Transport(Option<f64>),
    Aqi(f64),
    Restaurants(RestaurantStats),
    Amenities {
        counts: AmenityCounts,
        grocery_stores_count: u32,
    },
    Delivery(DeliveryServices),
}

impl MetricPatch {
    pub fn kind(&self) -> SourceKind {
        match self {
            MetricPatch::Rent(_) => SourceKind::Rent,
            MetricPatch::Grocery(_) => SourceKind::Grocery,
            MetricPatch::Transport(_) => SourceKind::Transport,
            MetricPatch::Aqi(_) => SourceKind::Aqi,
            MetricPatch::Restaurants(_) => SourceKind::Restaurants,
            MetricPatch::Amenities { .. } => SourceKind::Amenities,
            MetricPatch::Delivery(_) => SourceKind::Delivery,
        }
    }

    pub fn apply(self, metrics: &mut RawMetrics) {
        match self {
            MetricPatch::Rent(rent) => metrics.rent = rent,
            MetricPatch::Grocery(cost) => metrics.grocery_cost_per_person = cost,
            MetricPatch::Transport(cost) => metrics.transport_cost_monthly = cost,
            MetricPatch::Aqi(aqi) => metrics.aqi = Some(aqi),
            MetricPatch::Restaurants(stats) => metrics.restaurants = Some(stats),
            MetricPatch::Amenities {
                counts,
                grocery_stores_count,
            } => {
                metrics.amenities = Some(counts);
                metrics.grocery_stores_count = Some(grocery_stores_count);
            }
            MetricPatch::Delivery(delivery) => metrics.delivery = Some(delivery),
        }
    }
}

pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<MetricPatch, SourceError>> + Send + 'a>>;

/// One independent data feed
pub trait MetricSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn fetch<'a>(&'a self, locality: &'a Locality) -> SourceFuture<'a>;
}

/// Delivery availability from configured per-service city coverage
///
/// A `*` entry covers every city.
#[derive(Debug, Clone)]
pub struct DeliveryCoverageSource {
    blinkit: Vec<String>,
    zomato: Vec<String>,
    swiggy: Vec<String>,
}

impl DeliveryCoverageSource {
    pub fn new(blinkit: Vec<String>, zomato: Vec<String>, swiggy: Vec<String>) -> Self {
        Self {
            blinkit,
            zomato,
            swiggy,
        }
    }

    pub fn coverage(&self, city: &str) -> DeliveryServices {
        let covers = |cities: &[String]| {
            cities
                .iter()
                .any(|c| c == "*" || c.trim().eq_ignore_ascii_case(city.trim()))
        };
        DeliveryServices {
            blinkit: covers(&self.blinkit),
            zomato: covers(&self.zomato),
            swiggy: covers(&self.swiggy),
        }
    }
}

impl MetricSource for DeliveryCoverageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Delivery
    }

    fn fetch<'a>(&'a self, locality: &'a Locality) -> SourceFuture<'a> {
        Box::pin(async move { Ok(MetricPatch::Delivery(self.coverage(&locality.city))) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> DeliveryCoverageSource {
        DeliveryCoverageSource::new(
            vec!["Mumbai".to_string(), "Bhopal".to_string()],
            vec!["*".to_string()],
            vec![],
        )
    }

    #[test]
    fn test_delivery_coverage() {
        let coverage = source().coverage("bhopal");
        assert!(coverage.blinkit);
        assert!(coverage.zomato);
        assert!(!coverage.swiggy);

        let small_town = source().coverage("Sehore");
        assert_eq!(small_town.available_count(), 1);
    }

    #[test]
    fn test_amenities_patch_sets_store_count() {
        let mut metrics = RawMetrics::default();
        let patch = MetricPatch::Amenities {
            counts: AmenityCounts {
                hospitals: 2,
                ..Default::default()
            },
            grocery_stores_count: 9,
        };
        assert_eq!(patch.kind(), SourceKind::Amenities);

        patch.apply(&mut metrics);
        assert_eq!(metrics.grocery_stores_count, Some(9));
        assert_eq!(metrics.amenities.map(|a| a.hospitals), Some(2));
    }

    #[tokio::test]
    async fn test_delivery_source_fetch() {
        let locality = Locality {
            id: 1,
            name: "MP Nagar".to_string(),
            city: "Mumbai".to_string(),
            latitude: None,
            longitude: None,
            distance_to_center_km: None,
        };
        let patch = source().fetch(&locality).await.unwrap();
        assert_eq!(patch.kind(), SourceKind::Delivery);
    }
}
