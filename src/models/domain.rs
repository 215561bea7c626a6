use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::factors::FactorMap;

/// Property size descriptor (bedroom-hall-kitchen count)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "1BHK")]
    OneBhk,
    #[default]
    #[serde(rename = "2BHK")]
    TwoBhk,
    #[serde(rename = "3BHK")]
    ThreeBhk,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::OneBhk => "1BHK",
            PropertyType::TwoBhk => "2BHK",
            PropertyType::ThreeBhk => "3BHK",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1BHK" => Ok(PropertyType::OneBhk),
            "2BHK" => Ok(PropertyType::TwoBhk),
            "3BHK" => Ok(PropertyType::ThreeBhk),
            other => Err(format!(
                "unknown property type '{}' (expected 1BHK, 2BHK or 3BHK)",
                other
            )),
        }
    }
}

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A named sub-area of a city, as registered with the metrics store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub id: i64,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Distance to the city center, when the collaborator supplies it
    #[serde(default)]
    pub distance_to_center_km: Option<f64>,
}

impl Locality {
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        }
    }
}

/// Independent data feeds that contribute to a neighborhood's raw metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rent,
    Grocery,
    Transport,
    Aqi,
    Restaurants,
    Amenities,
    Delivery,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Rent => "rent",
            SourceKind::Grocery => "grocery",
            SourceKind::Transport => "transport",
            SourceKind::Aqi => "aqi",
            SourceKind::Restaurants => "restaurants",
            SourceKind::Amenities => "amenities",
            SourceKind::Delivery => "delivery",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Average monthly rent by property type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RentByType {
    #[serde(rename = "1BHK", default)]
    pub one_bhk: Option<f64>,
    #[serde(rename = "2BHK", default)]
    pub two_bhk: Option<f64>,
    #[serde(rename = "3BHK", default)]
    pub three_bhk: Option<f64>,
}

impl RentByType {
    pub fn get(&self, property_type: PropertyType) -> Option<f64> {
        match property_type {
            PropertyType::OneBhk => self.one_bhk,
            PropertyType::TwoBhk => self.two_bhk,
            PropertyType::ThreeBhk => self.three_bhk,
        }
    }

    pub fn set(&mut self, property_type: PropertyType, value: Option<f64>) {
        match property_type {
            PropertyType::OneBhk => self.one_bhk = value,
            PropertyType::TwoBhk => self.two_bhk = value,
            PropertyType::ThreeBhk => self.three_bhk = value,
        }
    }
}

/// Delivery-service availability flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryServices {
    pub blinkit: bool,
    pub zomato: bool,
    pub swiggy: bool,
}

impl DeliveryServices {
    pub fn available_count(&self) -> u32 {
        [self.blinkit, self.zomato, self.swiggy]
            .iter()
            .filter(|available| **available)
            .count() as u32
    }
}

/// Restaurant aggregates used as the hygiene indicator
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RestaurantStats {
    pub avg_rating: Option<f64>,
    pub restaurants_count: u32,
    /// Restaurants rated 4 stars or more
    pub highly_rated_count: u32,
}

/// Nearby amenity counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmenityCounts {
    pub hospitals: u32,
    pub schools: u32,
    pub parks: u32,
    pub malls: u32,
    #[serde(default)]
    pub metro_stations: u32,
    #[serde(default)]
    pub bus_stops: u32,
}

impl AmenityCounts {
    /// Amenities score on a 0-10 scale. Each category contributes at most 2 points.
    pub fn score(&self, restaurants_count: u32) -> f64 {
        let capped = |count: u32, per_item: f64| (count as f64 * per_item).min(2.0);
        let score = capped(self.hospitals, 0.5)
            + capped(self.schools, 0.2)
            + capped(self.parks, 0.3)
            + capped(self.malls, 1.0)
            + capped(restaurants_count, 0.1);
        score.min(10.0)
    }
}

/// Raw per-neighborhood metrics as last aggregated
///
/// Every field is optional: a failed or missing feed leaves the value unknown
/// rather than defaulting it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    #[serde(default)]
    pub rent: RentByType,
    /// Monthly grocery basket cost for one person
    #[serde(default)]
    pub grocery_cost_per_person: Option<f64>,
    #[serde(default)]
    pub grocery_stores_count: Option<u32>,
    /// Monthly commute cost
    #[serde(default)]
    pub transport_cost_monthly: Option<f64>,
    #[serde(default)]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub restaurants: Option<RestaurantStats>,
    #[serde(default)]
    pub amenities: Option<AmenityCounts>,
    #[serde(default)]
    pub amenities_score: Option<f64>,
    #[serde(default)]
    pub connectivity_score: Option<f64>,
    #[serde(default)]
    pub delivery: Option<DeliveryServices>,
    /// Sources that failed or timed out during the last aggregation
    #[serde(default)]
    pub degraded_sources: Vec<SourceKind>,
    #[serde(default)]
    pub aggregated_at: Option<DateTime<Utc>>,
}

impl RawMetrics {
    /// Recompute the derived 0-10 amenity and connectivity scores from counts.
    pub fn derive_scores(&mut self) {
        let restaurants = self.restaurants.map(|r| r.restaurants_count).unwrap_or(0);

        if let Some(amenities) = self.amenities {
            self.amenities_score = Some(amenities.score(restaurants));
        }

        if self.amenities.is_some() || self.delivery.is_some() {
            let mut score = 0.0;
            if let Some(amenities) = self.amenities {
                score += (amenities.metro_stations as f64).min(3.0);
                score += (amenities.bus_stops as f64 * 0.1).min(3.0);
            }
            if let Some(delivery) = self.delivery {
                score += delivery.available_count() as f64;
            }
            self.connectivity_score = Some(score.min(10.0));
        }
    }
}

/// A locality joined with its aggregated metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub id: i64,
    pub locality_id: i64,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub distance_to_center_km: Option<f64>,
    #[serde(default)]
    pub metrics: RawMetrics,
}

impl Neighborhood {
    pub fn from_locality(id: i64, locality: &Locality, metrics: RawMetrics) -> Self {
        Self {
            id,
            locality_id: locality.id,
            name: locality.name.clone(),
            city: locality.city.clone(),
            latitude: locality.latitude,
            longitude: locality.longitude,
            distance_to_center_km: locality.distance_to_center_km,
            metrics,
        }
    }

    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        }
    }

    pub fn rent_for(&self, property_type: PropertyType) -> Option<f64> {
        self.metrics.rent.get(property_type)
    }
}

/// One coherent read of every neighborhood in a city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    pub city: String,
    pub neighborhoods: Vec<Neighborhood>,
    pub fetched_at: DateTime<Utc>,
}

impl CitySnapshot {
    /// Most recent aggregation time across the snapshot
    pub fn data_as_of(&self) -> Option<DateTime<Utc>> {
        self.neighborhoods
            .iter()
            .filter_map(|n| n.metrics.aggregated_at)
            .max()
    }
}

/// Hard limits for a recommendation request
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub city: String,
    pub property_type: PropertyType,
    pub max_budget: f64,
    pub max_travel_distance_km: f64,
    pub number_of_people: u32,
    /// Commute destination; when absent, distance to the city center is used
    pub work_point: Option<GeoPoint>,
}

/// AQI severity bucket with fixed thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AqiCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    Severe,
}

impl AqiCategory {
    pub fn from_aqi(aqi: f64) -> Self {
        if aqi <= 50.0 {
            AqiCategory::Good
        } else if aqi <= 100.0 {
            AqiCategory::Satisfactory
        } else if aqi <= 150.0 {
            AqiCategory::Moderate
        } else if aqi <= 200.0 {
            AqiCategory::Poor
        } else {
            AqiCategory::Severe
        }
    }
}

/// Restaurant figures shown alongside a result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RestaurantBreakdown {
    pub restaurants_count: u32,
    pub highly_rated_restaurants: u32,
    pub avg_restaurant_rating: Option<f64>,
}

/// Amenity counts shown alongside a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmenityBreakdown {
    pub hospitals: u32,
    pub schools: u32,
    pub parks: u32,
    pub malls: u32,
}

/// A ranked neighborhood with its raw-value breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub rank: usize,
    pub neighborhood_id: i64,
    pub locality_id: i64,
    pub locality_name: String,
    pub city: String,
    pub score: f64,
    pub rent: f64,
    pub grocery_cost: Option<f64>,
    pub grocery_stores_count: u32,
    pub transport_cost: Option<f64>,
    pub total_monthly_cost: f64,
    pub aqi: Option<f64>,
    pub aqi_category: Option<AqiCategory>,
    pub hygiene_rating: Option<f64>,
    pub restaurants: RestaurantBreakdown,
    pub amenities: AmenityBreakdown,
    pub amenities_score: Option<f64>,
    pub connectivity_score: Option<f64>,
    pub delivery_services: Option<DeliveryServices>,
    pub travel_distance_km: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Per-factor desirability in [0,1]; unknown factors report the neutral 0.5
    pub normalized_scores: FactorMap<f64>,
}

/// A source that failed for one locality during aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DegradedSource {
    pub locality_id: i64,
    pub source: SourceKind,
}
