use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::{DegradedSource, Neighborhood, PropertyType, ScoredResult, SourceKind};
use crate::models::factors::WeightVector;

/// Why a response holds the results it does
///
/// Lets the caller tell "nothing met your constraints" apart from "this city
/// has no data", both of which yield an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationOutcome {
    Ranked,
    NoCandidates,
    UnknownCity,
}

/// Echo of the effective request parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiltersApplied {
    pub city: String,
    pub number_of_people: u32,
    pub max_travel_distance_km: f64,
    pub budget: f64,
    pub property_type: PropertyType,
    pub top_n: usize,
    pub weights: WeightVector,
}

/// Response for the recommendations endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<ScoredResult>,
    pub outcome: RecommendationOutcome,
    /// Neighborhoods registered for the city
    pub total_neighborhoods: usize,
    /// Neighborhoods that survived the hard constraints
    pub candidates_considered: usize,
    pub filters_applied: FiltersApplied,
    /// Sources that were unavailable for the returned neighborhoods
    pub degraded_sources: Vec<DegradedSource>,
    pub data_as_of: Option<DateTime<Utc>>,
}

/// Response for the single-locality aggregation trigger
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    pub message: String,
    pub neighborhood: Neighborhood,
    pub degraded_sources: Vec<SourceKind>,
}

/// Response for the background city refresh trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub job_id: String,
    pub city: String,
    pub message: String,
}

/// Read-only browse of a city's raw snapshot
#[derive(Debug, Clone, Serialize)]
pub struct NeighborhoodsResponse {
    pub city: String,
    pub neighborhoods: Vec<Neighborhood>,
    pub fetched_at: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cached_snapshots: u64,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    pub retryable: bool,
}
