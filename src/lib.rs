//! Neighborhood ranker - recommendation scoring and ranking service
//!
//! Ranks a city's neighborhoods against a household's hard constraints
//! (budget, commute distance, property type) and a preference weighting over
//! seven cost-of-living factors. Raw per-neighborhood metrics are aggregated
//! from independent sources and cached per city; scoring is pure and
//! deterministic for a given snapshot.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{Recommender, Recommendation, distance::haversine_distance};
pub use models::{
    Constraint, Factor, Neighborhood, RecommendationRequest, RecommendationResponse,
    ScoredResult, WeightVector,
};
