use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

use crate::models::domain::{Constraint, GeoPoint, PropertyType};
use crate::models::factors::{WeightError, WeightVector};

/// Request-wide validation failures, raised before any data is read
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Fields(String),

    #[error("{0}")]
    PropertyType(String),

    #[error("{0}")]
    Weights(#[from] WeightError),
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ValidationError::Fields(errors.to_string())
    }
}

/// Request for a ranked neighborhood shortlist
///
/// POST /api/v1/recommendations/neighborhoods
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecommendationRequest {
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(range(min = 1, message = "number_of_people must be at least 1"))]
    pub number_of_people: u32,
    #[validate(range(min = 0.0, message = "max_travel_distance_km must be >= 0"))]
    pub max_travel_distance_km: f64,
    #[validate(range(min = 0.0, message = "budget must be >= 0"))]
    pub budget: f64,
    #[serde(default = "default_property_type")]
    pub property_type: String,
    #[validate(range(min = 1, message = "top_n must be at least 1"))]
    #[serde(default = "default_top_n")]
    pub top_n: u32,
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub work_location: Option<GeoPoint>,
}

fn default_property_type() -> String {
    PropertyType::default().as_str().to_string()
}

fn default_top_n() -> u32 {
    10
}

/// A validated recommendation request with typed constraint and weights
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationQuery {
    pub constraint: Constraint,
    pub weights: WeightVector,
    /// Requested size; the recommender clamps it to its configured maximum
    pub top_n: usize,
}

impl RecommendationRequest {
    /// Validate the loosely-typed request into a [`RecommendationQuery`].
    ///
    /// `default_weights` applies only when the caller omits `weights` entirely.
    pub fn into_query(
        self,
        default_weights: WeightVector,
    ) -> Result<RecommendationQuery, ValidationError> {
        self.validate()?;

        if self.city.trim().is_empty() {
            return Err(ValidationError::Fields("city is required".to_string()));
        }

        if !self.budget.is_finite() || !self.max_travel_distance_km.is_finite() {
            return Err(ValidationError::Fields(
                "budget and max_travel_distance_km must be finite".to_string(),
            ));
        }

        if let Some(point) = &self.work_location {
            if !(-90.0..=90.0).contains(&point.latitude)
                || !(-180.0..=180.0).contains(&point.longitude)
            {
                return Err(ValidationError::Fields(
                    "work_location is outside valid latitude/longitude bounds".to_string(),
                ));
            }
        }

        let property_type = self
            .property_type
            .parse::<PropertyType>()
            .map_err(ValidationError::PropertyType)?;

        let weights = match &self.weights {
            Some(bag) => WeightVector::from_map(bag)?,
            None => default_weights,
        };

        Ok(RecommendationQuery {
            constraint: Constraint {
                city: self.city.trim().to_string(),
                property_type,
                max_budget: self.budget,
                max_travel_distance_km: self.max_travel_distance_km,
                number_of_people: self.number_of_people,
                work_point: self.work_location,
            },
            weights,
            top_n: self.top_n as usize,
        })
    }
}

/// Query string for the single-locality aggregation trigger
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AggregateQuery {
    #[validate(length(min = 1))]
    pub city: String,
}

/// Rent fairness check for a single listing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClassifyRentRequest {
    #[validate(length(min = 1))]
    pub city: String,
    pub locality_id: i64,
    #[serde(default = "default_property_type")]
    pub property_type: String,
    #[validate(range(min = 0.0))]
    pub rent_amount: f64,
}

/// Access-token verification request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyTokenRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::factors::Factor;

    fn request() -> RecommendationRequest {
        RecommendationRequest {
            city: "Bhopal".to_string(),
            number_of_people: 2,
            max_travel_distance_km: 10.0,
            budget: 30000.0,
            property_type: "2BHK".to_string(),
            top_n: 5,
            weights: None,
            work_location: None,
        }
    }

    #[test]
    fn test_valid_request_uses_default_weights() {
        let query = request().into_query(WeightVector::default()).unwrap();
        assert_eq!(query.constraint.property_type, PropertyType::TwoBhk);
        assert_eq!(query.weights, WeightVector::default());
        assert_eq!(query.top_n, 5);
    }

    #[test]
    fn test_partial_weights_default_missing_to_zero() {
        let mut req = request();
        req.weights = Some(BTreeMap::from([("aqi".to_string(), 1.0)]));

        let query = req.into_query(WeightVector::default()).unwrap();
        assert_eq!(query.weights.weight(Factor::Aqi), 1.0);
        assert_eq!(query.weights.weight(Factor::Rent), 0.0);
    }

    #[test]
    fn test_negative_budget_rejected() {
        let mut req = request();
        req.budget = -1.0;
        assert!(matches!(
            req.into_query(WeightVector::default()),
            Err(ValidationError::Fields(_))
        ));
    }

    #[test]
    fn test_unknown_property_type_rejected() {
        let mut req = request();
        req.property_type = "villa".to_string();
        assert!(matches!(
            req.into_query(WeightVector::default()),
            Err(ValidationError::PropertyType(_))
        ));
    }

    #[test]
    fn test_zero_top_n_rejected() {
        let mut req = request();
        req.top_n = 0;
        assert!(req.into_query(WeightVector::default()).is_err());
    }

    #[test]
    fn test_unknown_weight_key_rejected() {
        let mut req = request();
        req.weights = Some(BTreeMap::from([("safety".to_string(), 1.0)]));
        assert!(matches!(
            req.into_query(WeightVector::default()),
            Err(ValidationError::Weights(WeightError::UnknownKey(_)))
        ));
    }
}
