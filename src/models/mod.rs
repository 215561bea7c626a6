// Model exports
pub mod domain;
pub mod factors;
pub mod requests;
pub mod responses;

pub use domain::{
    AmenityBreakdown, AmenityCounts, AqiCategory, CitySnapshot, Constraint, DegradedSource,
    DeliveryServices, GeoPoint, Locality, Neighborhood, PropertyType, RawMetrics, RentByType,
    RestaurantBreakdown, RestaurantStats, ScoredResult, SourceKind,
};
pub use factors::{Direction, Factor, FactorMap, WeightError, WeightVector};
pub use requests::{
    AggregateQuery, ClassifyRentRequest, RecommendationQuery, RecommendationRequest,
    ValidationError, VerifyTokenRequest,
};
pub use responses::{
    AggregateResponse, ErrorResponse, FiltersApplied, HealthResponse, NeighborhoodsResponse,
    RecommendationOutcome, RecommendationResponse, RefreshResponse,
};
