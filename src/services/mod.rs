// Service exports
pub mod aggregator;
pub mod auth;
pub mod cache;
pub mod db_sources;
pub mod http_sources;
pub mod postgres;
pub mod recommendations;
pub mod sources;
pub mod store;

pub use aggregator::{AggregationError, AggregationReport, Aggregator, LocalityAggregation};
pub use auth::{AccessGrant, AuthError, Claims, LoginState, OtpChallenge, TokenService};
pub use cache::{CacheError, CacheKey, CacheManager, CacheStats};
pub use db_sources::{GrocerySource, RentSource, TransportSource};
pub use http_sources::{AmenitySource, AqiSource, PlacesClient, RestaurantSource};
pub use postgres::PostgresMetricsStore;
pub use recommendations::{RecommendError, RecommendationService, ServiceOptions};
pub use sources::{DeliveryCoverageSource, MetricPatch, MetricSource, SourceError};
pub use store::{InMemoryMetricsStore, MetricsStore, StoreError};
