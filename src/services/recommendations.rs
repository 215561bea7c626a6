use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

use crate::core::{classify_rent, clamp_top_n, RentAssessment, Recommender, DEFAULT_MAX_TOP_N};
use crate::models::{
    AggregateResponse, CitySnapshot, ClassifyRentRequest, FiltersApplied, HealthResponse,
    NeighborhoodsResponse, PropertyType, RecommendationOutcome, RecommendationRequest,
    RecommendationResponse, RefreshResponse, ValidationError, WeightVector,
};
use crate::services::aggregator::{AggregationError, AggregationReport, Aggregator};
use crate::services::cache::{CacheError, CacheKey, CacheManager};
use crate::services::store::{MetricsStore, StoreError};

/// Request-level failures surfaced to API callers
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    AggregationFailure(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),
}

impl RecommendError {
    pub fn http_status(&self) -> u16 {
        match self {
            RecommendError::Validation(_) => 400,
            RecommendError::Unauthorized(_) => 401,
            RecommendError::NotFound(_) => 404,
            RecommendError::AggregationFailure(_) => 503,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RecommendError::Validation(_) => "validation_error",
            RecommendError::Unauthorized(_) => "unauthorized",
            RecommendError::NotFound(_) => "not_found",
            RecommendError::AggregationFailure(_) => "aggregation_failure",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, RecommendError::AggregationFailure(_))
    }
}

impl From<StoreError> for RecommendError {
    fn from(e: StoreError) -> Self {
        RecommendError::AggregationFailure(format!("Metrics store unavailable: {}", e))
    }
}

impl From<AggregationError> for RecommendError {
    fn from(e: AggregationError) -> Self {
        RecommendError::AggregationFailure(e.to_string())
    }
}

/// Tunables for [`RecommendationService`]
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub max_top_n: usize,
    pub default_weights: WeightVector,
    /// Budget for aggregating a city that has localities but no data yet
    pub on_demand_deadline: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_top_n: DEFAULT_MAX_TOP_N,
            default_weights: WeightVector::default(),
            on_demand_deadline: Duration::from_secs(10),
        }
    }
}

/// Entry point for every recommendation-side operation
///
/// Reads raw snapshots through the cache, ranks them with the pure
/// [`Recommender`], and drives aggregation for the refresh operations.
/// Scored output is never cached.
#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<dyn MetricsStore>,
    cache: Arc<CacheManager>,
    aggregator: Aggregator,
    recommender: Recommender,
    options: ServiceOptions,
    /// In-flight background refreshes: cache key of the city to job id
    refresh_jobs: Arc<Mutex<HashMap<String, String>>>,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn MetricsStore>,
        cache: Arc<CacheManager>,
        aggregator: Aggregator,
        options: ServiceOptions,
    ) -> Self {
        Self {
            store,
            cache,
            aggregator,
            recommender: Recommender::new(options.max_top_n),
            options,
            refresh_jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn default_weights(&self) -> WeightVector {
        self.options.default_weights
    }

    /// Rank a city's neighborhoods for a caller request
    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationResponse, RecommendError> {
        let query = request.into_query(self.options.default_weights)?;
        let constraint = &query.constraint;

        tracing::info!(
            "Recommending for {} (budget: {}, property: {}, people: {})",
            constraint.city,
            constraint.max_budget,
            constraint.property_type,
            constraint.number_of_people
        );

        let snapshot = self.snapshot(&constraint.city).await?;

        let filters_applied = FiltersApplied {
            city: constraint.city.clone(),
            number_of_people: constraint.number_of_people,
            max_travel_distance_km: constraint.max_travel_distance_km,
            budget: constraint.max_budget,
            property_type: constraint.property_type,
            top_n: clamp_top_n(query.top_n, self.recommender.max_top_n()),
            weights: query.weights,
        };

        if snapshot.neighborhoods.is_empty() {
            tracing::info!("No neighborhood data for {}", constraint.city);
            return Ok(RecommendationResponse {
                recommendations: Vec::new(),
                outcome: RecommendationOutcome::UnknownCity,
                total_neighborhoods: 0,
                candidates_considered: 0,
                filters_applied,
                degraded_sources: Vec::new(),
                data_as_of: None,
            });
        }

        let recommendation = self.recommender.recommend(&snapshot.neighborhoods, &query);

        if !recommendation.degraded_sources.is_empty() {
            tracing::warn!(
                "{} degraded sources among results for {}",
                recommendation.degraded_sources.len(),
                constraint.city
            );
        }

        let outcome = if recommendation.results.is_empty() {
            RecommendationOutcome::NoCandidates
        } else {
            RecommendationOutcome::Ranked
        };

        tracing::info!(
            "Returning {} recommendations for {} (from {} candidates)",
            recommendation.results.len(),
            constraint.city,
            recommendation.candidates_considered
        );

        Ok(RecommendationResponse {
            recommendations: recommendation.results,
            outcome,
            total_neighborhoods: snapshot.neighborhoods.len(),
            candidates_considered: recommendation.candidates_considered,
            filters_applied,
            degraded_sources: recommendation.degraded_sources,
            data_as_of: snapshot.data_as_of(),
        })
    }

    /// Current raw snapshot for a city: cache, then store, then on-demand aggregation
    pub async fn snapshot(&self, city: &str) -> Result<CitySnapshot, RecommendError> {
        let key = CacheKey::city_snapshot(city);

        match self.cache.get::<CitySnapshot>(&key).await {
            Ok(snapshot) => {
                tracing::debug!("Snapshot cache hit for {}", city);
                return Ok(snapshot);
            }
            Err(CacheError::CacheMiss(_)) => {}
            Err(e) => tracing::warn!("Snapshot cache read failed for {}: {}", city, e),
        }

        // Captured before the read so a concurrent invalidation voids this fill
        let generation = self.cache.generation(&key);

        let mut snapshot = self.store.city_snapshot(city).await?;
        let mut complete = true;

        if snapshot.neighborhoods.is_empty() {
            let localities = self.store.localities(city).await?;
            if localities.is_empty() {
                return Ok(snapshot);
            }

            tracing::info!(
                "{} has {} localities but no metrics, aggregating on demand",
                city,
                localities.len()
            );
            let report = self
                .aggregator
                .aggregate_city(city, Some(self.options.on_demand_deadline))
                .await?;
            complete = report.timed_out.is_empty();
            snapshot = CitySnapshot {
                city: city.to_string(),
                neighborhoods: report.neighborhoods,
                fetched_at: Utc::now(),
            };
        }

        // Partial on-demand snapshots are not cached so the next read sees the rest
        if complete && !snapshot.neighborhoods.is_empty() {
            match self.cache.set_if_current(&key, &snapshot, generation).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!("Snapshot for {} went stale while loading", city),
                Err(e) => tracing::warn!("Failed to cache snapshot for {}: {}", city, e),
            }
        }

        Ok(snapshot)
    }

    async fn invalidate(&self, city: &str) {
        if let Err(e) = self.cache.invalidate(&CacheKey::city_snapshot(city)).await {
            tracing::warn!("Failed to invalidate snapshot cache for {}: {}", city, e);
        }
    }

    /// Recompute one locality's raw metrics
    pub async fn aggregate_locality(
        &self,
        locality_id: i64,
        city: &str,
    ) -> Result<AggregateResponse, RecommendError> {
        let locality = self
            .store
            .locality(locality_id)
            .await?
            .ok_or_else(|| RecommendError::NotFound(format!("Locality {} not found", locality_id)))?;

        if !locality.city.trim().eq_ignore_ascii_case(city.trim()) {
            return Err(RecommendError::NotFound(format!(
                "Locality {} is not in {}",
                locality_id, city
            )));
        }

        let aggregation = self.aggregator.aggregate_locality(&locality).await?;
        self.invalidate(&locality.city).await;

        Ok(AggregateResponse {
            message: format!("Aggregated neighborhood data for {}", locality.name),
            neighborhood: aggregation.neighborhood,
            degraded_sources: aggregation.degraded,
        })
    }

    /// Re-aggregate every locality of a city and drop its cached snapshot
    pub async fn refresh_city(&self, city: &str) -> Result<AggregationReport, RecommendError> {
        let report = self.aggregator.aggregate_city(city, None).await;
        self.invalidate(city).await;
        Ok(report?)
    }

    /// Start a city refresh and return immediately with its job id
    ///
    /// While a refresh of the same city is still running, its job id is
    /// returned instead of starting another.
    pub fn refresh_city_in_background(&self, city: String) -> RefreshResponse {
        let job_key = CacheKey::city_snapshot(&city);
        let job_id = uuid::Uuid::new_v4().to_string();

        {
            let mut jobs = self.refresh_jobs.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(running) = jobs.get(&job_key) {
                tracing::info!("Refresh job {} for {} already running", running, city);
                return RefreshResponse {
                    job_id: running.clone(),
                    message: format!("Refresh already running for {}", city),
                    city,
                };
            }
            jobs.insert(job_key.clone(), job_id.clone());
        }

        let service = self.clone();
        let task_city = city.clone();
        let task_job = job_id.clone();

        tokio::spawn(async move {
            match service.refresh_city(&task_city).await {
                Ok(report) => tracing::info!(
                    "Refresh job {} for {} finished: {} updated, {} failed, {} degraded sources",
                    task_job,
                    task_city,
                    report.neighborhoods.len(),
                    report.failed.len(),
                    report.degraded.len()
                ),
                Err(e) => tracing::error!("Refresh job {} for {} failed: {}", task_job, task_city, e),
            }
            service
                .refresh_jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&job_key);
        });

        RefreshResponse {
            job_id,
            message: format!("Refresh started for {}", city),
            city,
        }
    }

    /// Classify a listing's rent against its locality's average
    pub async fn classify_rent(
        &self,
        request: ClassifyRentRequest,
    ) -> Result<RentAssessment, RecommendError> {
        request.validate().map_err(ValidationError::from)?;
        if !request.rent_amount.is_finite() {
            return Err(ValidationError::Fields("rent_amount must be finite".to_string()).into());
        }
        let property_type = request
            .property_type
            .parse::<PropertyType>()
            .map_err(ValidationError::PropertyType)?;

        let snapshot = self.snapshot(&request.city).await?;
        let neighborhood = snapshot
            .neighborhoods
            .iter()
            .find(|n| n.locality_id == request.locality_id)
            .ok_or_else(|| {
                RecommendError::NotFound(format!(
                    "No neighborhood data for locality {} in {}",
                    request.locality_id, request.city
                ))
            })?;

        Ok(classify_rent(request.rent_amount, neighborhood.rent_for(property_type)))
    }

    /// Raw snapshot browse
    pub async fn neighborhoods(&self, city: &str) -> Result<NeighborhoodsResponse, RecommendError> {
        let snapshot = self.snapshot(city).await?;
        if snapshot.neighborhoods.is_empty() {
            return Err(RecommendError::NotFound(format!("No neighborhood data for {}", city)));
        }

        Ok(NeighborhoodsResponse {
            city: snapshot.city,
            neighborhoods: snapshot.neighborhoods,
            fetched_at: snapshot.fetched_at,
        })
    }

    pub async fn health(&self) -> HealthResponse {
        let store_healthy = match self.store.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!("Metrics store health check failed: {}", e);
                false
            }
        };

        HealthResponse {
            status: if store_healthy { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cached_snapshots: self.cache.stats().l1_size,
            timestamp: Utc::now(),
        }
    }
}
