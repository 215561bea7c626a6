use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::models::{DegradedSource, Locality, Neighborhood, RawMetrics, SourceKind};
use crate::services::sources::{MetricSource, SourceError};
use crate::services::store::{MetricsStore, StoreError};

/// Errors that can occur while aggregating metrics
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Metrics store error: {0}")]
    Store(#[from] StoreError),

    #[error("Every metric source failed for locality {0}")]
    AllSourcesFailed(i64),

    #[error("No locality in {city} completed aggregation ({failed} failed)")]
    NoLocalityCompleted { city: String, failed: usize },
}

/// Outcome of aggregating a single locality
#[derive(Debug, Clone)]
pub struct LocalityAggregation {
    pub neighborhood: Neighborhood,
    pub degraded: Vec<SourceKind>,
}

/// Outcome of aggregating every locality of a city
#[derive(Debug, Clone, Default)]
pub struct AggregationReport {
    pub city: String,
    pub neighborhoods: Vec<Neighborhood>,
    pub degraded: Vec<DegradedSource>,
    /// Localities that had not finished when the deadline passed
    pub timed_out: Vec<i64>,
    /// Localities that failed outright
    pub failed: Vec<i64>,
}

/// Fans metric sources out over localities and writes the merged results
///
/// Source fetches share one concurrency cap across the whole run, and each
/// fetch runs under its own timeout. A failed or timed-out source leaves its
/// metrics unknown and is recorded as degraded.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn MetricsStore>,
    sources: Vec<Arc<dyn MetricSource>>,
    limiter: Arc<Semaphore>,
    source_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn MetricsStore>,
        sources: Vec<Arc<dyn MetricSource>>,
        max_concurrency: usize,
        source_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sources,
            limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
            source_timeout,
        }
    }

    pub fn source_kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Run every source for one locality and merge the results
    pub async fn collect_metrics(&self, locality: &Locality) -> (RawMetrics, Vec<SourceKind>) {
        let mut tasks = JoinSet::new();
        for source in &self.sources {
            let source = Arc::clone(source);
            let limiter = Arc::clone(&self.limiter);
            let locality = locality.clone();
            let source_timeout = self.source_timeout;

            tasks.spawn(async move {
                let kind = source.kind();
                // The semaphore is never closed
                let _permit = limiter.acquire_owned().await;
                let result = match tokio::time::timeout(source_timeout, source.fetch(&locality)).await {
                    Ok(result) => result.map_err(SourceFailure::Failed),
                    Err(_) => Err(SourceFailure::TimedOut),
                };
                (kind, result)
            });
        }

        let mut metrics = RawMetrics::default();
        let mut reported = BTreeSet::new();
        let mut degraded = BTreeSet::new();

        while let Some(joined) = tasks.join_next().await {
            let (kind, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Metric source task for locality {} aborted: {}", locality.id, e);
                    continue;
                }
            };
            reported.insert(kind);

            match result {
                Ok(patch) => patch.apply(&mut metrics),
                Err(failure) => {
                    tracing::warn!(
                        "Source {} degraded for locality {}: {}",
                        kind,
                        locality.id,
                        failure
                    );
                    degraded.insert(kind);
                }
            }
        }

        // Sources whose task panicked never reported
        for kind in self.source_kinds() {
            if !reported.contains(&kind) {
                degraded.insert(kind);
            }
        }

        let degraded: Vec<SourceKind> = degraded.into_iter().collect();
        metrics.degraded_sources = degraded.clone();
        metrics.aggregated_at = Some(Utc::now());
        metrics.derive_scores();

        (metrics, degraded)
    }

    /// Aggregate and persist one locality
    pub async fn aggregate_locality(
        &self,
        locality: &Locality,
    ) -> Result<LocalityAggregation, AggregationError> {
        let (metrics, degraded) = self.collect_metrics(locality).await;

        if !self.sources.is_empty() && degraded.len() == self.sources.len() {
            return Err(AggregationError::AllSourcesFailed(locality.id));
        }

        let neighborhood = self.store.save_metrics(locality, metrics).await?;

        tracing::info!(
            "Aggregated locality {} ({}) with {} degraded sources",
            locality.id,
            locality.name,
            degraded.len()
        );

        Ok(LocalityAggregation {
            neighborhood,
            degraded,
        })
    }

    /// Aggregate every registered locality of a city
    ///
    /// With a deadline, localities still running when it passes are abandoned
    /// and reported in `timed_out`; the ones that completed are kept.
    pub async fn aggregate_city(
        &self,
        city: &str,
        deadline: Option<Duration>,
    ) -> Result<AggregationReport, AggregationError> {
        let localities = self.store.localities(city).await?;
        let mut report = AggregationReport {
            city: city.to_string(),
            ..Default::default()
        };

        if localities.is_empty() {
            tracing::info!("No localities registered for {}", city);
            return Ok(report);
        }

        tracing::info!("Aggregating {} localities for {}", localities.len(), city);

        let mut pending: BTreeSet<i64> = localities.iter().map(|l| l.id).collect();
        let mut tasks = JoinSet::new();
        for locality in localities {
            let aggregator = self.clone();
            tasks.spawn(async move {
                let result = aggregator.aggregate_locality(&locality).await;
                (locality.id, result)
            });
        }

        let deadline_at = deadline.map(|d| tokio::time::Instant::now() + d);

        loop {
            let next = match deadline_at {
                Some(at) => match tokio::time::timeout_at(at, tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(
                            "Aggregation deadline for {} passed with {} localities pending",
                            city,
                            pending.len()
                        );
                        tasks.abort_all();
                        break;
                    }
                },
                None => tasks.join_next().await,
            };

            let Some(joined) = next else { break };
            let (locality_id, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Aggregation task for {} failed: {}", city, e);
                    continue;
                }
            };
            pending.remove(&locality_id);

            match result {
                Ok(aggregation) => {
                    report.degraded.extend(
                        aggregation
                            .degraded
                            .iter()
                            .map(|&source| DegradedSource { locality_id, source }),
                    );
                    report.neighborhoods.push(aggregation.neighborhood);
                }
                Err(e) => {
                    tracing::warn!("Aggregation failed for locality {}: {}", locality_id, e);
                    report.failed.push(locality_id);
                }
            }
        }

        report.timed_out = pending.into_iter().collect();
        report.failed.sort_unstable();
        report.neighborhoods.sort_by_key(|n| n.id);
        report.degraded.sort();

        if report.neighborhoods.is_empty() {
            return Err(AggregationError::NoLocalityCompleted {
                city: city.to_string(),
                failed: report.failed.len() + report.timed_out.len(),
            });
        }

        Ok(report)
    }
}

#[derive(Debug, Error)]
enum SourceFailure {
    #[error("{0}")]
    Failed(SourceError),

    #[error("timed out")]
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryServices;
    use crate::services::sources::{MetricPatch, SourceFuture};
    use crate::services::store::InMemoryMetricsStore;

    struct FixedAqi(f64);

    impl MetricSource for FixedAqi {
        fn kind(&self) -> SourceKind {
            SourceKind::Aqi
        }

        fn fetch<'a>(&'a self, _locality: &'a Locality) -> SourceFuture<'a> {
            let aqi = self.0;
            Box::pin(async move { Ok(MetricPatch::Aqi(aqi)) })
        }
    }

    struct Failing(SourceKind);

    impl MetricSource for Failing {
        fn kind(&self) -> SourceKind {
            self.0
        }

        fn fetch<'a>(&'a self, _locality: &'a Locality) -> SourceFuture<'a> {
            Box::pin(async { Err(SourceError::ApiError("unavailable".into())) })
        }
    }

    struct Slow(Duration);

    impl MetricSource for Slow {
        fn kind(&self) -> SourceKind {
            SourceKind::Delivery
        }

        fn fetch<'a>(&'a self, _locality: &'a Locality) -> SourceFuture<'a> {
            let delay = self.0;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(MetricPatch::Delivery(DeliveryServices::default()))
            })
        }
    }

    fn locality(id: i64) -> Locality {
        Locality {
            id,
            name: format!("Locality {}", id),
            city: "Bhopal".to_string(),
            latitude: Some(23.2),
            longitude: Some(77.4),
            distance_to_center_km: Some(5.0),
        }
    }

    fn source<S: MetricSource + 'static>(source: S) -> Arc<dyn MetricSource> {
        Arc::new(source)
    }

    fn aggregator(store: Arc<InMemoryMetricsStore>, sources: Vec<Arc<dyn MetricSource>>) -> Aggregator {
        Aggregator::new(store, sources, 4, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_partial_failure_is_degraded_not_fatal() {
        let store = Arc::new(InMemoryMetricsStore::new());
        let agg = aggregator(
            store.clone(),
            vec![source(FixedAqi(88.0)), source(Failing(SourceKind::Rent))],
        );

        let result = agg.aggregate_locality(&locality(1)).await.unwrap();

        assert_eq!(result.degraded, vec![SourceKind::Rent]);
        assert_eq!(result.neighborhood.metrics.aqi, Some(88.0));
        assert_eq!(result.neighborhood.metrics.degraded_sources, vec![SourceKind::Rent]);
        assert!(result.neighborhood.metrics.aggregated_at.is_some());
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_an_error() {
        let store = Arc::new(InMemoryMetricsStore::new());
        let agg = aggregator(
            store.clone(),
            vec![source(Failing(SourceKind::Rent)), source(Failing(SourceKind::Aqi))],
        );

        assert!(matches!(
            agg.aggregate_locality(&locality(1)).await,
            Err(AggregationError::AllSourcesFailed(1))
        ));
        assert!(store.city_snapshot("Bhopal").await.unwrap().neighborhoods.is_empty());
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let store = Arc::new(InMemoryMetricsStore::new());
        let agg = aggregator(
            store,
            vec![source(FixedAqi(40.0)), source(Slow(Duration::from_secs(5)))],
        );

        let result = agg.aggregate_locality(&locality(2)).await.unwrap();
        assert_eq!(result.degraded, vec![SourceKind::Delivery]);
        assert!(result.neighborhood.metrics.delivery.is_none());
    }

    #[tokio::test]
    async fn test_aggregate_city_collects_every_locality() {
        let store = Arc::new(InMemoryMetricsStore::new());
        for id in 1..=3 {
            store.register_locality(locality(id)).unwrap();
        }
        let agg = aggregator(store.clone(), vec![source(FixedAqi(60.0))]);

        let report = agg.aggregate_city("bhopal", None).await.unwrap();

        assert_eq!(report.neighborhoods.len(), 3);
        assert!(report.degraded.is_empty());
        assert!(report.timed_out.is_empty());
        assert_eq!(store.city_snapshot("Bhopal").await.unwrap().neighborhoods.len(), 3);
    }

    #[tokio::test]
    async fn test_aggregate_city_deadline_with_nothing_done() {
        let store = Arc::new(InMemoryMetricsStore::new());
        store.register_locality(locality(1)).unwrap();
        let agg = Aggregator::new(
            store,
            vec![source(Slow(Duration::from_secs(5)))],
            4,
            Duration::from_secs(10),
        );

        let result = agg.aggregate_city("Bhopal", Some(Duration::from_millis(50))).await;
        assert!(matches!(
            result,
            Err(AggregationError::NoLocalityCompleted { failed: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_city_is_empty_report() {
        let store = Arc::new(InMemoryMetricsStore::new());
        let agg = aggregator(store, vec![source(FixedAqi(60.0))]);

        let report = agg.aggregate_city("Atlantis", None).await.unwrap();
        assert!(report.neighborhoods.is_empty());
    }
}
