use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use thiserror::Error;

use crate::models::{CitySnapshot, Locality, Neighborhood, RawMetrics};

/// Errors that can occur when reading or writing aggregated metrics
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Metrics store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Holder of the current per-neighborhood metrics
///
/// The recommendation engine only reads through [`MetricsStore::city_snapshot`];
/// the aggregator is the single writer.
pub trait MetricsStore: Send + Sync {
    /// Every aggregated neighborhood of a city in one coherent read, ordered by id
    fn city_snapshot<'a>(&'a self, city: &'a str) -> StoreFuture<'a, CitySnapshot>;

    /// Localities registered for a city, aggregated or not
    fn localities<'a>(&'a self, city: &'a str) -> StoreFuture<'a, Vec<Locality>>;

    fn locality(&self, locality_id: i64) -> StoreFuture<'_, Option<Locality>>;

    /// Replace the metrics of a locality's neighborhood, creating it if needed
    fn save_metrics<'a>(
        &'a self,
        locality: &'a Locality,
        metrics: RawMetrics,
    ) -> StoreFuture<'a, Neighborhood>;

    fn health_check(&self) -> StoreFuture<'_, bool>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    localities: BTreeMap<i64, Locality>,
    /// Keyed by locality id
    neighborhoods: BTreeMap<i64, Neighborhood>,
    next_neighborhood_id: i64,
}

/// Process-local metrics store for tests and single-node demos
#[derive(Debug, Default)]
pub struct InMemoryMetricsStore {
    state: RwLock<InMemoryState>,
    unavailable: AtomicBool,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_locality(&self, locality: Locality) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.localities.insert(locality.id, locality);
        Ok(())
    }

    /// Register a locality together with already-aggregated metrics
    pub fn insert_neighborhood(&self, neighborhood: Neighborhood) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.next_neighborhood_id = state.next_neighborhood_id.max(neighborhood.id);
        state.localities.entry(neighborhood.locality_id).or_insert_with(|| Locality {
            id: neighborhood.locality_id,
            name: neighborhood.name.clone(),
            city: neighborhood.city.clone(),
            latitude: neighborhood.latitude,
            longitude: neighborhood.longitude,
            distance_to_center_km: neighborhood.distance_to_center_km,
        });
        state.neighborhoods.insert(neighborhood.locality_id, neighborhood);
        Ok(())
    }

    /// Simulate an unreachable backend
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, InMemoryState>, StoreError> {
        self.check_available()?;
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, InMemoryState>, StoreError> {
        self.check_available()?;
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".to_string()))
    }
}

fn same_city(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl MetricsStore for InMemoryMetricsStore {
    fn city_snapshot<'a>(&'a self, city: &'a str) -> StoreFuture<'a, CitySnapshot> {
        Box::pin(async move {
            let state = self.read()?;
            let mut neighborhoods: Vec<Neighborhood> = state
                .neighborhoods
                .values()
                .filter(|n| same_city(&n.city, city))
                .cloned()
                .collect();
            neighborhoods.sort_by_key(|n| n.id);

            Ok(CitySnapshot {
                city: city.to_string(),
                neighborhoods,
                fetched_at: Utc::now(),
            })
        })
    }

    fn localities<'a>(&'a self, city: &'a str) -> StoreFuture<'a, Vec<Locality>> {
        Box::pin(async move {
            let state = self.read()?;
            Ok(state
                .localities
                .values()
                .filter(|l| same_city(&l.city, city))
                .cloned()
                .collect())
        })
    }

    fn locality(&self, locality_id: i64) -> StoreFuture<'_, Option<Locality>> {
        Box::pin(async move {
            let state = self.read()?;
            Ok(state.localities.get(&locality_id).cloned())
        })
    }

    fn save_metrics<'a>(
        &'a self,
        locality: &'a Locality,
        metrics: RawMetrics,
    ) -> StoreFuture<'a, Neighborhood> {
        Box::pin(async move {
            let mut state = self.write()?;
            state.localities.entry(locality.id).or_insert_with(|| locality.clone());

            let id = match state.neighborhoods.get(&locality.id) {
                Some(existing) => existing.id,
                None => {
                    state.next_neighborhood_id += 1;
                    state.next_neighborhood_id
                }
            };

            let neighborhood = Neighborhood::from_locality(id, locality, metrics);
            state.neighborhoods.insert(locality.id, neighborhood.clone());
            Ok(neighborhood)
        })
    }

    fn health_check(&self) -> StoreFuture<'_, bool> {
        Box::pin(async move { Ok(!self.unavailable.load(Ordering::SeqCst)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locality(id: i64, city: &str) -> Locality {
        Locality {
            id,
            name: format!("Locality {}", id),
            city: city.to_string(),
            latitude: Some(23.25),
            longitude: Some(77.41),
            distance_to_center_km: Some(4.0),
        }
    }

    #[tokio::test]
    async fn test_save_metrics_is_idempotent_per_locality() {
        let store = InMemoryMetricsStore::new();
        let loc = locality(7, "Bhopal");

        let first = store.save_metrics(&loc, RawMetrics::default()).await.unwrap();
        let second = store
            .save_metrics(&loc, RawMetrics { aqi: Some(80.0), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let snapshot = store.city_snapshot("bhopal").await.unwrap();
        assert_eq!(snapshot.neighborhoods.len(), 1);
        assert_eq!(snapshot.neighborhoods[0].metrics.aqi, Some(80.0));
    }

    #[tokio::test]
    async fn test_localities_filtered_by_city() {
        let store = InMemoryMetricsStore::new();
        store.register_locality(locality(1, "Bhopal")).unwrap();
        store.register_locality(locality(2, "Indore")).unwrap();

        let localities = store.localities("BHOPAL").await.unwrap();
        assert_eq!(localities.len(), 1);
        assert_eq!(localities[0].id, 1);
        assert!(store.city_snapshot("Bhopal").await.unwrap().neighborhoods.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryMetricsStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.city_snapshot("Bhopal").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(!store.health_check().await.unwrap());
    }
}
