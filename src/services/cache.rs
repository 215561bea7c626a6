use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Per-key bookkeeping kept alongside the cached bytes
#[derive(Debug, Default, Clone, Copy)]
struct KeyState {
    /// Bumped by every invalidation
    generation: u64,
    /// A shared-tier delete failed; L2 may still hold the old value
    l2_stale: bool,
}

/// Multi-tier snapshot cache
///
/// L1 is an in-process `moka` cache; L2 is an optional Redis instance shared
/// across replicas. Without Redis the manager serves from L1 only. Both tiers
/// expire entries after the same TTL.
///
/// Every key carries a generation. A reader captures it before loading the
/// value and fills through [`CacheManager::set_if_current`], so a fill that
/// raced an [`CacheManager::invalidate`] is dropped instead of outliving it.
pub struct CacheManager {
    // Store ConnectionManager in a Mutex for interior mutability
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    keys: Mutex<HashMap<String, KeyState>>,
    ttl_secs: u64,
}

impl CacheManager {
    /// Create a cache manager backed by Redis
    pub async fn new(redis_url: &str, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Some(Arc::new(tokio::sync::Mutex::new(redis))),
            l1_cache: build_l1(l1_size, ttl_secs),
            keys: Mutex::new(HashMap::new()),
            ttl_secs,
        })
    }

    /// Create an L1-only cache manager
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self {
            redis: None,
            l1_cache: build_l1(l1_size, ttl_secs),
            keys: Mutex::new(HashMap::new()),
            ttl_secs,
        }
    }

    /// Connect to Redis when configured, falling back to L1 only
    pub async fn connect_or_in_memory(redis_url: Option<&str>, l1_size: u64, ttl_secs: u64) -> Self {
        let Some(url) = redis_url.filter(|u| !u.trim().is_empty()) else {
            tracing::info!("No Redis configured, snapshot cache is in-process only");
            return Self::in_memory(l1_size, ttl_secs);
        };

        match Self::new(url, l1_size, ttl_secs).await {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("Failed to connect to Redis ({}), running with in-process cache only", e);
                Self::in_memory(l1_size, ttl_secs)
            }
        }
    }

    pub fn has_shared_tier(&self) -> bool {
        self.redis.is_some()
    }

    fn key_states(&self) -> MutexGuard<'_, HashMap<String, KeyState>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current generation of a key; capture it before loading the value to cache
    pub fn generation(&self, key: &str) -> u64 {
        self.key_states().get(key).map(|state| state.generation).unwrap_or(0)
    }

    fn l2_readable(&self, key: &str) -> bool {
        !self.key_states().get(key).map(|state| state.l2_stale).unwrap_or(false)
    }

    fn mark_l2_stale(&self, key: &str, stale: bool) {
        let mut states = self.key_states();
        if stale {
            states.entry(key.to_string()).or_default().l2_stale = true;
        } else if let Some(state) = states.get_mut(key) {
            state.l2_stale = false;
        }
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        // Try L1 cache first
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        // Try L2 cache (Redis), unless a failed delete left it stale
        let l2_readable = self.l2_readable(key);
        if let Some(redis) = self.redis.as_ref().filter(|_| l2_readable) {
            let mut conn = redis.lock().await;
            let value: Option<String> = redis::cmd("GET")
                .arg(key)
                .query_async(&mut *conn)
                .await?;
            drop(conn);

            if let Some(json) = value {
                tracing::trace!("L2 cache hit: {}", key);

                // Populate L1 cache
                let bytes = json.as_bytes().to_vec();
                self.l1_cache.insert(key.to_string(), bytes).await;

                return Ok(serde_json::from_str(&json)?);
            }
        }

        tracing::trace!("Cache miss: {}", key);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in cache (both tiers)
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        // Set in L1 cache (uses configured TTL)
        let bytes = json.as_bytes().to_vec();
        self.l1_cache.insert(key.to_string(), bytes).await;

        // Set in L2 cache with explicit TTL
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        // Both tiers now hold this value
        self.mark_l2_stale(key, false);

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Set a value only if `key` has not been invalidated since `generation`
    ///
    /// Returns whether the value was kept.
    pub async fn set_if_current<T>(&self, key: &str, value: &T, generation: u64) -> Result<bool, CacheError>
    where
        T: Serialize,
    {
        if self.generation(key) != generation {
            tracing::debug!("Skipping fill of {}: invalidated since load", key);
            return Ok(false);
        }

        self.set(key, value).await?;

        // An invalidation that landed during the write wins
        if self.generation(key) != generation {
            tracing::debug!("Dropping fill of {}: invalidated during write", key);
            self.delete(key).await?;
            return Ok(false);
        }

        Ok(true)
    }

    /// Bump the key's generation and delete it from both tiers
    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.key_states().entry(key.to_string()).or_default().generation += 1;
        self.delete(key).await
    }

    /// Delete a value from both cache tiers
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let deleted = redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut *conn)
                .await;
            drop(conn);

            if let Err(e) = deleted {
                tracing::error!("Failed to delete {} from Redis, ignoring L2 until next set: {}", key, e);
                self.mark_l2_stale(key, true);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            shared_tier: self.has_shared_tier(),
            ttl_secs: self.ttl_secs,
        }
    }
}

fn build_l1(l1_size: u64, ttl_secs: u64) -> moka::future::Cache<String, Vec<u8>> {
    moka::future::CacheBuilder::new(l1_size)
        .time_to_live(Duration::from_secs(ttl_secs))
        .build()
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub shared_tier: bool,
    pub ttl_secs: u64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a city's raw snapshot
    pub fn city_snapshot(city: &str) -> String {
        format!("snapshot:{}", city.trim().to_lowercase())
    }
}
