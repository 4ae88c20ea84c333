// In-memory cache backing the HTTP response cache

use moka::{future::Cache, Expiry};
use std::time::{Duration, Instant};
use thiserror::Error;

pub mod middleware;

pub use middleware::{response_cache, CachedResponse, HttpCache};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    ttl: Option<Duration>,
}

/// Expires each entry after the TTL it was stored with
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
}

/// Bounded in-process cache; evicts by TinyLFU once `max_entries` is reached
#[derive(Clone)]
pub struct InMemoryCache {
    store: Cache<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn with_capacity(max_entries: u64) -> Self {
        let store = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { store }
    }

    /// Number of live entries once pending evictions have run
    pub async fn len(&self) -> u64 {
        self.store.run_pending_tasks().await;
        self.store.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.store.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        if ttl == Some(Duration::ZERO) {
            return Ok(());
        }
        self.store
            .insert(
                key.to_string(),
                CacheEntry {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }
}
