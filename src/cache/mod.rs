//! TTL-gated per-user storage of assembled contexts.

pub mod store;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::context::MasterContext;

pub use store::{cache_key, CacheStore, CachedContext, FileCacheStore, InMemoryCacheStore};

/// Wraps a [`CacheStore`] with expiry. Store failures never escape: reads
/// degrade to a miss and writes are dropped, both with a warning.
#[derive(Clone)]
pub struct ContextCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ContextCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn from_config(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        let ttl = i64::try_from(config.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(store, ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Entries stamped in the future are stale.
    pub fn is_fresh(&self, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(updated_at);
        age >= Duration::zero() && age < self.ttl
    }

    pub async fn read(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        force_refresh: bool,
    ) -> Option<MasterContext> {
        if force_refresh {
            debug!(user_id, "cache bypassed by force refresh");
            return None;
        }

        let entry = match self.store.get(user_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                warn!(user_id, error = %err, "context cache read failed");
                return None;
            }
        };

        if !self.is_fresh(entry.updated_at, now) {
            debug!(user_id, updated_at = %entry.updated_at, "cached context expired");
            return None;
        }

        match serde_json::from_str::<MasterContext>(&entry.context) {
            Ok(context) => Some(context),
            Err(err) => {
                warn!(user_id, error = %err, "cached context could not be decoded");
                None
            }
        }
    }

    pub async fn write(&self, user_id: &str, context: &MasterContext, now: DateTime<Utc>) {
        let payload = match serde_json::to_string(context) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(user_id, error = %err, "failed to serialize context for cache");
                return;
            }
        };
        if let Err(err) = self.store.set(user_id, payload, now).await {
            warn!(user_id, error = %err, "context cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap()
    }

    fn cache(ttl_seconds: u64) -> ContextCache {
        ContextCache::from_config(
            Arc::new(InMemoryCacheStore::new()),
            &CacheConfig {
                ttl_seconds,
                ..CacheConfig::default()
            },
        )
    }

    #[test]
    fn huge_ttl_saturates() {
        let cache = cache(u64::MAX);
        assert_eq!(cache.ttl(), Duration::MAX);
        assert!(cache.is_fresh(now() - Duration::days(3650), now()));
    }

    #[test]
    fn freshness_window_is_half_open() {
        let cache = cache(300);
        assert!(cache.is_fresh(now(), now()));
        assert!(cache.is_fresh(now() - Duration::seconds(299), now()));
        assert!(!cache.is_fresh(now() - Duration::seconds(300), now()));
    }

    #[test]
    fn future_stamped_entries_are_stale() {
        let cache = cache(300);
        assert!(!cache.is_fresh(now() + Duration::seconds(1), now()));
        assert!(!cache.is_fresh(now() + Duration::hours(1), now()));
    }

    #[tokio::test]
    async fn skewed_entry_is_a_miss() {
        let cache = cache(300);
        let context = MasterContext::cold_start("u1", now());
        cache.write("u1", &context, now() + Duration::minutes(2)).await;

        assert!(cache.read("u1", now(), false).await.is_none());
        assert!(cache.read("u1", now() + Duration::minutes(3), false).await.is_some());
    }
}
