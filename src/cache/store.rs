use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::config::CacheConfig;
use crate::error::CacheError;

/// One stored entry: the serialized context and when it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedContext {
    pub context: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<CachedContext>, CacheError>;

    async fn set(
        &self,
        user_id: &str,
        context: String,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CacheError>;
}

#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CachedContext>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, user_id: &str) -> Result<Option<CachedContext>, CacheError> {
        Ok(self.entries.read().await.get(user_id).cloned())
    }

    async fn set(
        &self,
        user_id: &str,
        context: String,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.entries.write().await.insert(
            user_id.to_string(),
            CachedContext {
                context,
                updated_at,
            },
        );
        Ok(())
    }
}

/// One JSON file per user under a directory.
///
/// File names are the SHA-256 of the user id so arbitrary ids map to safe
/// paths. Writes go through a temp file and a rename.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(PathBuf::from(&config.dir))
    }

    pub fn entry_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(user_id)))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, user_id: &str) -> Result<Option<CachedContext>, CacheError> {
        let path = self.entry_path(user_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if data.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn set(
        &self,
        user_id: &str,
        context: String,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        ensure_dir(&self.dir).await?;
        let path = self.entry_path(user_id);
        let payload = serde_json::to_string(&CachedContext {
            context,
            updated_at,
        })?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

pub fn cache_key(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

async fn ensure_dir(path: &Path) -> Result<(), CacheError> {
    if path.exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cache_key_is_stable_hex() {
        let key = cache_key("user/../1");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key("user/../1"));
        assert_ne!(key, cache_key("user-1"));
    }

    #[tokio::test]
    async fn in_memory_overwrites() {
        let store = InMemoryCacheStore::new();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        store.set("u", "{}".to_string(), at).await.unwrap();
        store.set("u", "{\"v\":2}".to_string(), at).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("u").await.unwrap().unwrap().context, "{\"v\":2}");
        assert!(store.get("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap();
        FileCacheStore::new(dir.path().join("cache"))
            .set("user-1", "{\"ok\":true}".to_string(), at)
            .await
            .unwrap();

        let reopened = FileCacheStore::new(dir.path().join("cache"));
        let entry = reopened.get("user-1").await.unwrap().unwrap();
        assert_eq!(entry.context, "{\"ok\":true}");
        assert_eq!(entry.updated_at, at);
        assert!(reopened.get("user-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().to_path_buf());
        std::fs::write(store.entry_path("u"), "not json").unwrap();
        assert!(matches!(
            store.get("u").await,
            Err(CacheError::Serialization(_))
        ));
    }
}
