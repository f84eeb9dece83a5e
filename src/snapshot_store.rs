//! Persisted tier storage for the leaderboard cache.
//!
//! A store keeps opaque slots under string keys. The cache decides what goes in a
//! slot; a store only promises that whatever it returns was written by a single
//! `write_slot` call (no torn reads).

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "redis")]
use redis::aio::ConnectionManager;
#[cfg(feature = "redis")]
use redis::AsyncCommands;

/// One stored slot. `payload` is the serialized snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSlot {
    pub payload: String,
    pub captured_at_unix_millis: i64,
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read_slot(&self, key: &str) -> Result<Option<StoredSlot>, SnapshotStoreError>;

    async fn write_slot(&self, key: &str, slot: StoredSlot) -> Result<(), SnapshotStoreError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Process-local store. Mostly useful for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slots: DashMap<String, StoredSlot>,
    writes: AtomicU64,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Overwrites a slot directly, bypassing the trait.
    pub fn insert_raw(&self, key: &str, slot: StoredSlot) {
        self.slots.insert(key.to_string(), slot);
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read_slot(&self, key: &str) -> Result<Option<StoredSlot>, SnapshotStoreError> {
        Ok(self.slots.get(key).map(|slot| slot.clone()))
    }

    async fn write_slot(&self, key: &str, slot: StoredSlot) -> Result<(), SnapshotStoreError> {
        self.slots.insert(key.to_string(), slot);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Stores each slot as a JSON file under `base_path`.
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    base_path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            base_path: path.as_ref().to_path_buf(),
        }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.slot.json", file_name))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn read_slot(&self, key: &str) -> Result<Option<StoredSlot>, SnapshotStoreError> {
        let path = self.slot_path(key);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    async fn write_slot(&self, key: &str, slot: StoredSlot) -> Result<(), SnapshotStoreError> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        let path = self.slot_path(key);
        // write-then-rename so readers never observe a partial file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&slot)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("💾 Wrote snapshot slot {} to {}", key, path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Redis-backed store. Slots are bincode-encoded and expire after `ttl_seconds`.
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisSnapshotStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

#[cfg(feature = "redis")]
impl RedisSnapshotStore {
    pub async fn connect(url: &str, ttl_seconds: u64) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = redis::Client::open(url).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        log::info!("✅ Redis snapshot store connected to {}", url);
        Ok(Self { conn, ttl_seconds })
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn read_slot(&self, key: &str) -> Result<Option<StoredSlot>, SnapshotStoreError> {
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = conn.get(key).await?;
        match bytes {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_slot(&self, key: &str, slot: StoredSlot) -> Result<(), SnapshotStoreError> {
        let bytes = bincode::serialize(&slot)?;
        let mut conn = self.conn.clone();
        // SET EX replaces the slot in one command
        conn.set_ex::<_, _, ()>(key, bytes, self.ttl_seconds).await?;
        debug!("💾 Wrote snapshot slot {} to redis", key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(payload: &str, at: i64) -> StoredSlot {
        StoredSlot {
            payload: payload.to_string(),
            captured_at_unix_millis: at,
        }
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemorySnapshotStore::new();
        assert_eq!(store.read_slot("k").await.unwrap(), None);
        store.write_slot("k", slot("a", 1)).await.unwrap();
        store.write_slot("k", slot("b", 2)).await.unwrap();
        assert_eq!(store.read_slot("k").await.unwrap(), Some(slot("b", 2)));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested"));
        assert_eq!(store.read_slot("leaderboard:snapshot").await.unwrap(), None);

        store
            .write_slot("leaderboard:snapshot", slot("[1,2]", 42))
            .await
            .unwrap();
        let read = store.read_slot("leaderboard:snapshot").await.unwrap();
        assert_eq!(read, Some(slot("[1,2]", 42)));
        assert!(dir.path().join("nested/leaderboard_snapshot.slot.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        std::fs::write(dir.path().join("k.slot.json"), b"{not json").unwrap();
        assert!(matches!(
            store.read_slot("k").await,
            Err(SnapshotStoreError::Serialization(_))
        ));
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    #[ignore] // needs a local redis
    async fn test_redis_store_roundtrip() {
        let store = RedisSnapshotStore::connect("redis://localhost:6379", 60)
            .await
            .unwrap();
        store.write_slot("test:leaderboard", slot("[]", 7)).await.unwrap();
        assert_eq!(
            store.read_slot("test:leaderboard").await.unwrap(),
            Some(slot("[]", 7))
        );
    }
}
