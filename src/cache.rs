use arc_swap::ArcSwapOption;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::snapshot_store::{MemorySnapshotStore, SnapshotStore, StoredSlot};
use crate::types::{
    LeaderboardSnapshot, MarketSnapshot, PersistedSnapshot, RankedEntry, SlimEntry, SnapshotSource,
};
use crate::utils::now_unix_millis;

pub const DEFAULT_LEADERBOARD_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_MARKET_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_SLOT_KEY: &str = "leaderboard:snapshot";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub leaderboard_ttl: Duration,
    pub market_ttl: Duration,
    /// Key of the persisted tier's slot.
    pub slot_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            leaderboard_ttl: DEFAULT_LEADERBOARD_TTL,
            market_ttl: DEFAULT_MARKET_TTL,
            slot_key: DEFAULT_SLOT_KEY.to_string(),
        }
    }
}

struct CachedEntries {
    entries: Vec<RankedEntry>,
    captured_at_unix_millis: i64,
}

/// Two-tier leaderboard cache.
///
/// The memory tier holds the full ranked list (event history included) and is swapped
/// atomically. The persisted tier holds a slim projection behind a [`SnapshotStore`] and
/// survives restarts. Both tiers expire after `leaderboard_ttl`; a snapshot is fresh only
/// while `now - captured_at < ttl`. Writes are advisory: a failing persisted write is
/// logged and otherwise ignored.
///
/// The most recent market price is kept alongside, with its own shorter TTL. Nothing in
/// this crate fetches prices: the embedding application publishes them through
/// [`LeaderboardCache::put_market`]. Prices are display only and never feed scoring.
pub struct LeaderboardCache {
    memory: ArcSwapOption<CachedEntries>,
    market: ArcSwapOption<MarketSnapshot>,
    store: Arc<dyn SnapshotStore>,
    config: CacheConfig,
}

impl LeaderboardCache {
    pub fn new(store: Arc<dyn SnapshotStore>, config: CacheConfig) -> Self {
        Self {
            memory: ArcSwapOption::empty(),
            market: ArcSwapOption::empty(),
            store,
            config,
        }
    }

    /// Cache with default TTLs over a process-local persisted tier.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySnapshotStore::new()), CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn get(&self) -> Option<LeaderboardSnapshot> {
        self.get_at(now_unix_millis()).await
    }

    /// Memory tier first, then the persisted tier. A fresh persisted hit warms the
    /// memory tier with the slim entries it carries.
    pub async fn get_at(&self, now_ms: i64) -> Option<LeaderboardSnapshot> {
        let ttl_ms = duration_millis(self.config.leaderboard_ttl);

        if let Some(cached) = self.memory.load_full() {
            if is_fresh(cached.captured_at_unix_millis, now_ms, ttl_ms) {
                metrics::increment_cache_hit("memory");
                return Some(LeaderboardSnapshot {
                    entries: cached.entries.clone(),
                    captured_at_unix_millis: cached.captured_at_unix_millis,
                    source: SnapshotSource::Memory,
                });
            }
        }
        metrics::increment_cache_miss("memory");

        let persisted = match self.read_persisted().await {
            Some(snapshot) => snapshot,
            None => {
                metrics::increment_cache_miss("persisted");
                return None;
            }
        };
        if !is_fresh(persisted.captured_at_unix_millis, now_ms, ttl_ms) {
            debug!(
                "Persisted snapshot from {} is stale at {}",
                persisted.captured_at_unix_millis, now_ms
            );
            metrics::increment_cache_miss("persisted");
            return None;
        }
        metrics::increment_cache_hit("persisted");

        let entries: Vec<RankedEntry> = persisted.entries.into_iter().map(RankedEntry::from).collect();
        self.memory.store(Some(Arc::new(CachedEntries {
            entries: entries.clone(),
            captured_at_unix_millis: persisted.captured_at_unix_millis,
        })));

        Some(LeaderboardSnapshot {
            entries,
            captured_at_unix_millis: persisted.captured_at_unix_millis,
            source: SnapshotSource::Persisted,
        })
    }

    async fn read_persisted(&self) -> Option<PersistedSnapshot> {
        let slot = match self.store.read_slot(&self.config.slot_key).await {
            Ok(Some(slot)) => slot,
            Ok(None) => return None,
            Err(e) => {
                warn!("⚠️ Persisted tier ({}) read failed: {}", self.store.name(), e);
                return None;
            }
        };
        match serde_json::from_str::<PersistedSnapshot>(&slot.payload) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("⚠️ Discarding unreadable persisted snapshot: {}", e);
                None
            }
        }
    }

    pub async fn put(&self, entries: &[RankedEntry]) {
        self.put_at(entries, now_unix_millis()).await
    }

    /// Replaces both tiers. The memory tier is swapped before the persisted write starts.
    pub async fn put_at(&self, entries: &[RankedEntry], now_ms: i64) {
        self.memory.store(Some(Arc::new(CachedEntries {
            entries: entries.to_vec(),
            captured_at_unix_millis: now_ms,
        })));

        let snapshot = PersistedSnapshot {
            entries: entries.iter().map(SlimEntry::from).collect(),
            captured_at_unix_millis: now_ms,
        };
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("⚠️ Could not serialize leaderboard snapshot: {}", e);
                return;
            }
        };
        let slot = StoredSlot {
            payload,
            captured_at_unix_millis: now_ms,
        };
        match self.store.write_slot(&self.config.slot_key, slot).await {
            Ok(()) => debug!(
                "💾 Cached {} leaderboard entries ({} tier)",
                entries.len(),
                self.store.name()
            ),
            Err(e) => warn!("⚠️ Persisted tier ({}) write failed: {}", self.store.name(), e),
        }
    }

    /// Drops the memory tier. The persisted tier is left alone.
    pub fn invalidate_memory(&self) {
        self.memory.store(None);
    }

    /// Publishes a price snapshot supplied by the embedding application.
    pub fn put_market(&self, snapshot: MarketSnapshot) {
        self.market.store(Some(Arc::new(snapshot)));
    }

    pub fn market(&self) -> Option<MarketSnapshot> {
        self.market_at(now_unix_millis())
    }

    pub fn market_at(&self, now_ms: i64) -> Option<MarketSnapshot> {
        let ttl_ms = duration_millis(self.config.market_ttl);
        match self.market.load_full() {
            Some(snapshot) if is_fresh(snapshot.captured_at_unix_millis, now_ms, ttl_ms) => {
                metrics::increment_cache_hit("market");
                Some(*snapshot)
            }
            _ => {
                metrics::increment_cache_miss("market");
                None
            }
        }
    }
}

fn is_fresh(captured_at_ms: i64, now_ms: i64, ttl_ms: i64) -> bool {
    now_ms.saturating_sub(captured_at_ms) < ttl_ms
}

fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
