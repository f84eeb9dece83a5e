//! Background pollers that keep lightweight views warm between full scans.
//!
//! - [`BonusMapPoller`] refreshes [`SharedBonusPoints`] from a [`BonusPointSource`].
//! - [`LatestBurnPoller`] watches the newest few signatures of the mint and publishes the
//!   most recent burn through [`LatestBurnTracker`].
//!
//! Both only ever add or replace state. A failed poll leaves the previous state in place.

use anyhow::{Context, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;
use log::{error, info, warn};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::burn_parser::BurnParser;
use crate::ledger_client::{LedgerClient, SignatureQuery};
use crate::sources::BonusPointSource;
use crate::types::{BonusPointMap, BurnEvent};
use crate::utils::now_unix_millis;

/// Bonus point map shared between the poller and scoring.
#[derive(Clone, Default)]
pub struct SharedBonusPoints {
    points: Arc<DashMap<String, i64>>,
    last_successful_update: Arc<AtomicI64>,
    consecutive_failures: Arc<AtomicU32>,
}

impl SharedBonusPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts new addresses and replaces changed values. Addresses missing from
    /// `incoming` are kept. Returns how many entries changed.
    pub fn merge(&self, incoming: BonusPointMap) -> usize {
        let mut changed = 0;
        for (address, points) in incoming {
            let previous = self.points.insert(address, points);
            if previous != Some(points) {
                changed += 1;
            }
        }
        changed
    }

    pub fn get(&self, address: &str) -> Option<i64> {
        self.points.get(address).map(|v| *v)
    }

    pub fn snapshot(&self) -> BonusPointMap {
        self.points
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Unix millis of the last successful refresh, 0 if none yet.
    pub fn last_successful_update(&self) -> i64 {
        self.last_successful_update.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    fn mark_success(&self) {
        self.last_successful_update
            .store(now_unix_millis(), Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn mark_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl BonusPointSource for SharedBonusPoints {
    async fn bonus_points(&self) -> Result<BonusPointMap> {
        Ok(self.snapshot())
    }
}

pub struct BonusMapPoller {
    source: Arc<dyn BonusPointSource>,
    shared: SharedBonusPoints,
    update_interval: Duration,
    cancel: CancellationToken,
}

impl BonusMapPoller {
    pub fn new(
        source: Arc<dyn BonusPointSource>,
        shared: SharedBonusPoints,
        update_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            shared,
            update_interval,
            cancel,
        }
    }

    pub async fn refresh_once(&self) -> Result<usize> {
        match self.source.bonus_points().await {
            Ok(map) => {
                let changed = self.shared.merge(map);
                self.shared.mark_success();
                Ok(changed)
            }
            Err(e) => {
                self.shared.mark_failure();
                Err(e)
            }
        }
    }

    /// Polls until the cancellation token fires. The first poll runs immediately.
    pub async fn start(self: Arc<Self>) {
        info!("🚀 Starting bonus map poller (interval {:?})", self.update_interval);
        let mut ticker = interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut iteration = 0u64;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("🛑 Bonus map poller stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }
            iteration += 1;

            match self.refresh_once().await {
                Ok(changed) => info!(
                    "✅ [Bonus #{}] {} entries, {} changed",
                    iteration,
                    self.shared.len(),
                    changed
                ),
                Err(e) => {
                    let failures = self.shared.consecutive_failures();
                    error!(
                        "❌ [Bonus #{}] Refresh failed (consecutive failures: {}): {:#}",
                        iteration, failures, e
                    );
                }
            }
        }
    }
}

/// The newest burn seen so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestBurn {
    pub address: String,
    pub event: BurnEvent,
}

#[derive(Clone, Default)]
pub struct LatestBurnTracker {
    latest: Arc<ArcSwapOption<LatestBurn>>,
}

impl LatestBurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the tracked burn if `burn` is at least as new and is a different
    /// transaction. Returns whether it was accepted.
    pub fn offer(&self, burn: LatestBurn) -> bool {
        let burn = Arc::new(burn);
        let mut accepted = false;
        // check and swap in one step so a concurrent older offer cannot land last
        self.latest.rcu(|current| {
            accepted = match current {
                Some(held) => {
                    burn.event.timestamp_unix_seconds >= held.event.timestamp_unix_seconds
                        && burn.event.transaction_id != held.event.transaction_id
                }
                None => true,
            };
            if accepted {
                Some(Arc::clone(&burn))
            } else {
                current.clone()
            }
        });
        accepted
    }

    pub fn latest(&self) -> Option<LatestBurn> {
        self.latest.load_full().map(|b| (*b).clone())
    }
}

pub struct LatestBurnPoller {
    client: Arc<dyn LedgerClient>,
    parser: BurnParser,
    tracker: LatestBurnTracker,
    limit: usize,
    update_interval: Duration,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl LatestBurnPoller {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        parser: BurnParser,
        tracker: LatestBurnTracker,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            parser,
            tracker,
            limit: 10,
            update_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(12),
            cancel,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// One poll: newest `limit` signatures, their bodies, newest burn among them.
    /// Returns the burn if the tracker accepted it.
    pub async fn poll_once(&self) -> Result<Option<LatestBurn>> {
        let query = SignatureQuery {
            limit: self.limit,
            before: None,
        };
        let page = timeout(
            self.request_timeout,
            self.client.list_signatures(self.parser.mint(), query),
        )
        .await
        .context("Latest signatures request timed out")??;
        if page.is_empty() {
            return Ok(None);
        }

        let signatures: Vec<String> = page.into_iter().map(|s| s.signature).collect();
        let transactions = timeout(
            self.request_timeout,
            self.client.get_parsed_transactions(&signatures),
        )
        .await
        .context("Latest transactions request timed out")??;

        let newest = transactions
            .iter()
            .flatten()
            .flat_map(|tx| self.parser.extract_burns(tx))
            .max_by_key(|(_, event)| event.timestamp_unix_seconds);

        Ok(newest.and_then(|(address, event)| {
            let burn = LatestBurn { address, event };
            self.tracker.offer(burn.clone()).then_some(burn)
        }))
    }

    pub async fn start(self: Arc<Self>) {
        info!(
            "🚀 Starting latest burn poller (limit {}, interval {:?})",
            self.limit, self.update_interval
        );
        let mut ticker = interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("🛑 Latest burn poller stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.poll_once().await {
                Ok(Some(burn)) => info!(
                    "🔥 New latest burn: {} burned {} ({})",
                    burn.address, burn.event.amount, burn.event.transaction_id
                ),
                Ok(None) => {}
                Err(e) => warn!("⚠️ Latest burn poll failed: {:#}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticSources;
    use rust_decimal::Decimal;

    fn burn(address: &str, ts: i64, tx: &str) -> LatestBurn {
        LatestBurn {
            address: address.to_string(),
            event: BurnEvent {
                amount: Decimal::ONE,
                timestamp_unix_seconds: ts,
                transaction_id: tx.to_string(),
            },
        }
    }

    #[test]
    fn test_merge_only_adds_or_replaces() {
        let shared = SharedBonusPoints::new();
        shared.merge(BonusPointMap::from([
            ("a".to_string(), 1),
            ("b".to_string(), 2),
        ]));
        let changed = shared.merge(BonusPointMap::from([
            ("b".to_string(), 2),
            ("c".to_string(), 3),
        ]));
        assert_eq!(changed, 1);
        assert_eq!(shared.len(), 3);
        assert_eq!(shared.get("a"), Some(1));
    }

    #[tokio::test]
    async fn test_bonus_poller_refresh_once() {
        let source = Arc::new(StaticSources {
            bonus_points: BonusPointMap::from([("x".to_string(), 50)]),
            ..Default::default()
        });
        let shared = SharedBonusPoints::new();
        let poller = BonusMapPoller::new(
            source,
            shared.clone(),
            Duration::from_secs(300),
            CancellationToken::new(),
        );
        assert_eq!(poller.refresh_once().await.unwrap(), 1);
        assert_eq!(shared.bonus_points().await.unwrap().get("x"), Some(&50));
        assert!(shared.last_successful_update() > 0);
    }

    #[tokio::test]
    async fn test_bonus_poller_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let poller = Arc::new(BonusMapPoller::new(
            Arc::new(StaticSources::default()),
            SharedBonusPoints::new(),
            Duration::from_millis(10),
            cancel.clone(),
        ));
        let handle = tokio::spawn(poller.start());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_tracker_never_rolls_back() {
        let tracker = LatestBurnTracker::new();
        assert!(tracker.offer(burn("a", 100, "t1")));
        assert!(!tracker.offer(burn("b", 90, "t0")));
        assert!(!tracker.offer(burn("a", 100, "t1")));
        assert!(tracker.offer(burn("c", 100, "t2")));
        assert_eq!(tracker.latest().unwrap().address, "c");
    }

    #[test]
    fn test_tracker_concurrent_offers_keep_newest() {
        let tracker = LatestBurnTracker::new();
        std::thread::scope(|scope| {
            for t in 0..8i64 {
                let tracker = tracker.clone();
                scope.spawn(move || {
                    for i in 0..500i64 {
                        let ts = i * 8 + t;
                        tracker.offer(burn("w", ts, &format!("tx-{}", ts)));
                    }
                });
            }
        });
        let latest = tracker.latest().unwrap();
        assert_eq!(latest.event.timestamp_unix_seconds, 499 * 8 + 7);
        assert_eq!(latest.event.transaction_id, "tx-3999");
    }
}
