//! # Scoring Engine
//!
//! Merges burn aggregates, amplifier windows and externally awarded bonus points into a
//! ranked leaderboard. `build_entries` is pure: the same inputs always produce the same
//! ordered output, and the engine knows nothing about date ranges. Restricted views
//! (e.g. weekly) pre-filter the aggregates with [`restrict_to_range`] first.
//!
//! ```text
//! points = floor(burned × 1.888) + ampBonusPoints + labWorkPoints
//! ```

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::amplifier::{score_amplifier_bonus, AmplifierWindow};
use crate::types::conversions::base_points;
use crate::types::{AddressAggregate, AggregateMap, BonusPointMap, RankedEntry};

/// Everything besides the aggregates that scoring needs.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub windows: Vec<AmplifierWindow>,
    pub bonus_points: BonusPointMap,
    /// Unix seconds used to pick the live amplifier window.
    pub now: i64,
}

impl ScoringContext {
    pub fn new(windows: Vec<AmplifierWindow>, bonus_points: BonusPointMap, now: i64) -> Self {
        Self {
            windows,
            bonus_points,
            now,
        }
    }

    pub fn score(&self, aggregates: &AggregateMap) -> Vec<RankedEntry> {
        build_entries(aggregates, &self.windows, &self.bonus_points, self.now)
    }
}

/// Builds the ranked leaderboard.
///
/// Entries with `points <= 0` are dropped. Output is sorted by `points` descending,
/// ties broken by `address` ascending.
pub fn build_entries(
    aggregates: &AggregateMap,
    windows: &[AmplifierWindow],
    bonus_points: &BonusPointMap,
    now: i64,
) -> Vec<RankedEntry> {
    let mut entries = Vec::with_capacity(aggregates.len() + bonus_points.len());
    let mut scored: HashSet<&str> = HashSet::with_capacity(aggregates.len());

    for (address, aggregate) in aggregates {
        if aggregate.is_empty() {
            continue;
        }
        scored.insert(address.as_str());

        let amp = score_amplifier_bonus(&aggregate.events, windows, now);
        let bonus = bonus_points.get(address).copied().unwrap_or(0);
        let points = base_points(aggregate.burned)
            .saturating_add(amp.total_bonus_points)
            .saturating_add(bonus);
        let (amp_percent, amp_week_id) = amp
            .breakdown
            .last()
            .map(|last| (last.amp_percent, last.week_id.clone()))
            .unwrap_or((Decimal::ZERO, String::new()));

        entries.push(RankedEntry {
            address: address.clone(),
            burned: aggregate.burned,
            tx_count: aggregate.tx_count,
            events: aggregate.events.clone(),
            points,
            amp_percent,
            amp_bonus_points: amp.total_bonus_points,
            amp_week_id,
            current_amp_percent: amp.current_amp_percent,
            max_amp_percent: amp.max_amp_percent,
            lab_work_points: (bonus != 0).then_some(bonus),
        });
    }

    for (address, &bonus) in bonus_points {
        if bonus <= 0 || scored.contains(address.as_str()) {
            continue;
        }
        entries.push(RankedEntry {
            address: address.clone(),
            burned: Decimal::ZERO,
            tx_count: 0,
            events: Vec::new(),
            points: bonus,
            amp_percent: Decimal::ZERO,
            amp_bonus_points: 0,
            amp_week_id: String::new(),
            current_amp_percent: Decimal::ZERO,
            max_amp_percent: Decimal::ZERO,
            lab_work_points: Some(bonus),
        });
    }

    entries.retain(|e| e.points > 0);
    entries.sort_by(rank_order);
    entries
}

fn rank_order(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| a.address.cmp(&b.address))
}

/// Keeps only events inside `[start_ts, end_ts]` and re-derives `burned`/`tx_count`.
/// Addresses left without events are dropped.
pub fn restrict_to_range(aggregates: &AggregateMap, start_ts: i64, end_ts: i64) -> AggregateMap {
    aggregates
        .iter()
        .filter_map(|(address, aggregate)| {
            let events: Vec<_> = aggregate
                .events
                .iter()
                .filter(|e| e.timestamp_unix_seconds >= start_ts && e.timestamp_unix_seconds <= end_ts)
                .cloned()
                .collect();
            (!events.is_empty()).then(|| (address.clone(), AddressAggregate::from_events(events)))
        })
        .collect()
}

/// Leaderboard restricted to `[start_ts, end_ts]`.
pub fn build_weekly_entries(
    aggregates: &AggregateMap,
    start_ts: i64,
    end_ts: i64,
    context: &ScoringContext,
) -> Vec<RankedEntry> {
    context.score(&restrict_to_range(aggregates, start_ts, end_ts))
}
