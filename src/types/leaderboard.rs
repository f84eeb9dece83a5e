use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::conversions::base_points;

/// A single burn instruction attributed to an authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnEvent {
    pub amount: Decimal,
    pub timestamp_unix_seconds: i64,
    pub transaction_id: String,
}

/// Per-address accumulation built up while scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressAggregate {
    pub burned: Decimal,
    pub tx_count: u64,
    pub events: Vec<BurnEvent>,
}

impl AddressAggregate {
    pub fn record(&mut self, event: BurnEvent) {
        self.burned = self.burned.saturating_add(event.amount);
        self.tx_count += 1;
        self.events.push(event);
    }

    /// Rebuilds an aggregate from an already filtered event list.
    pub fn from_events(events: Vec<BurnEvent>) -> Self {
        let burned = sum_amounts(&events);
        Self {
            burned,
            tx_count: events.len() as u64,
            events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Sum of event amounts, saturating at `Decimal::MAX`.
pub fn sum_amounts<'a>(events: impl IntoIterator<Item = &'a BurnEvent>) -> Decimal {
    events
        .into_iter()
        .fold(Decimal::ZERO, |acc, e| acc.saturating_add(e.amount))
}

/// Aggregates keyed by participant address, in first-seen order.
pub type AggregateMap = IndexMap<String, AddressAggregate>;

/// Externally curated `address -> points` bonuses ("lab work").
pub type BonusPointMap = HashMap<String, i64>;

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub address: String,
    pub burned: Decimal,
    pub tx_count: u64,
    #[serde(default)]
    pub events: Vec<BurnEvent>,
    pub points: i64,
    pub amp_percent: Decimal,
    pub amp_bonus_points: i64,
    #[serde(default)]
    pub amp_week_id: String,
    #[serde(default)]
    pub current_amp_percent: Decimal,
    #[serde(default)]
    pub max_amp_percent: Decimal,
    pub lab_work_points: Option<i64>,
}

impl RankedEntry {
    /// `floor(burned × 1.888)`
    pub fn base_points(&self) -> i64 {
        base_points(self.burned)
    }

    /// USD value of the burned amount. Display only; never feeds scoring.
    pub fn usd_value(&self, market: &MarketSnapshot) -> Decimal {
        self.burned.saturating_mul(market.price_usd)
    }
}

/// Projection persisted by the slow cache tier. Event history is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlimEntry {
    pub address: String,
    pub points: i64,
    pub burned: Decimal,
    pub tx_count: u64,
    pub amp_percent: Decimal,
    pub amp_bonus_points: i64,
    pub lab_work_points: Option<i64>,
}

impl From<&RankedEntry> for SlimEntry {
    fn from(entry: &RankedEntry) -> Self {
        Self {
            address: entry.address.clone(),
            points: entry.points,
            burned: entry.burned,
            tx_count: entry.tx_count,
            amp_percent: entry.amp_percent,
            amp_bonus_points: entry.amp_bonus_points,
            lab_work_points: entry.lab_work_points,
        }
    }
}

impl From<SlimEntry> for RankedEntry {
    fn from(slim: SlimEntry) -> Self {
        Self {
            address: slim.address,
            burned: slim.burned,
            tx_count: slim.tx_count,
            events: Vec::new(),
            points: slim.points,
            amp_percent: slim.amp_percent,
            amp_bonus_points: slim.amp_bonus_points,
            amp_week_id: String::new(),
            current_amp_percent: Decimal::ZERO,
            max_amp_percent: Decimal::ZERO,
            lab_work_points: slim.lab_work_points,
        }
    }
}

/// Where a cached snapshot was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Memory,
    Persisted,
}

/// Timestamped copy of the ranked list.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardSnapshot {
    pub entries: Vec<RankedEntry>,
    pub captured_at_unix_millis: i64,
    pub source: SnapshotSource,
}

/// Serialized payload of the persisted tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub entries: Vec<SlimEntry>,
    pub captured_at_unix_millis: i64,
}

/// Token price used for USD display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub price_usd: Decimal,
    pub captured_at_unix_millis: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn event(amount: &str, ts: i64) -> BurnEvent {
        BurnEvent {
            amount: Decimal::from_str(amount).unwrap(),
            timestamp_unix_seconds: ts,
            transaction_id: format!("sig-{}", ts),
        }
    }

    #[test]
    fn test_aggregate_record_accumulates() {
        let mut agg = AddressAggregate::default();
        agg.record(event("10.5", 1));
        agg.record(event("4.5", 2));
        assert_eq!(agg.burned, Decimal::from(15));
        assert_eq!(agg.tx_count, 2);
        assert_eq!(agg.events.len(), 2);
    }

    #[test]
    fn test_from_events_recomputes_totals() {
        let agg = AddressAggregate::from_events(vec![event("1", 1), event("2", 2)]);
        assert_eq!(agg.burned, Decimal::from(3));
        assert_eq!(agg.tx_count, 2);
    }

    #[test]
    fn test_slim_projection_drops_history() {
        let entry = RankedEntry {
            address: "X".to_string(),
            burned: Decimal::from(1000),
            tx_count: 1,
            events: vec![event("1000", 0)],
            points: 1888,
            amp_percent: Decimal::ZERO,
            amp_bonus_points: 0,
            amp_week_id: "w1".to_string(),
            current_amp_percent: Decimal::ZERO,
            max_amp_percent: Decimal::ZERO,
            lab_work_points: None,
        };
        let restored = RankedEntry::from(SlimEntry::from(&entry));
        assert!(restored.events.is_empty());
        assert_eq!(restored.points, entry.points);
        assert_eq!(restored.burned, entry.burned);
    }

    #[test]
    fn test_usd_value() {
        let entry = RankedEntry::from(SlimEntry {
            address: "X".to_string(),
            points: 1,
            burned: Decimal::from(200),
            tx_count: 1,
            amp_percent: Decimal::ZERO,
            amp_bonus_points: 0,
            lab_work_points: None,
        });
        let market = MarketSnapshot {
            price_usd: Decimal::from_str("0.25").unwrap(),
            captured_at_unix_millis: 0,
        };
        assert_eq!(entry.usd_value(&market), Decimal::from(50));
    }
}
