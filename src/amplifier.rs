//! # Amplifier Windows
//!
//! Challenge periods grant a stackable percentage bonus ("AMP") on burn points earned
//! inside their time window. This module turns raw period records into normalized
//! [`AmplifierWindow`]s and scores an address's burn history against them.
//!
//! ## Tier rates
//!
//! | tier | bonus |
//! |------|-------|
//! | 0    | 0%    |
//! | 1    | 1.50% |
//! | 2    | 3.50% |
//! | 3    | 5.50% |
//! | 4    | 8.88% |
//!
//! Every tier whose burn target is met within the window adds its rate. A target of
//! zero is always met.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::conversions::{floor_to_points, round_percent, POINTS_PER_TOKEN};
use crate::types::{sum_amounts, BurnEvent};
use crate::utils::RawTimestamp;

/// Bonus percent per challenge tier.
pub const TIER_RATES: [Decimal; 5] = [
    Decimal::ZERO,
    Decimal::from_parts(150, 0, 0, false, 2),
    Decimal::from_parts(350, 0, 0, false, 2),
    Decimal::from_parts(550, 0, 0, false, 2),
    Decimal::from_parts(888, 0, 0, false, 2),
];

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Rate for a tier number; anything outside the table earns nothing.
pub fn tier_rate(tier: i64) -> Decimal {
    usize::try_from(tier)
        .ok()
        .and_then(|idx| TIER_RATES.get(idx).copied())
        .unwrap_or(Decimal::ZERO)
}

/// A challenge as configured: tier number plus burn target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChallenge {
    pub tier: i64,
    #[serde(default)]
    pub target: Decimal,
}

/// The period currently configured by operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPeriodConfig {
    pub status: String,
    #[serde(default)]
    pub start_date: Option<RawTimestamp>,
    #[serde(default)]
    pub end_date: Option<RawTimestamp>,
    #[serde(default)]
    pub week_id: String,
    #[serde(default)]
    pub challenges: Vec<RawChallenge>,
}

impl CurrentPeriodConfig {
    pub fn is_active(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("active")
    }
}

/// A finished (or stopped) period from the period log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPeriodRecord {
    #[serde(default)]
    pub start_date: Option<RawTimestamp>,
    #[serde(default)]
    pub end_date: Option<RawTimestamp>,
    #[serde(default)]
    pub stopped_at: Option<RawTimestamp>,
    #[serde(default)]
    pub week_id: String,
    #[serde(default)]
    pub challenges: Vec<RawChallenge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeTier {
    pub tier: i64,
    pub target: Decimal,
    pub amp_percent: Decimal,
}

/// A bounded (or open) time range with its tier table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmplifierWindow {
    pub week_id: String,
    pub start_ts: i64,
    /// `None` is an open, ongoing window.
    pub end_ts: Option<i64>,
    pub total_amp_percent: Decimal,
    /// Sorted ascending by target.
    pub tiers: Vec<ChallengeTier>,
}

impl AmplifierWindow {
    /// `[start_ts, end_ts]`, inclusive on both ends.
    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start_ts && self.end_ts.map_or(true, |end| ts <= end)
    }

    pub fn is_open(&self) -> bool {
        self.end_ts.is_none()
    }

    /// Still running at `now`.
    pub fn is_live_at(&self, now: i64) -> bool {
        self.end_ts.map_or(true, |end| end >= now)
    }

    /// Sum of event amounts that fall inside the window.
    pub fn burned_within(&self, events: &[BurnEvent]) -> Decimal {
        sum_amounts(events.iter().filter(|e| self.contains(e.timestamp_unix_seconds)))
    }

    /// Stacked percent of every tier met by `window_burned`.
    pub fn earned_percent(&self, window_burned: Decimal) -> Decimal {
        let earned: Decimal = self
            .tiers
            .iter()
            .filter(|t| t.target <= Decimal::ZERO || window_burned >= t.target)
            .map(|t| t.amp_percent)
            .sum();
        round_percent(earned)
    }
}

fn map_tiers(challenges: &[RawChallenge]) -> (Vec<ChallengeTier>, Decimal) {
    let mut tiers: Vec<ChallengeTier> = challenges
        .iter()
        .map(|c| ChallengeTier {
            tier: c.tier,
            target: c.target,
            amp_percent: tier_rate(c.tier),
        })
        .collect();
    tiers.sort_by(|a, b| a.target.cmp(&b.target));
    let total = round_percent(tiers.iter().map(|t| t.amp_percent).sum());
    (tiers, total)
}

/// Builds windows from the period log plus the current period, historical first.
/// Records with unusable timestamps or no positive bonus are dropped.
pub fn build_windows(
    historical: &[HistoricalPeriodRecord],
    current: Option<&CurrentPeriodConfig>,
) -> Vec<AmplifierWindow> {
    let mut windows = Vec::with_capacity(historical.len() + 1);

    for record in historical {
        if record.challenges.is_empty() {
            continue;
        }
        let (tiers, total) = map_tiers(&record.challenges);
        if total <= Decimal::ZERO {
            debug!("Dropping period {}: no positive tier bonus", record.week_id);
            continue;
        }
        let start = record.start_date.as_ref().and_then(RawTimestamp::resolve);
        let end = record
            .stopped_at
            .as_ref()
            .and_then(RawTimestamp::resolve)
            .or_else(|| record.end_date.as_ref().and_then(RawTimestamp::resolve));
        let (Some(start_ts), Some(end_ts)) = (start, end) else {
            debug!("Dropping period {}: unresolvable start/stop time", record.week_id);
            continue;
        };
        windows.push(AmplifierWindow {
            week_id: record.week_id.clone(),
            start_ts,
            end_ts: Some(end_ts),
            total_amp_percent: total,
            tiers,
        });
    }

    if let Some(config) = current {
        if config.is_active() && !config.challenges.is_empty() {
            let (tiers, total) = map_tiers(&config.challenges);
            let start = config.start_date.as_ref().and_then(RawTimestamp::resolve);
            match start {
                Some(start_ts) if total > Decimal::ZERO => windows.push(AmplifierWindow {
                    week_id: config.week_id.clone(),
                    start_ts,
                    end_ts: config.end_date.as_ref().and_then(RawTimestamp::resolve),
                    total_amp_percent: total,
                    tiers,
                }),
                _ => debug!("Dropping current period {}: invalid start or bonus", config.week_id),
            }
        }
    }

    windows
}

/// Bonus earned in one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowBonus {
    pub week_id: String,
    pub amp_percent: Decimal,
    pub week_burned: Decimal,
    pub bonus_pts: i64,
}

/// Result of scoring one address against all windows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmpScore {
    pub total_bonus_points: i64,
    /// Earned percent in the live window, for display.
    pub current_amp_percent: Decimal,
    /// Configured ceiling of the live window.
    pub max_amp_percent: Decimal,
    pub breakdown: Vec<WindowBonus>,
}

/// Scores `events` against every window. `now` only selects the live window for
/// `current_amp_percent`/`max_amp_percent`; it never changes `total_bonus_points`.
pub fn score_amplifier_bonus(events: &[BurnEvent], windows: &[AmplifierWindow], now: i64) -> AmpScore {
    if windows.is_empty() || events.is_empty() {
        return AmpScore::default();
    }

    let mut score = AmpScore::default();
    for window in windows {
        let window_burned = window.burned_within(events);
        if window_burned <= Decimal::ZERO {
            continue;
        }
        let earned = window.earned_percent(window_burned);
        if earned <= Decimal::ZERO {
            continue;
        }
        let bonus_pts = floor_to_points(
            window_burned
                .saturating_mul(POINTS_PER_TOKEN)
                .saturating_mul(earned)
                / ONE_HUNDRED,
        );
        score.total_bonus_points = score.total_bonus_points.saturating_add(bonus_pts);
        score.breakdown.push(WindowBonus {
            week_id: window.week_id.clone(),
            amp_percent: earned,
            week_burned: window_burned,
            bonus_pts,
        });
    }

    if let Some(live) = active_window(windows, now) {
        let live_burned = live.burned_within(events);
        if live_burned > Decimal::ZERO {
            score.current_amp_percent = live.earned_percent(live_burned);
        }
        score.max_amp_percent = live.total_amp_percent;
    }

    score
}

/// The last window still running at `now`.
pub fn active_window(windows: &[AmplifierWindow], now: i64) -> Option<&AmplifierWindow> {
    windows.iter().rev().find(|w| w.is_live_at(now))
}
