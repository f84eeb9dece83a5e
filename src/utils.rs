// src/utils.rs
// Utility functions for the Burn Leaderboard SDK

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Integers at or above this are treated as milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Length of a Solana public key in bytes.
const PUBKEY_LEN: usize = 32;

pub fn now_unix_seconds() -> i64 {
    Utc::now().timestamp()
}

pub fn now_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A date as it arrives from period configuration: unix seconds or millis, or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawTimestamp {
    /// Resolves to unix seconds. `None` when the value is unparseable or not positive.
    pub fn resolve(&self) -> Option<i64> {
        let seconds = match self {
            RawTimestamp::Integer(value) => normalize_epoch(*value),
            RawTimestamp::Float(value) if value.is_finite() => normalize_epoch(value.trunc() as i64),
            RawTimestamp::Float(_) => return None,
            RawTimestamp::Text(text) => parse_timestamp_text(text)?,
        };
        (seconds > 0).then_some(seconds)
    }
}

impl From<i64> for RawTimestamp {
    fn from(value: i64) -> Self {
        RawTimestamp::Integer(value)
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

fn normalize_epoch(value: i64) -> i64 {
    if value >= MILLIS_THRESHOLD {
        value / 1000
    } else {
        value
    }
}

fn parse_timestamp_text(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(normalize_epoch(value));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.timestamp());
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).timestamp())
}

/// Inclusive `[start, end]` bounds, in unix seconds, of the Monday-aligned UTC week
/// containing `ts`.
pub fn week_range(ts: i64) -> Option<(i64, i64)> {
    let at = Utc.timestamp_opt(ts, 0).single()?;
    let days_from_monday = at.weekday().num_days_from_monday() as i64;
    let monday = at.date_naive() - Duration::days(days_from_monday);
    let start = Utc.from_utc_datetime(&monday.and_hms_opt(0, 0, 0)?).timestamp();
    Some((start, start + 7 * 24 * 3600 - 1))
}

/// True when `address` is base58 and decodes to a 32-byte public key.
pub fn is_valid_pubkey(address: &str) -> bool {
    match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes.len() == PUBKEY_LEN,
        Err(_) => false,
    }
}
