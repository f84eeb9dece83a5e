// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
    increment_counter, Unit,
};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {
    Count,
    Seconds,
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = &$value;
        $( let _ = &$label_value; )*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = &$value;
        $( let _ = &$label_value; )*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = &$value;
        $( let _ = &$label_value; )*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! increment_counter {
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        $( let _ = &$label_value; )*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
    increment_counter,
};

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "ledger_rpc_calls_total",
        Unit::Count,
        "Ledger RPC calls, labeled by method and outcome."
    );
    describe_histogram!(
        "ledger_rpc_latency_seconds",
        Unit::Seconds,
        "Ledger RPC call latency."
    );
    describe_counter!(
        "scan_pages_total",
        Unit::Count,
        "Signature pages processed by the transaction scanner."
    );
    describe_counter!(
        "burns_parsed_total",
        Unit::Count,
        "Burn instructions accepted by the burn parser."
    );
    describe_counter!(
        "burn_instructions_skipped_total",
        Unit::Count,
        "Token instructions rejected by the burn parser, labeled by reason."
    );
    describe_counter!(
        "scan_step_failures_total",
        Unit::Count,
        "Scanner steps degraded to an empty result, labeled by step."
    );
    describe_counter!(
        "scans_cancelled_total",
        Unit::Count,
        "Scan runs superseded by a newer refresh."
    );
    describe_histogram!(
        "scan_duration_seconds",
        Unit::Seconds,
        "Wall time of a completed scan-to-score cycle."
    );
    describe_counter!("leaderboard_cache_hits_total", Unit::Count, "Cache hits by tier.");
    describe_counter!("leaderboard_cache_miss_total", Unit::Count, "Cache misses by tier.");
    describe_gauge!("leaderboard_entries", "Entries in the latest ranked leaderboard.");
}

// --- Helper functions to update metrics ---

pub fn record_rpc_call(method: &str, success: bool, duration: std::time::Duration) {
    let outcome = if success { "ok" } else { "error" };
    counter!("ledger_rpc_calls_total", 1, "method" => method.to_string(), "outcome" => outcome);
    histogram!("ledger_rpc_latency_seconds", duration.as_secs_f64(), "method" => method.to_string());
}

pub fn increment_scan_pages() {
    increment_counter!("scan_pages_total");
}

pub fn increment_burns_parsed(count: u64) {
    counter!("burns_parsed_total", count);
}

pub fn increment_instructions_skipped(reason: &'static str) {
    counter!("burn_instructions_skipped_total", 1, "reason" => reason);
}

pub fn increment_scan_step_failure(step: &'static str) {
    counter!("scan_step_failures_total", 1, "step" => step);
}

pub fn increment_scans_cancelled() {
    increment_counter!("scans_cancelled_total");
}

pub fn record_scan_duration(duration: std::time::Duration) {
    histogram!("scan_duration_seconds", duration.as_secs_f64());
}

pub fn increment_cache_hit(tier: &'static str) {
    counter!("leaderboard_cache_hits_total", 1, "tier" => tier);
}

pub fn increment_cache_miss(tier: &'static str) {
    counter!("leaderboard_cache_miss_total", 1, "tier" => tier);
}

pub fn set_leaderboard_size(size: usize) {
    gauge!("leaderboard_entries", size as f64);
}
