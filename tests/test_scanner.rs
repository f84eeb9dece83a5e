//! Integration tests for the transaction scanner
//!
//! Tests cover:
//! - Pagination bound and early stop
//! - Degradation of failed pages and batches
//! - Failed transactions and foreign mints
//! - Cancellation checkpoints
//! - Progress events

mod common;

use burn_leaderboard_sdk::burn_parser::BurnParser;
use burn_leaderboard_sdk::error::LeaderboardError;
use burn_leaderboard_sdk::scanner::{ScanEvent, ScannerConfig, TransactionScanner};
use burn_leaderboard_sdk::scoring::ScoringContext;
use common::*;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn scanner(ledger: Arc<MockLedger>, config: ScannerConfig) -> TransactionScanner {
    TransactionScanner::new(ledger, BurnParser::new(MINT, 6), config)
}

/// Test that a long history never reads more than `max_pages` pages
#[tokio::test]
async fn test_pagination_is_bounded() {
    let ledger = Arc::new(MockLedger::new(uniform_history(1_000, 4)));
    let outcome = scanner(ledger.clone(), ScannerConfig::default())
        .scan(&CancellationToken::new(), &ScoringContext::default(), None)
        .await
        .unwrap();

    assert_eq!(ledger.list_calls(), 8);
    assert_eq!(ledger.fetch_calls(), 8);
    assert_eq!(outcome.signatures_seen, 800);
    let total: u64 = outcome.aggregates.values().map(|a| a.tx_count).sum();
    assert_eq!(total, 800);
}

/// Test that a short page ends the walk, and the cursor never revisits a signature
#[tokio::test]
async fn test_short_page_stops_scan() {
    let ledger = Arc::new(MockLedger::new(uniform_history(130, 1)));
    let outcome = scanner(ledger.clone(), ScannerConfig::default())
        .scan(&CancellationToken::new(), &ScoringContext::default(), None)
        .await
        .unwrap();

    assert_eq!(ledger.list_calls(), 2);
    assert_eq!(outcome.pages_completed, 2);
    let burner = &outcome.aggregates["burner-0"];
    assert_eq!(burner.tx_count, 130);
    assert_eq!(burner.burned, Decimal::from(130));
}

/// Test that an empty history produces an empty result without fetching bodies
#[tokio::test]
async fn test_empty_history() {
    let ledger = Arc::new(MockLedger::new(Vec::new()));
    let outcome = scanner(ledger.clone(), ScannerConfig::default())
        .scan(&CancellationToken::new(), &ScoringContext::default(), None)
        .await
        .unwrap();

    assert!(outcome.aggregates.is_empty());
    assert_eq!(ledger.list_calls(), 1);
    assert_eq!(ledger.fetch_calls(), 0);
}

/// Test that a failed signature page is treated as the end of history
#[tokio::test]
async fn test_failed_signature_page_ends_scan() {
    let mut ledger = MockLedger::new(uniform_history(500, 2));
    ledger.failing_list_calls.insert(1);
    let ledger = Arc::new(ledger);

    let outcome = scanner(ledger.clone(), ScannerConfig::default())
        .scan(&CancellationToken::new(), &ScoringContext::default(), None)
        .await
        .unwrap();

    assert_eq!(outcome.pages_completed, 1);
    assert_eq!(outcome.signatures_seen, 100);
}

/// Test that a failed bulk fetch contributes nothing but pagination continues
#[tokio::test]
async fn test_failed_batch_skipped() {
    let mut ledger = MockLedger::new(uniform_history(250, 1));
    ledger.failing_fetch_calls.insert(0);
    let ledger = Arc::new(ledger);

    let outcome = scanner(ledger.clone(), ScannerConfig::default())
        .scan(&CancellationToken::new(), &ScoringContext::default(), None)
        .await
        .unwrap();

    assert_eq!(outcome.pages_completed, 3);
    assert_eq!(outcome.aggregates["burner-0"].tx_count, 150);
}

/// Test that a slow bulk fetch is abandoned at the request timeout
#[tokio::test]
async fn test_slow_batch_times_out() {
    let mut ledger = MockLedger::new(uniform_history(10, 1));
    ledger.fetch_delay = Some(Duration::from_millis(200));
    let ledger = Arc::new(ledger);

    let config = ScannerConfig {
        request_timeout: Duration::from_millis(20),
        ..ScannerConfig::default()
    };
    let outcome = scanner(ledger, config)
        .scan(&CancellationToken::new(), &ScoringContext::default(), None)
        .await
        .unwrap();

    assert_eq!(outcome.pages_completed, 1);
    assert!(outcome.aggregates.is_empty());
}

/// Test that failed transactions, missing meta and foreign mints are ignored
#[tokio::test]
async fn test_only_successful_burns_of_the_mint_count() {
    let mut missing_meta = burn_tx("sig-2", "carol", 9.0, 98);
    missing_meta.body["meta"] = json!(null);

    let ledger = Arc::new(MockLedger::new(vec![
        burn_tx("sig-0", "alice", 5.0, 100),
        tx_with(
            "sig-1",
            99,
            json!({"InstructionError": [0, "Custom"]}),
            vec![burn_ix(MINT, "bob", 7.0)],
        ),
        missing_meta,
        tx_with("sig-3", 97, json!(null), vec![burn_ix(OTHER_MINT, "dave", 3.0)]),
        tx_with(
            "sig-4",
            96,
            json!(null),
            vec![burn_ix(MINT, "alice", 1.5), burn_ix(MINT, "erin", 2.0)],
        ),
    ]));

    let outcome = scanner(ledger, ScannerConfig::default())
        .scan(&CancellationToken::new(), &ScoringContext::default(), None)
        .await
        .unwrap();

    assert_eq!(outcome.aggregates.len(), 2);
    let alice = &outcome.aggregates["alice"];
    assert_eq!(alice.burned, Decimal::new(65, 1));
    assert_eq!(alice.tx_count, 2);
    assert_eq!(outcome.aggregates["erin"].tx_count, 1);
}

/// Test that cancellation after a network round trip discards that page
#[tokio::test]
async fn test_cancellation_after_fetch_stops_mutation() {
    let ledger = Arc::new(MockLedger::new(uniform_history(500, 2)));
    let cancel = CancellationToken::new();
    ledger.cancel_after_fetch(1, cancel.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = scanner(ledger.clone(), ScannerConfig::default())
        .scan(&cancel, &ScoringContext::default(), Some(&tx))
        .await;
    drop(tx);

    assert!(matches!(result, Err(LeaderboardError::Cancelled)));
    assert_eq!(ledger.list_calls(), 2);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    // only the page completed before cancellation was reported
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ScanEvent::Progress(p) if p.pages_completed == 1));
}

/// Test that progress entries are scored and ranked
#[tokio::test]
async fn test_progress_entries_are_ranked() {
    let ledger = Arc::new(MockLedger::new(vec![
        burn_tx("sig-0", "small", 1.0, 100),
        burn_tx("sig-1", "big", 100.0, 99),
    ]));
    let (tx, mut rx) = mpsc::unbounded_channel();
    scanner(ledger, ScannerConfig::default())
        .scan(&CancellationToken::new(), &ScoringContext::default(), Some(&tx))
        .await
        .unwrap();

    match rx.recv().await {
        Some(ScanEvent::Progress(progress)) => {
            assert_eq!(progress.pages_completed, 1);
            assert_eq!(progress.entries[0].address, "big");
            assert_eq!(progress.entries[0].points, 188);
            assert_eq!(progress.entries[1].points, 1);
            assert!(!progress.status.is_empty());
        }
        other => panic!("expected progress, got {:?}", other),
    }
}
