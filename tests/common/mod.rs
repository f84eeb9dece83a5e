//! Shared fixtures for integration tests: an in-memory ledger that serves signature pages
//! and `jsonParsed` transaction bodies.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use burn_leaderboard_sdk::ledger_client::{
    LedgerClient, ParsedTransaction, SignatureInfo, SignatureQuery,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const MINT: &str = "So11111111111111111111111111111111111111112";
pub const OTHER_MINT: &str = "EPjFWdd5AufqSSqeM2qFJHGwGX2yX2nhdJ3J5n9EUWYm";

/// One ledger transaction, newest first in `MockLedger::transactions`.
#[derive(Clone)]
pub struct MockTx {
    pub signature: String,
    pub body: Value,
}

pub fn burn_tx(signature: &str, authority: &str, ui_amount: f64, block_time: i64) -> MockTx {
    tx_with(signature, block_time, json!(null), vec![burn_ix(MINT, authority, ui_amount)])
}

pub fn burn_ix(mint: &str, authority: &str, ui_amount: f64) -> Value {
    json!({
        "program": "spl-token",
        "programId": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
        "parsed": {
            "type": "burnChecked",
            "info": {
                "mint": mint,
                "authority": authority,
                "tokenAmount": { "uiAmount": ui_amount, "decimals": 6 }
            }
        }
    })
}

pub fn tx_with(signature: &str, block_time: i64, err: Value, instructions: Vec<Value>) -> MockTx {
    MockTx {
        signature: signature.to_string(),
        body: json!({
            "slot": 1,
            "blockTime": block_time,
            "meta": { "err": err, "innerInstructions": [] },
            "transaction": {
                "signatures": [signature],
                "message": { "instructions": instructions }
            }
        }),
    }
}

/// `count` burns of one token each, signatures `sig-0` (newest) .. `sig-{count-1}`.
pub fn uniform_history(count: usize, burners: usize) -> Vec<MockTx> {
    (0..count)
        .map(|i| {
            burn_tx(
                &format!("sig-{}", i),
                &format!("burner-{}", i % burners),
                1.0,
                1_700_000_000 - i as i64,
            )
        })
        .collect()
}

pub struct MockLedger {
    pub transactions: Vec<MockTx>,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    /// Signature pages at these call indexes fail.
    pub failing_list_calls: HashSet<usize>,
    /// Bulk fetches at these call indexes fail.
    pub failing_fetch_calls: HashSet<usize>,
    /// Delay applied to every bulk fetch.
    pub fetch_delay: Option<Duration>,
    /// Cancelled right after the n-th bulk fetch returns.
    pub cancel_after_fetch: Mutex<Option<(usize, CancellationToken)>>,
}

impl MockLedger {
    pub fn new(transactions: Vec<MockTx>) -> Self {
        Self {
            transactions,
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            failing_list_calls: HashSet::new(),
            failing_fetch_calls: HashSet::new(),
            fetch_delay: None,
            cancel_after_fetch: Mutex::new(None),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_after_fetch(&self, call: usize, token: CancellationToken) {
        *self.cancel_after_fetch.lock().unwrap() = Some((call, token));
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn list_signatures(
        &self,
        _address: &str,
        query: SignatureQuery,
    ) -> Result<Vec<SignatureInfo>> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_list_calls.contains(&call) {
            return Err(anyhow!("signature page {} unavailable", call));
        }

        let start = match &query.before {
            Some(before) => self
                .transactions
                .iter()
                .position(|tx| &tx.signature == before)
                .map(|i| i + 1)
                .unwrap_or(self.transactions.len()),
            None => 0,
        };
        Ok(self
            .transactions
            .iter()
            .skip(start)
            .take(query.limit)
            .map(|tx| SignatureInfo {
                signature: tx.signature.clone(),
                slot: Some(1),
                err: None,
                block_time: tx.body["blockTime"].as_i64(),
            })
            .collect())
    }

    async fn get_parsed_transactions(
        &self,
        signatures: &[String],
    ) -> Result<Vec<Option<ParsedTransaction>>> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_fetch_calls.contains(&call) {
            return Err(anyhow!("bulk fetch {} failed", call));
        }

        let result = signatures
            .iter()
            .map(|sig| {
                self.transactions
                    .iter()
                    .find(|tx| &tx.signature == sig)
                    .and_then(|tx| serde_json::from_value(tx.body.clone()).ok())
            })
            .collect();

        if let Some((at, token)) = self.cancel_after_fetch.lock().unwrap().as_ref() {
            if *at == call {
                token.cancel();
            }
        }
        Ok(result)
    }
}
