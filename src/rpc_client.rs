//! JSON-RPC [`LedgerClient`] for a Solana node.
//!
//! Signature pages come from `getSignaturesForAddress`; the transaction bodies of a page
//! are requested as one JSON-RPC batch of `getTransaction` calls with `jsonParsed`
//! encoding. Both calls share an optional `governor` rate limit.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::ledger_client::{LedgerClient, ParsedTransaction, SignatureInfo, SignatureQuery};
use crate::metrics;
use crate::settings::Rpc;

type DefaultDirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const COMMITMENT: &str = "confirmed";

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

pub struct SolanaRpcClient {
    http: reqwest::Client,
    url: String,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    pub fn new(url: impl Into<String>, request_timeout: Duration, qps_limit: Option<u32>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let limiter = match qps_limit {
            Some(qps) => {
                let quota = Quota::per_second(
                    NonZeroU32::new(qps).ok_or_else(|| anyhow!("QPS must be non-zero"))?,
                );
                Some(Arc::new(RateLimiter::direct(quota)))
            }
            None => None,
        };
        Ok(Self {
            http,
            url: url.into(),
            limiter,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn from_settings(rpc: &Rpc) -> Result<Self> {
        Self::new(rpc.http_url.clone(), rpc.request_timeout(), rpc.qps_limit)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        self.throttle().await;
        let started = Instant::now();
        let result = async {
            self.http
                .post(&self.url)
                .json(body)
                .send()
                .await
                .with_context(|| format!("failed {} POST", method))?
                .error_for_status()
                .with_context(|| format!("non-success {} status", method))?
                .json::<T>()
                .await
                .with_context(|| format!("failed parsing {} json", method))
        }
        .await;
        metrics::record_rpc_call(method, result.is_ok(), started.elapsed());
        result
    }
}

#[async_trait]
impl LedgerClient for SolanaRpcClient {
    async fn list_signatures(&self, address: &str, query: SignatureQuery) -> Result<Vec<SignatureInfo>> {
        let mut options = json!({ "limit": query.limit, "commitment": COMMITMENT });
        if let Some(before) = &query.before {
            options["before"] = json!(before);
        }
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": "getSignaturesForAddress",
            "params": [address, options],
        });

        let response: RpcResponse = self.post("getSignaturesForAddress", &request).await?;
        if let Some(err) = response.error {
            return Err(anyhow!(
                "getSignaturesForAddress failed ({}): {}",
                err.code,
                err.message
            ));
        }
        match response.result {
            Some(result) => serde_json::from_value(result).context("malformed signature page"),
            None => Ok(Vec::new()),
        }
    }

    async fn get_parsed_transactions(&self, signatures: &[String]) -> Result<Vec<Option<ParsedTransaction>>> {
        if signatures.is_empty() {
            return Ok(Vec::new());
        }

        let first_id = self.next_id.fetch_add(signatures.len() as u64, Ordering::Relaxed);
        let batch: Vec<Value> = signatures
            .iter()
            .enumerate()
            .map(|(i, signature)| {
                json!({
                    "jsonrpc": "2.0",
                    "id": first_id + i as u64,
                    "method": "getTransaction",
                    "params": [
                        signature,
                        {
                            "encoding": "jsonParsed",
                            "commitment": COMMITMENT,
                            "maxSupportedTransactionVersion": 0
                        }
                    ]
                })
            })
            .collect();

        let responses: Vec<RpcResponse> = self.post("getTransaction", &Value::Array(batch)).await?;

        // batch responses may come back in any order
        let mut by_id: HashMap<u64, RpcResponse> = responses
            .into_iter()
            .filter_map(|r| r.id.map(|id| (id, r)))
            .collect();

        Ok((0..signatures.len())
            .map(|i| {
                let response = by_id.remove(&(first_id + i as u64))?;
                if let Some(err) = response.error {
                    debug!(signature = %signatures[i], code = err.code, "getTransaction error: {}", err.message);
                    return None;
                }
                let result = response.result.filter(|v| !v.is_null())?;
                match serde_json::from_value::<ParsedTransaction>(result) {
                    Ok(tx) => Some(tx),
                    Err(e) => {
                        debug!(signature = %signatures[i], "unreadable transaction body: {}", e);
                        None
                    }
                }
            })
            .collect())
    }
}
