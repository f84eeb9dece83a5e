//! # Ledger Client
//!
//! The scanner depends on exactly two ledger operations: listing recent transaction
//! signatures for an address, and fetching the parsed bodies for a batch of signatures.
//! `LedgerClient` abstracts both so the scanner can run against a JSON-RPC node
//! (see `rpc_client`) or an in-process fake in tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use burn_leaderboard_sdk::ledger_client::{LedgerClient, ParsedTransaction, SignatureInfo, SignatureQuery};
//! use async_trait::async_trait;
//!
//! struct Replay {
//!     pages: Vec<Vec<SignatureInfo>>,
//! }
//!
//! #[async_trait]
//! impl LedgerClient for Replay {
//!     async fn list_signatures(
//!         &self,
//!         address: &str,
//!         query: SignatureQuery,
//!     ) -> anyhow::Result<Vec<SignatureInfo>> {
//!         // Look up the page that follows `query.before`
//!         // ...
//!     }
//!
//!     async fn get_parsed_transactions(
//!         &self,
//!         signatures: &[String],
//!     ) -> anyhow::Result<Vec<Option<ParsedTransaction>>> {
//!         // ...
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pagination parameters for `list_signatures`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureQuery {
    /// Maximum number of signatures to return.
    pub limit: usize,
    /// Only return signatures older than this one. `None` starts from the newest.
    pub before: Option<String>,
}

/// One entry of a signature page, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// A transaction as returned with `jsonParsed` encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionBody,
}

impl ParsedTransaction {
    /// The transaction id (`signatures[0]`).
    pub fn primary_signature(&self) -> Option<&str> {
        self.transaction.signatures.first().map(String::as_str)
    }

    /// `meta.err` is null on success. Missing meta counts as failed.
    pub fn succeeded(&self) -> bool {
        match &self.meta {
            Some(meta) => meta.err.as_ref().map_or(true, Value::is_null),
            None => false,
        }
    }

    /// Top-level instructions followed by every inner instruction group.
    pub fn all_instructions(&self) -> impl Iterator<Item = &ParsedInstruction> {
        let inner = self
            .meta
            .as_ref()
            .and_then(|meta| meta.inner_instructions.as_ref())
            .into_iter()
            .flatten()
            .flat_map(|group| group.instructions.iter());
        self.transaction.message.instructions.iter().chain(inner)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<InnerInstructionGroup>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerInstructionGroup {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBody {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: TransactionMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

/// A single instruction. `parsed` stays untyped here; `burn_parser` owns its decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub parsed: Option<Value>,
}

/// Read access to the ledger.
///
/// Implementations may fail on transient errors; the scanner treats any error as an
/// empty result for that step and never retries.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Lists signatures involving `address`, newest first. Returning fewer than
    /// `query.limit` entries signals the end of available history.
    async fn list_signatures(&self, address: &str, query: SignatureQuery)
        -> Result<Vec<SignatureInfo>>;

    /// Fetches parsed bodies for `signatures` in one bulk request. The result is aligned
    /// with the input; unknown signatures come back as `None`.
    async fn get_parsed_transactions(
        &self,
        signatures: &[String],
    ) -> Result<Vec<Option<ParsedTransaction>>>;
}
