// Burn Parser - decodes SPL token burn instructions out of jsonParsed transactions
// Every field of the loosely typed RPC payload is checked exactly once, here.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::ledger_client::{ParsedInstruction, ParsedTransaction};
use crate::metrics;
use crate::types::conversions::{max_token_amount, raw_amount_to_decimal, ui_amount_to_decimal};
use crate::types::BurnEvent;

pub const SPL_TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const SPL_TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

const TOKEN_PROGRAM_NAMES: [&str; 2] = ["spl-token", "spl-token-2022"];
const BURN_TYPES: [&str; 2] = ["burn", "burnChecked"];

/// Why an instruction did not produce a burn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotTokenProgram,
    NotParsed,
    NotBurn(String),
    MissingMint,
    MintMismatch(String),
    MissingAuthority,
    MissingAmount,
    InvalidAmount(String),
    NonPositiveAmount,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotTokenProgram => "not_token_program",
            SkipReason::NotParsed => "not_parsed",
            SkipReason::NotBurn(_) => "not_burn",
            SkipReason::MissingMint => "missing_mint",
            SkipReason::MintMismatch(_) => "mint_mismatch",
            SkipReason::MissingAuthority => "missing_authority",
            SkipReason::MissingAmount => "missing_amount",
            SkipReason::InvalidAmount(_) => "invalid_amount",
            SkipReason::NonPositiveAmount => "non_positive_amount",
        }
    }
}

/// A validated burn instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBurn {
    pub authority: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct ParsedBody {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    info: BurnInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BurnInfo {
    #[serde(default)]
    mint: Option<String>,
    #[serde(default)]
    authority: Option<String>,
    #[serde(default)]
    multisig_authority: Option<String>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    token_amount: Option<TokenAmount>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAmount {
    #[serde(default)]
    ui_amount: Option<f64>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    decimals: Option<u8>,
}

/// Filter describing which burns count: one mint, a set of token programs.
#[derive(Debug, Clone)]
pub struct BurnParser {
    mint: String,
    program_ids: HashSet<String>,
    assumed_decimals: u8,
}

impl BurnParser {
    pub fn new(mint: impl Into<String>, assumed_decimals: u8) -> Self {
        Self {
            mint: mint.into(),
            program_ids: [SPL_TOKEN_PROGRAM_ID, SPL_TOKEN_2022_PROGRAM_ID]
                .into_iter()
                .map(String::from)
                .collect(),
            assumed_decimals,
        }
    }

    /// Replace the accepted token program ids. Empty input keeps the defaults.
    pub fn with_program_ids(mut self, program_ids: &[String]) -> Self {
        if !program_ids.is_empty() {
            self.program_ids = program_ids.iter().cloned().collect();
        }
        self
    }

    pub fn mint(&self) -> &str {
        &self.mint
    }

    fn is_token_program(&self, ix: &ParsedInstruction) -> bool {
        let by_name = ix
            .program
            .as_deref()
            .map_or(false, |name| TOKEN_PROGRAM_NAMES.contains(&name));
        let by_id = ix
            .program_id
            .as_deref()
            .map_or(false, |id| self.program_ids.contains(id));
        by_name || by_id
    }

    /// Decodes one instruction.
    pub fn decode_instruction(&self, ix: &ParsedInstruction) -> Result<DecodedBurn, SkipReason> {
        if !self.is_token_program(ix) {
            return Err(SkipReason::NotTokenProgram);
        }
        let parsed = ix.parsed.as_ref().ok_or(SkipReason::NotParsed)?;
        // Some programs report `parsed` as a bare string
        let body: ParsedBody =
            serde_json::from_value(parsed.clone()).map_err(|_| SkipReason::NotParsed)?;
        if !BURN_TYPES.contains(&body.kind.as_str()) {
            return Err(SkipReason::NotBurn(body.kind));
        }

        let info = body.info;
        match info.mint.as_deref() {
            None => return Err(SkipReason::MissingMint),
            Some(mint) if mint != self.mint => {
                return Err(SkipReason::MintMismatch(mint.to_string()))
            }
            Some(_) => {}
        }

        let authority = info
            .authority
            .clone()
            .or_else(|| info.multisig_authority.clone())
            .filter(|a| !a.is_empty())
            .ok_or(SkipReason::MissingAuthority)?;

        let amount = self.decode_amount(&info)?;
        if amount <= Decimal::ZERO {
            return Err(SkipReason::NonPositiveAmount);
        }
        let decimals = info
            .token_amount
            .as_ref()
            .and_then(|t| t.decimals)
            .unwrap_or(self.assumed_decimals);
        if amount > max_token_amount(decimals) {
            return Err(SkipReason::InvalidAmount(format!(
                "{} exceeds the u64 supply at {} decimals",
                amount, decimals
            )));
        }

        Ok(DecodedBurn { authority, amount })
    }

    /// Prefers human-readable units, then raw units with the reported decimals,
    /// then raw units with the assumed mint decimals.
    fn decode_amount(&self, info: &BurnInfo) -> Result<Decimal, SkipReason> {
        if let Some(token_amount) = &info.token_amount {
            if let Some(ui) = token_amount.ui_amount {
                return ui_amount_to_decimal(ui)
                    .map_err(|e| SkipReason::InvalidAmount(e.to_string()));
            }
            if let Some(raw) = &token_amount.amount {
                let decimals = token_amount.decimals.unwrap_or(self.assumed_decimals);
                return raw_amount_to_decimal(raw, decimals)
                    .map_err(|e| SkipReason::InvalidAmount(e.to_string()));
            }
        }
        let raw = match &info.amount {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(SkipReason::InvalidAmount(other.to_string())),
            None => return Err(SkipReason::MissingAmount),
        };
        raw_amount_to_decimal(&raw, self.assumed_decimals)
            .map_err(|e| SkipReason::InvalidAmount(e.to_string()))
    }

    /// Extracts every qualifying burn from a transaction as `(authority, event)` pairs.
    /// Failed transactions yield nothing.
    pub fn extract_burns(&self, tx: &ParsedTransaction) -> Vec<(String, BurnEvent)> {
        if !tx.succeeded() {
            return Vec::new();
        }
        let transaction_id = tx.primary_signature().unwrap_or_default().to_string();
        let timestamp = tx.block_time.unwrap_or(0);

        let mut burns = Vec::new();
        for ix in tx.all_instructions() {
            match self.decode_instruction(ix) {
                Ok(burn) => {
                    burns.push((
                        burn.authority,
                        BurnEvent {
                            amount: burn.amount,
                            timestamp_unix_seconds: timestamp,
                            transaction_id: transaction_id.clone(),
                        },
                    ));
                }
                // Non-token instructions are the common case, not worth counting
                Err(SkipReason::NotTokenProgram) => {}
                Err(reason) => metrics::increment_instructions_skipped(reason.as_str()),
            }
        }
        if !burns.is_empty() {
            metrics::increment_burns_parsed(burns.len() as u64);
        }
        burns
    }
}
