//! # Transaction Scanner
//!
//! Walks the mint's signature history newest-first, one page at a time, and rebuilds
//! per-address burn aggregates from the parsed transactions.
//!
//! ## Pagination
//!
//! - The cursor (`before`) starts unset and moves to the last signature of each page.
//! - At most `max_pages` pages of `page_size` signatures are requested.
//! - The walk stops early when a page is empty or shorter than `page_size`.
//! - Each page's transaction bodies are fetched in a single bulk call.
//!
//! ## Failure handling
//!
//! Any error or timeout on a ledger call is logged and treated as an empty result for
//! that step. Nothing is retried. Cancellation is observed at the top of every page and
//! after every network round trip; a cancelled scan neither mutates its aggregates nor
//! reports progress again.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::burn_parser::BurnParser;
use crate::error::{LeaderboardError, Result};
use crate::ledger_client::{LedgerClient, ParsedTransaction, SignatureInfo, SignatureQuery};
use crate::metrics;
use crate::scoring::ScoringContext;
use crate::types::{AggregateMap, RankedEntry};

pub const DEFAULT_MAX_PAGES: usize = 8;
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub max_pages: usize,
    pub page_size: usize,
    /// Upper bound for every individual ledger call.
    pub request_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Incremental view published after every page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    pub entries: Vec<RankedEntry>,
    pub status: String,
    pub pages_completed: usize,
}

/// Items delivered on a progress channel: any number of `Progress`, then one `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Progress(ScanProgress),
    Completed { entries: Vec<RankedEntry> },
}

/// Unbounded so that publishing never stalls the scan.
pub type ProgressSender = mpsc::UnboundedSender<ScanEvent>;

/// What a finished scan produced.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub aggregates: AggregateMap,
    pub pages_completed: usize,
    pub signatures_seen: usize,
}

pub struct TransactionScanner {
    client: Arc<dyn LedgerClient>,
    parser: BurnParser,
    config: ScannerConfig,
}

impl TransactionScanner {
    pub fn new(client: Arc<dyn LedgerClient>, parser: BurnParser, config: ScannerConfig) -> Self {
        Self {
            client,
            parser,
            config,
        }
    }

    /// Runs the paginated scan.
    ///
    /// `context` is only used to score the partial aggregates published through
    /// `progress`; the returned aggregates are unscored.
    pub async fn scan(
        &self,
        cancel: &CancellationToken,
        context: &ScoringContext,
        progress: Option<&ProgressSender>,
    ) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();
        let mut before: Option<String> = None;

        while outcome.pages_completed < self.config.max_pages {
            if cancel.is_cancelled() {
                return Err(LeaderboardError::Cancelled);
            }

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LeaderboardError::Cancelled),
                page = self.fetch_signatures(before.clone()) => page,
            };
            if page.is_empty() {
                debug!("Signature page {} empty, history exhausted", outcome.pages_completed + 1);
                break;
            }

            let exhausted = page.len() < self.config.page_size;
            before = page.last().map(|info| info.signature.clone());
            let signatures: Vec<String> = page.into_iter().map(|info| info.signature).collect();
            outcome.signatures_seen += signatures.len();

            let transactions = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LeaderboardError::Cancelled),
                txs = self.fetch_transactions(&signatures) => txs,
            };
            if cancel.is_cancelled() {
                return Err(LeaderboardError::Cancelled);
            }

            let burns_before = total_events(&outcome.aggregates);
            for tx in transactions.iter().flatten() {
                for (authority, event) in self.parser.extract_burns(tx) {
                    outcome.aggregates.entry(authority).or_default().record(event);
                }
            }
            outcome.pages_completed += 1;
            metrics::increment_scan_pages();

            let new_burns = total_events(&outcome.aggregates) - burns_before;
            debug!(
                "Page {}: {} signatures, {} fetched bodies, {} new burns",
                outcome.pages_completed,
                signatures.len(),
                transactions.iter().flatten().count(),
                new_burns
            );

            if let Some(sender) = progress {
                if cancel.is_cancelled() {
                    return Err(LeaderboardError::Cancelled);
                }
                let status = format!(
                    "Scanned page {}/{}: {} signatures, {} burners so far",
                    outcome.pages_completed,
                    self.config.max_pages,
                    outcome.signatures_seen,
                    outcome.aggregates.len()
                );
                // A dropped receiver just means nobody is watching
                let _ = sender.send(ScanEvent::Progress(ScanProgress {
                    entries: context.score(&outcome.aggregates),
                    status,
                    pages_completed: outcome.pages_completed,
                }));
            }

            if exhausted {
                debug!("Short page ({} < {}), history exhausted", signatures.len(), self.config.page_size);
                break;
            }
        }

        info!(
            "🔥 Scan finished: {} pages, {} signatures, {} burners",
            outcome.pages_completed,
            outcome.signatures_seen,
            outcome.aggregates.len()
        );
        Ok(outcome)
    }

    async fn fetch_signatures(&self, before: Option<String>) -> Vec<SignatureInfo> {
        let query = SignatureQuery {
            limit: self.config.page_size,
            before,
        };
        let call = self.client.list_signatures(self.parser.mint(), query);
        match timeout(self.config.request_timeout, call).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                warn!("⚠️ Signature page fetch failed, treating as empty: {:#}", e);
                metrics::increment_scan_step_failure("list_signatures");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "⚠️ Signature page fetch timed out after {:?}, treating as empty",
                    self.config.request_timeout
                );
                metrics::increment_scan_step_failure("list_signatures");
                Vec::new()
            }
        }
    }

    async fn fetch_transactions(&self, signatures: &[String]) -> Vec<Option<ParsedTransaction>> {
        let call = self.client.get_parsed_transactions(signatures);
        match timeout(self.config.request_timeout, call).await {
            Ok(Ok(transactions)) => transactions,
            Ok(Err(e)) => {
                warn!(
                    "⚠️ Bulk fetch of {} transactions failed, skipping batch: {:#}",
                    signatures.len(),
                    e
                );
                metrics::increment_scan_step_failure("get_parsed_transactions");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "⚠️ Bulk fetch of {} transactions timed out after {:?}, skipping batch",
                    signatures.len(),
                    self.config.request_timeout
                );
                metrics::increment_scan_step_failure("get_parsed_transactions");
                Vec::new()
            }
        }
    }
}

fn total_events(aggregates: &AggregateMap) -> u64 {
    aggregates.values().map(|a| a.tx_count).sum()
}
