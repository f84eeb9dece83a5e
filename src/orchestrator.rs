//! # Scan Orchestrator
//!
//! Runs the scan-to-score cycle:
//!
//! 1. Load amplifier period config and the bonus point map (failures degrade to empty).
//! 2. Build amplifier windows.
//! 3. Run the transaction scanner, publishing partial results.
//! 4. Score, store in the cache and publish the final list.
//!
//! Starting a refresh cancels the run before it. A cancelled run stops at its next
//! checkpoint and never writes to the cache or sends further progress.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use burn_leaderboard_sdk::orchestrator::Orchestrator;
//!
//! let orchestrator = Orchestrator::new(client, periods, bonus, cache, parser, scanner_config)?;
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let entries = orchestrator.refresh(Some(tx)).await?;
//! ```

use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::amplifier::build_windows;
use crate::burn_parser::BurnParser;
use crate::cache::LeaderboardCache;
use crate::error::{LeaderboardError, Result};
use crate::ledger_client::LedgerClient;
use crate::metrics;
use crate::scanner::{ProgressSender, ScanEvent, ScannerConfig, TransactionScanner};
use crate::scoring::ScoringContext;
use crate::settings::Settings;
use crate::sources::{BonusPointSource, PeriodConfigSource, StaticSources};
use crate::types::{BonusPointMap, RankedEntry};
use crate::utils::{is_valid_pubkey, now_unix_seconds};

/// Decimals assumed for raw amounts when [`run_scan`] builds its own parser.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

struct ActiveRun {
    id: Uuid,
    cancel: CancellationToken,
}

pub struct Orchestrator {
    client: Arc<dyn LedgerClient>,
    periods: Arc<dyn PeriodConfigSource>,
    bonus: Arc<dyn BonusPointSource>,
    cache: Arc<LeaderboardCache>,
    parser: BurnParser,
    scanner_config: ScannerConfig,
    active: Mutex<Option<ActiveRun>>,
}

impl Orchestrator {
    /// Fails with [`LeaderboardError::InvalidMint`] when the parser's mint is not a valid
    /// public key.
    pub fn new(
        client: Arc<dyn LedgerClient>,
        periods: Arc<dyn PeriodConfigSource>,
        bonus: Arc<dyn BonusPointSource>,
        cache: Arc<LeaderboardCache>,
        parser: BurnParser,
        scanner_config: ScannerConfig,
    ) -> Result<Self> {
        validate_mint(parser.mint())?;
        Ok(Self {
            client,
            periods,
            bonus,
            cache,
            parser,
            scanner_config,
            active: Mutex::new(None),
        })
    }

    /// Builds the parser and scanner limits from `settings`.
    ///
    /// Invalid settings fail with [`LeaderboardError::Config`], a bad mint with
    /// [`LeaderboardError::InvalidMint`].
    pub fn from_settings(
        settings: &Settings,
        client: Arc<dyn LedgerClient>,
        periods: Arc<dyn PeriodConfigSource>,
        bonus: Arc<dyn BonusPointSource>,
        cache: Arc<LeaderboardCache>,
    ) -> Result<Self> {
        settings.validate()?;
        let parser = BurnParser::new(
            settings.scanner.mint_address.clone(),
            settings.scanner.token_decimals,
        )
        .with_program_ids(&settings.scanner.token_program_ids);
        Self::new(client, periods, bonus, cache, parser, settings.scanner_config())
    }

    pub fn parser(&self) -> &BurnParser {
        &self.parser
    }

    pub fn cache(&self) -> &Arc<LeaderboardCache> {
        &self.cache
    }

    /// Cached leaderboard if fresh, otherwise a full refresh.
    pub async fn leaderboard(&self, progress: Option<ProgressSender>) -> Result<Vec<RankedEntry>> {
        if let Some(snapshot) = self.cache.get().await {
            info!(
                "📖 Serving {} entries from {:?} cache",
                snapshot.entries.len(),
                snapshot.source
            );
            if let Some(sender) = &progress {
                let _ = sender.send(ScanEvent::Completed {
                    entries: snapshot.entries.clone(),
                });
            }
            return Ok(snapshot.entries);
        }
        self.refresh(progress).await
    }

    /// Cancels the in-flight run, if any.
    pub fn cancel_current(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(run) = active.take() {
            run.cancel.cancel();
            metrics::increment_scans_cancelled();
            info!("🛑 Cancelled scan run {}", run.id);
        }
    }

    /// Runs a full scan-to-score cycle, superseding any run in flight.
    pub async fn refresh(&self, progress: Option<ProgressSender>) -> Result<Vec<RankedEntry>> {
        let (run_id, cancel) = self.begin_run();
        let span = info_span!("scan_run", run_id = %run_id);
        let result = self
            .run_cycle(&cancel, progress)
            .instrument(span)
            .await;
        self.finish_run(run_id);
        result
    }

    fn begin_run(&self) -> (Uuid, CancellationToken) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = active.take() {
            previous.cancel.cancel();
            metrics::increment_scans_cancelled();
            info!("🛑 Superseding scan run {}", previous.id);
        }
        let run = ActiveRun {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        };
        let handle = (run.id, run.cancel.clone());
        *active = Some(run);
        handle
    }

    fn finish_run(&self, run_id: Uuid) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().map_or(false, |run| run.id == run_id) {
            *active = None;
        }
    }

    async fn run_cycle(
        &self,
        cancel: &CancellationToken,
        progress: Option<ProgressSender>,
    ) -> Result<Vec<RankedEntry>> {
        let started = Instant::now();
        info!("🚀 Starting scan for mint {}", self.parser.mint());

        let context = load_context(self.periods.as_ref(), self.bonus.as_ref()).await;
        if cancel.is_cancelled() {
            return Err(LeaderboardError::Cancelled);
        }

        let scanner = TransactionScanner::new(
            self.client.clone(),
            self.parser.clone(),
            self.scanner_config.clone(),
        );
        let outcome = scanner.scan(cancel, &context, progress.as_ref()).await?;
        let entries = context.score(&outcome.aggregates);

        if cancel.is_cancelled() {
            return Err(LeaderboardError::Cancelled);
        }
        self.cache.put(&entries).await;

        if let Some(sender) = &progress {
            let _ = sender.send(ScanEvent::Completed {
                entries: entries.clone(),
            });
        }

        metrics::record_scan_duration(started.elapsed());
        metrics::set_leaderboard_size(entries.len());
        info!(
            "✅ Leaderboard refreshed: {} entries from {} burners in {:?}",
            entries.len(),
            outcome.aggregates.len(),
            started.elapsed()
        );
        Ok(entries)
    }
}

/// Loads windows and bonus points. Each input degrades to empty on failure.
pub async fn load_context(
    periods: &dyn PeriodConfigSource,
    bonus: &dyn BonusPointSource,
) -> ScoringContext {
    let current = match periods.current_period().await {
        Ok(current) => current,
        Err(e) => {
            warn!("⚠️ Current period unavailable, continuing without it: {:#}", e);
            None
        }
    };
    let history = match periods.historical_periods().await {
        Ok(history) => history,
        Err(e) => {
            warn!("⚠️ Period history unavailable, continuing without it: {:#}", e);
            Vec::new()
        }
    };
    let bonus_points = match bonus.bonus_points().await {
        Ok(map) => map,
        Err(e) => {
            warn!("⚠️ Bonus points unavailable, continuing without them: {:#}", e);
            BonusPointMap::new()
        }
    };

    let windows = build_windows(&history, current.as_ref());
    ScoringContext::new(windows, bonus_points, now_unix_seconds())
}

fn validate_mint(mint: &str) -> Result<()> {
    if is_valid_pubkey(mint) {
        Ok(())
    } else {
        Err(LeaderboardError::InvalidMint(mint.to_string()))
    }
}

/// One scan-to-score cycle with default settings, no amplifier periods, no bonus
/// points and no cache.
///
/// Progress is published on `progress`; the last event is `Completed` unless the run
/// was cancelled.
pub async fn run_scan(
    client: Arc<dyn LedgerClient>,
    mint: &str,
    cancel: CancellationToken,
    progress: Option<ProgressSender>,
) -> Result<Vec<RankedEntry>> {
    validate_mint(mint)?;
    let sources = StaticSources::default();
    let context = load_context(&sources, &sources).await;
    let scanner = TransactionScanner::new(
        client,
        BurnParser::new(mint, DEFAULT_TOKEN_DECIMALS),
        ScannerConfig::default(),
    );

    let outcome = scanner.scan(&cancel, &context, progress.as_ref()).await?;
    let entries = context.score(&outcome.aggregates);
    if cancel.is_cancelled() {
        return Err(LeaderboardError::Cancelled);
    }
    if let Some(sender) = &progress {
        let _ = sender.send(ScanEvent::Completed {
            entries: entries.clone(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_client::{ParsedTransaction, SignatureInfo, SignatureQuery};
    use async_trait::async_trait;

    struct EmptyLedger;

    #[async_trait]
    impl LedgerClient for EmptyLedger {
        async fn list_signatures(
            &self,
            _address: &str,
            _query: SignatureQuery,
        ) -> anyhow::Result<Vec<SignatureInfo>> {
            Ok(Vec::new())
        }

        async fn get_parsed_transactions(
            &self,
            _signatures: &[String],
        ) -> anyhow::Result<Vec<Option<ParsedTransaction>>> {
            Ok(Vec::new())
        }
    }

    struct FailingSources;

    #[async_trait]
    impl PeriodConfigSource for FailingSources {
        async fn current_period(&self) -> anyhow::Result<Option<crate::amplifier::CurrentPeriodConfig>> {
            Err(anyhow::anyhow!("db down"))
        }

        async fn historical_periods(&self) -> anyhow::Result<Vec<crate::amplifier::HistoricalPeriodRecord>> {
            Err(anyhow::anyhow!("db down"))
        }
    }

    #[async_trait]
    impl BonusPointSource for FailingSources {
        async fn bonus_points(&self) -> anyhow::Result<BonusPointMap> {
            Err(anyhow::anyhow!("db down"))
        }
    }

    #[tokio::test]
    async fn test_invalid_mint_rejected() {
        let result = run_scan(Arc::new(EmptyLedger), "not-a-mint", CancellationToken::new(), None).await;
        assert!(matches!(result, Err(LeaderboardError::InvalidMint(_))));
    }

    fn settings_with(scanner: &str) -> (tempfile::TempDir, Settings) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        let body = format!(
            "[rpc]\nhttp_url = \"https://api.mainnet-beta.solana.com\"\n\n[scanner]\n{}\n",
            scanner
        );
        std::fs::write(&path, body).unwrap();
        let settings = Settings::from_path(&path.to_string_lossy()).unwrap();
        (dir, settings)
    }

    fn from_settings(settings: &Settings) -> Result<Orchestrator> {
        let sources = Arc::new(StaticSources::default());
        Orchestrator::from_settings(
            settings,
            Arc::new(EmptyLedger),
            sources.clone(),
            sources,
            Arc::new(LeaderboardCache::in_memory()),
        )
    }

    #[test]
    fn test_from_settings_rejects_invalid_settings() {
        let (_dir, settings) = settings_with(
            "mint_address = \"So11111111111111111111111111111111111111112\"\npage_size = 0",
        );
        assert!(matches!(from_settings(&settings), Err(LeaderboardError::Config(_))));
    }

    #[test]
    fn test_from_settings_builds_parser() {
        let (_dir, settings) = settings_with(
            "mint_address = \"So11111111111111111111111111111111111111112\"\ntoken_decimals = 9",
        );
        let orchestrator = from_settings(&settings).unwrap();
        assert_eq!(orchestrator.parser().mint(), "So11111111111111111111111111111111111111112");

        let (_dir, bad_mint) = settings_with("mint_address = \"not-a-mint\"");
        assert!(matches!(from_settings(&bad_mint), Err(LeaderboardError::InvalidMint(_))));
    }

    #[tokio::test]
    async fn test_failing_sources_degrade_to_empty() {
        let context = load_context(&FailingSources, &FailingSources).await;
        assert!(context.windows.is_empty());
        assert!(context.bonus_points.is_empty());
    }

    #[tokio::test]
    async fn test_empty_history_completes_with_empty_list() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let entries = run_scan(
            Arc::new(EmptyLedger),
            "So11111111111111111111111111111111111111112",
            CancellationToken::new(),
            Some(tx),
        )
        .await
        .unwrap();
        assert!(entries.is_empty());
        assert_eq!(rx.recv().await, Some(ScanEvent::Completed { entries: vec![] }));
    }
}
