//! # Leaderboard Scanner Service
//!
//! Scans the configured mint's burn history and prints the ranked leaderboard.
//!
//! ## Overview
//!
//! - One-shot mode serves the cached leaderboard when fresh, otherwise scans.
//! - `--watch` keeps refreshing every `pollers.refresh_interval_seconds`, runs the bonus
//!   map and latest burn pollers alongside, and stops on Ctrl+C.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin leaderboard_scanner -- --config Config.toml --top 25
//! cargo run --bin leaderboard_scanner -- --watch
//! ```

use anyhow::{Context, Result};
use burn_leaderboard_sdk::{
    cache::LeaderboardCache,
    metrics,
    orchestrator::Orchestrator,
    pollers::{BonusMapPoller, LatestBurnPoller, LatestBurnTracker, SharedBonusPoints},
    rpc_client::SolanaRpcClient,
    scanner::ScanEvent,
    settings::{CacheBackend, Settings},
    snapshot_store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore},
    sources::JsonFileSources,
    types::RankedEntry,
};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "leaderboard_scanner", about = "Burn leaderboard scanner")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Number of entries to print
    #[arg(long, default_value_t = 20)]
    top: usize,

    /// Keep refreshing until Ctrl+C
    #[arg(long)]
    watch: bool,
}

fn init_logging() -> Result<()> {
    #[cfg(feature = "observability")]
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::INFO)
            .init();
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .install()
            .context("Failed to install Prometheus exporter")?;
        metrics::describe_metrics();
    }
    #[cfg(not(feature = "observability"))]
    {
        env_logger::init();
        metrics::describe_metrics();
    }
    Ok(())
}

async fn build_store(settings: &Settings) -> Result<Arc<dyn SnapshotStore>> {
    let store: Arc<dyn SnapshotStore> = match settings.cache.backend {
        CacheBackend::Memory => Arc::new(MemorySnapshotStore::new()),
        CacheBackend::File => Arc::new(FileSnapshotStore::new(&settings.cache.file_dir)),
        #[cfg(feature = "redis")]
        CacheBackend::Redis => Arc::new(
            burn_leaderboard_sdk::snapshot_store::RedisSnapshotStore::connect(
                &settings.cache.redis_url,
                settings.cache.leaderboard_ttl_seconds,
            )
            .await?,
        ),
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => {
            return Err(anyhow::anyhow!(
                "Redis feature not enabled. Enable with 'redis' feature flag."
            ))
        }
    };
    Ok(store)
}

fn print_leaderboard(entries: &[RankedEntry], top: usize) {
    println!(
        "\n{:>4}  {:<44}  {:>14}  {:>6}  {:>10}  {:>7}",
        "#".bold(),
        "address".bold(),
        "burned".bold(),
        "txs".bold(),
        "points".bold(),
        "amp %".bold()
    );
    for (rank, entry) in entries.iter().take(top).enumerate() {
        let points = entry.points.to_string();
        let points = if rank < 3 { points.yellow().bold() } else { points.normal() };
        let lab = entry
            .lab_work_points
            .map(|p| format!(" (+{} lab)", p).cyan().to_string())
            .unwrap_or_default();
        println!(
            "{:>4}  {:<44}  {:>14}  {:>6}  {:>10}  {:>7}{}",
            rank + 1,
            entry.address,
            entry.burned.round_dp(2).to_string(),
            entry.tx_count,
            points,
            entry.amp_percent.to_string(),
            lab
        );
    }
    if entries.len() > top {
        println!("{}", format!("... {} more", entries.len() - top).dimmed());
    }
}

/// Prints progress lines until the stream completes.
fn spawn_progress_printer(mut rx: mpsc::UnboundedReceiver<ScanEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ScanEvent::Progress(progress) => {
                    println!("{} {}", "⏳".dimmed(), progress.status.dimmed());
                }
                ScanEvent::Completed { entries } => {
                    println!("{} {} entries", "✅ Completed:".green(), entries.len());
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging()?;

    println!("🔥 Starting Leaderboard Scanner");
    println!("═══════════════════════════════════════════════════════════════════\n");

    // 1. Load settings
    let settings = Settings::from_path(&args.config)?;
    println!("✅ Settings loaded (mint {})", settings.scanner.mint_address);

    // 2. Ledger client
    let client = Arc::new(SolanaRpcClient::from_settings(&settings.rpc)?);
    println!("✅ RPC client ready ({})", settings.rpc.http_url);

    // 3. Cache
    let store = build_store(&settings).await?;
    let cache = Arc::new(LeaderboardCache::new(store.clone(), settings.cache_config()));
    println!("✅ Cache ready ({} tier)", store.name());

    // 4. Sources and shared bonus map
    let file_sources = Arc::new(JsonFileSources::new(
        settings.sources.periods_path(),
        settings.sources.bonus_points_path(),
    ));
    let bonus_points = SharedBonusPoints::new();
    let orchestrator = Orchestrator::from_settings(
        &settings,
        client.clone(),
        file_sources.clone(),
        Arc::new(bonus_points.clone()),
        cache,
    )?;
    let parser = orchestrator.parser().clone();

    let shutdown = CancellationToken::new();
    let bonus_poller = Arc::new(BonusMapPoller::new(
        file_sources,
        bonus_points.clone(),
        Duration::from_secs(settings.pollers.bonus_map_interval_seconds),
        shutdown.child_token(),
    ));
    // warm the bonus map before the first scan
    if let Err(e) = bonus_poller.refresh_once().await {
        println!("{} {:#}", "⚠️ Bonus map unavailable:".yellow(), e);
    }

    if !args.watch {
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = spawn_progress_printer(rx);
        let entries = orchestrator.leaderboard(Some(tx)).await?;
        printer.await.context("progress printer panicked")?;
        print_leaderboard(&entries, args.top);
        return Ok(());
    }

    // 5. Watch mode: pollers + periodic refresh
    let tracker = LatestBurnTracker::new();
    let latest_poller = Arc::new(
        LatestBurnPoller::new(client, parser, tracker.clone(), shutdown.child_token())
            .with_limit(settings.pollers.latest_burn_limit)
            .with_interval(Duration::from_secs(settings.pollers.latest_burn_interval_seconds))
            .with_request_timeout(settings.rpc.request_timeout()),
    );
    let poller_handles = vec![
        tokio::spawn(bonus_poller.start()),
        tokio::spawn(latest_poller.start()),
    ];

    let orchestrator = Arc::new(orchestrator);
    let refresh_handle = {
        let orchestrator = Arc::clone(&orchestrator);
        let shutdown = shutdown.clone();
        let top = args.top;
        let refresh_every = Duration::from_secs(settings.pollers.refresh_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = interval(refresh_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let (tx, rx) = mpsc::unbounded_channel();
                let printer = spawn_progress_printer(rx);
                match orchestrator.refresh(Some(tx)).await {
                    Ok(entries) => {
                        let _ = printer.await;
                        print_leaderboard(&entries, top);
                        if let Some(latest) = tracker.latest() {
                            println!(
                                "{} {} burned {}",
                                "🔥 Latest burn:".red(),
                                latest.address,
                                latest.event.amount
                            );
                        }
                    }
                    Err(e) => {
                        let _ = printer.await;
                        tracing::warn!("⚠️ Refresh did not complete: {}", e);
                    }
                }
            }
        })
    };

    println!("💡 Service running:");
    println!(
        "   - Full refresh every {} seconds",
        settings.pollers.refresh_interval_seconds
    );
    println!(
        "   - Latest burn poll every {} seconds",
        settings.pollers.latest_burn_interval_seconds
    );
    println!("\nPress Ctrl+C to stop gracefully...\n");

    signal::ctrl_c().await?;
    println!("\n🛑 Shutdown signal received, stopping tasks...");

    shutdown.cancel();
    orchestrator.cancel_current();
    futures::future::join_all(poller_handles).await;
    refresh_handle.abort();

    println!("✅ Shutdown complete");

    Ok(())
}
