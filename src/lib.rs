//! # Burn Leaderboard SDK
//!
//! Builds a points leaderboard for everyone who has burned a given SPL token. Burn history
//! is reconstructed from the ledger, scored with time-boxed amplifier bonuses and
//! externally awarded bonus points, and cached for fast repeat reads.
//!
//! ## Overview
//!
//! - **Scanning**: paginated, cancellable walk over the mint's signature history
//! - **Amplifiers**: challenge periods that add a stackable percentage bonus
//! - **Scoring**: deterministic ranking of per-address burn aggregates
//! - **Caching**: in-memory tier backed by a persisted tier that survives restarts
//!
//! ## Architecture
//!
//! ### Ledger Layer
//! [`ledger_client::LedgerClient`] abstracts the node. [`rpc_client::SolanaRpcClient`] talks
//! JSON-RPC; tests plug in their own implementation.
//!
//! ### Scan & Score Layer
//! The [`scanner`] decodes burns through [`burn_parser`] into aggregates, [`amplifier`] turns
//! period configuration into windows, and [`scoring`] ranks the result.
//!
//! ### Serving Layer
//! The [`orchestrator`] runs the cycle end to end, [`cache`] keeps the latest ranking, and
//! [`pollers`] keep the bonus map and latest burn warm between scans.

// Core Types
/// Data model and numeric conversions
pub mod types;
/// Terminal errors of a scan cycle
pub mod error;

// Ledger Layer
/// Ledger collaborator trait and wire types
pub mod ledger_client;
/// JSON-RPC ledger client
pub mod rpc_client;
/// Burn instruction decoding
pub mod burn_parser;

// Scan & Score Layer
/// Amplifier window builder and bonus scoring
pub mod amplifier;
/// Scoring engine
pub mod scoring;
/// Paginated transaction scanner
pub mod scanner;
/// Scan-to-score cycle
pub mod orchestrator;

// Serving Layer
/// Two-tier leaderboard cache
pub mod cache;
/// Persisted tier backends
pub mod snapshot_store;
/// Period configuration and bonus point collaborators
pub mod sources;
/// Background pollers
pub mod pollers;

// Infrastructure
/// Metrics and observability
pub mod metrics;
/// General utilities
pub mod utils;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use cache::LeaderboardCache;
pub use error::LeaderboardError;
pub use ledger_client::LedgerClient;
pub use orchestrator::{run_scan, Orchestrator};
pub use scanner::{ScanEvent, TransactionScanner};
pub use settings::Settings;
pub use types::RankedEntry;
