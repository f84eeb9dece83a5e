//! Terminal errors surfaced by a scan cycle.
//!
//! Everything else (RPC failures, malformed instructions, bad period config, cache outages)
//! is degraded locally and never reaches the caller.

use config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("Invalid mint address: {0}")]
    InvalidMint(String),
    #[error("Scan cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T, E = LeaderboardError> = std::result::Result<T, E>;
