use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::burn_parser::{SPL_TOKEN_2022_PROGRAM_ID, SPL_TOKEN_PROGRAM_ID};
use crate::cache::{CacheConfig, DEFAULT_SLOT_KEY};
use crate::scanner::{ScannerConfig, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    pub http_url: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Requests per second towards the node; unlimited when unset.
    #[serde(default)]
    pub qps_limit: Option<u32>,
}

fn default_request_timeout_seconds() -> u64 {
    12
}

impl Rpc {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Scanner {
    pub mint_address: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Used only when an instruction carries a raw amount without its own decimals.
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,
    #[serde(default = "default_token_program_ids")]
    pub token_program_ids: Vec<String>,
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_token_decimals() -> u8 {
    6
}
fn default_token_program_ids() -> Vec<String> {
    vec![
        SPL_TOKEN_PROGRAM_ID.to_string(),
        SPL_TOKEN_2022_PROGRAM_ID.to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    File,
    Redis,
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::Memory
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "file" => Ok(CacheBackend::File),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(ConfigError::Message(format!("unknown cache backend '{}'", other))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Cache {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_leaderboard_ttl_seconds")]
    pub leaderboard_ttl_seconds: u64,
    #[serde(default = "default_market_ttl_seconds")]
    pub market_ttl_seconds: u64,
    #[serde(default = "default_slot_key")]
    pub slot_key: String,
    #[serde(default = "default_file_dir")]
    pub file_dir: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

fn default_leaderboard_ttl_seconds() -> u64 {
    60
}
fn default_market_ttl_seconds() -> u64 {
    30
}
fn default_slot_key() -> String {
    DEFAULT_SLOT_KEY.to_string()
}
fn default_file_dir() -> String {
    ".leaderboard-cache".to_string()
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            leaderboard_ttl_seconds: default_leaderboard_ttl_seconds(),
            market_ttl_seconds: default_market_ttl_seconds(),
            slot_key: default_slot_key(),
            file_dir: default_file_dir(),
            redis_url: default_redis_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Sources {
    #[serde(default)]
    pub periods_path: Option<String>,
    #[serde(default)]
    pub bonus_points_path: Option<String>,
}

impl Sources {
    pub fn periods_path(&self) -> Option<PathBuf> {
        self.periods_path.as_ref().map(PathBuf::from)
    }

    pub fn bonus_points_path(&self) -> Option<PathBuf> {
        self.bonus_points_path.as_ref().map(PathBuf::from)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Pollers {
    #[serde(default = "default_latest_burn_interval_seconds")]
    pub latest_burn_interval_seconds: u64,
    #[serde(default = "default_latest_burn_limit")]
    pub latest_burn_limit: usize,
    #[serde(default = "default_bonus_map_interval_seconds")]
    pub bonus_map_interval_seconds: u64,
    /// Full rescan cadence in watch mode.
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,
}

fn default_latest_burn_interval_seconds() -> u64 {
    15
}
fn default_latest_burn_limit() -> usize {
    10
}
fn default_bonus_map_interval_seconds() -> u64 {
    300
}
fn default_refresh_interval_seconds() -> u64 {
    60
}

impl Default for Pollers {
    fn default() -> Self {
        Self {
            latest_burn_interval_seconds: default_latest_burn_interval_seconds(),
            latest_burn_limit: default_latest_burn_limit(),
            bonus_map_interval_seconds: default_bonus_map_interval_seconds(),
            refresh_interval_seconds: default_refresh_interval_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: Rpc,
    pub scanner: Scanner,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub sources: Sources,
    #[serde(default)]
    pub pollers: Pollers,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path("Config.toml")
    }

    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = non_empty_env("LEADERBOARD_RPC_URL") {
            self.rpc.http_url = url;
        }
        if let Some(mint) = non_empty_env("LEADERBOARD_MINT") {
            self.scanner.mint_address = mint;
        }
        if let Some(backend) = non_empty_env("LEADERBOARD_CACHE_BACKEND") {
            self.cache.backend = backend.parse()?;
        }
        if let Some(redis_url) = non_empty_env("LEADERBOARD_REDIS_URL") {
            self.cache.redis_url = redis_url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.rpc.http_url).map_err(|e| {
            ConfigError::Message(format!("invalid rpc.http_url '{}': {}", self.rpc.http_url, e))
        })?;
        if self.scanner.page_size == 0 {
            return Err(ConfigError::Message("scanner.page_size must be > 0".to_string()));
        }
        if self.scanner.max_pages == 0 {
            return Err(ConfigError::Message("scanner.max_pages must be > 0".to_string()));
        }
        if self.rpc.qps_limit == Some(0) {
            return Err(ConfigError::Message("rpc.qps_limit must be > 0 when set".to_string()));
        }
        Ok(())
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            max_pages: self.scanner.max_pages,
            page_size: self.scanner.page_size,
            request_timeout: self.rpc.request_timeout(),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            leaderboard_ttl: Duration::from_secs(self.cache.leaderboard_ttl_seconds),
            market_ttl: Duration::from_secs(self.cache.market_ttl_seconds),
            slot_key: self.cache.slot_key.clone(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
