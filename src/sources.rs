//! Inputs that live outside the ledger: amplifier period configuration and the curated
//! bonus point map.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

use crate::amplifier::{CurrentPeriodConfig, HistoricalPeriodRecord};
use crate::types::BonusPointMap;

#[async_trait]
pub trait PeriodConfigSource: Send + Sync {
    async fn current_period(&self) -> Result<Option<CurrentPeriodConfig>>;

    async fn historical_periods(&self) -> Result<Vec<HistoricalPeriodRecord>>;
}

#[async_trait]
pub trait BonusPointSource: Send + Sync {
    async fn bonus_points(&self) -> Result<BonusPointMap>;
}

/// Fixed inputs, handy in tests and for offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticSources {
    pub current: Option<CurrentPeriodConfig>,
    pub history: Vec<HistoricalPeriodRecord>,
    pub bonus_points: BonusPointMap,
}

#[async_trait]
impl PeriodConfigSource for StaticSources {
    async fn current_period(&self) -> Result<Option<CurrentPeriodConfig>> {
        Ok(self.current.clone())
    }

    async fn historical_periods(&self) -> Result<Vec<HistoricalPeriodRecord>> {
        Ok(self.history.clone())
    }
}

#[async_trait]
impl BonusPointSource for StaticSources {
    async fn bonus_points(&self) -> Result<BonusPointMap> {
        Ok(self.bonus_points.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PeriodsFile {
    #[serde(default)]
    current: Option<CurrentPeriodConfig>,
    #[serde(default)]
    history: Vec<HistoricalPeriodRecord>,
}

/// Reads both inputs from JSON files on every call, so edits are picked up without a
/// restart. An unset path behaves like an empty file.
///
/// Periods file: `{"current": {...}, "history": [...]}`. Bonus file: `{"<address>": points}`.
#[derive(Debug, Clone, Default)]
pub struct JsonFileSources {
    pub periods_path: Option<PathBuf>,
    pub bonus_points_path: Option<PathBuf>,
}

impl JsonFileSources {
    pub fn new(periods_path: Option<PathBuf>, bonus_points_path: Option<PathBuf>) -> Self {
        Self {
            periods_path,
            bonus_points_path,
        }
    }

    async fn read_periods(&self) -> Result<PeriodsFile> {
        let Some(path) = &self.periods_path else {
            return Ok(PeriodsFile::default());
        };
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read periods file {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse periods file {}", path.display()))
    }
}

#[async_trait]
impl PeriodConfigSource for JsonFileSources {
    async fn current_period(&self) -> Result<Option<CurrentPeriodConfig>> {
        Ok(self.read_periods().await?.current)
    }

    async fn historical_periods(&self) -> Result<Vec<HistoricalPeriodRecord>> {
        Ok(self.read_periods().await?.history)
    }
}

#[async_trait]
impl BonusPointSource for JsonFileSources {
    async fn bonus_points(&self) -> Result<BonusPointMap> {
        let Some(path) = &self.bonus_points_path else {
            return Ok(BonusPointMap::new());
        };
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read bonus points file {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse bonus points file {}", path.display()))
    }
}
