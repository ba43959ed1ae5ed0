//! Serializable backtest configuration.
//!
//! `BacktestConfig` is the TOML-authored counterpart to
//! [`alphasim_core::engine::EngineConfig`]: the engine config carries the
//! tunables the tick loop needs in memory, while this struct adds the
//! date range and universe a standalone backtest run is scoped to, plus a
//! content hash for cache/run identification (`run_id`), mirroring the
//! teacher's `RunConfig::run_id` via `blake3`.

use alphasim_core::domain::Ticker;
use alphasim_core::engine::EngineConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config is invalid: {0}")]
    Invalid(String),
}

/// Serializable configuration for a single backtest run.
///
/// Captures everything needed to reproduce a run from `(config, dataset)`:
/// the engine tunables, the date range, and the universe of tickers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestConfig {
    pub engine: EngineConfig,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub universe: Vec<Ticker>,
}

impl BacktestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load_toml(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.is_empty() {
            return Err(ConfigError::Invalid("universe must not be empty".into()));
        }
        if self.end_date < self.start_date {
            return Err(ConfigError::Invalid(
                "end_date must not precede start_date".into(),
            ));
        }
        if self.engine.top_n == 0 {
            return Err(ConfigError::Invalid("top_n must be positive".into()));
        }
        Ok(())
    }

    /// Deterministic content hash of this configuration, used to key the
    /// result cache so two runs with identical configs can share a cached
    /// result.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("BacktestConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
