//! Persisted paper-account state: `state/account.json` and
//! `state/stop_loss_state.json`, plus the rebalance/idempotency sentinels
//! under `runs/`.
//!
//! `StopLossState` is a read-only sidecar derived from the portfolio's own
//! lots (which already carry `high_water_pnl_price` and
//! `consecutive_limit_down_days`) — the same "denormalized view for quick
//! operator inspection" pattern the teacher uses for its cache metadata
//! sidecars, not a second source of truth the engine reads from.

use std::collections::HashMap;
use std::path::Path;

use alphasim_core::domain::{Portfolio, Ticker};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossEntry {
    pub high_water_pnl_price: f64,
    pub consecutive_limit_down_days: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopLossState {
    pub by_ticker: HashMap<Ticker, StopLossEntry>,
}

impl StopLossState {
    pub fn from_portfolio(portfolio: &Portfolio) -> Self {
        let by_ticker = portfolio
            .positions
            .iter()
            .map(|(ticker, lot)| {
                (
                    ticker.clone(),
                    StopLossEntry {
                        high_water_pnl_price: lot.high_water_pnl_price,
                        consecutive_limit_down_days: lot.consecutive_limit_down_days,
                    },
                )
            })
            .collect();
        Self { by_ticker }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebalanceState {
    pub last_rebalance_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSentinel {
    pub date: NaiveDate,
    pub completed_at: chrono::NaiveDateTime,
}

/// Atomically write `value` as pretty JSON to `path` (write-then-rename, as
/// the teacher's cache layer does for its Parquet partitions).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(&tmp, json).map_err(|source| ConfigError::Io {
        path: tmp.display().to_string(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(serde_json::from_str(&raw)?))
}
