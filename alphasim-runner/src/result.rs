//! BacktestResult — everything a completed backtest run hands the caller:
//! the NAV series, the trade log, and derived performance statistics.

use alphasim_core::domain::TradeRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::RunId;
use crate::metrics::PerformanceMetrics;

/// Current schema version for persisted result artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run over a full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    /// (date, NAV as a multiple of initial capital), one point per trading day.
    pub nav_curve: Vec<(NaiveDate, f64)>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_quality_warnings: Vec<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn final_nav(&self) -> f64 {
        self.nav_curve.last().map(|(_, v)| *v).unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PerformanceMetrics;

    fn sample() -> BacktestResult {
        let nav_curve = vec![
            (NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 1.0),
            (NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 1.05),
        ];
        BacktestResult {
            schema_version: SCHEMA_VERSION,
            run_id: "abc123".into(),
            metrics: PerformanceMetrics::compute(&nav_curve, &[]),
            trades: Vec::new(),
            nav_curve,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            bar_count: 2,
            data_quality_warnings: Vec::new(),
        }
    }

    #[test]
    fn final_nav_reads_last_point() {
        assert!((sample().final_nav() - 1.05).abs() < 1e-9);
    }

    #[test]
    fn serialization_roundtrip_preserves_schema_version() {
        let r = sample();
        let json = serde_json::to_string(&r).unwrap();
        let back: BacktestResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
        assert_eq!(back.run_id, r.run_id);
    }

    #[test]
    fn missing_schema_version_defaults_on_deserialize() {
        let json = r#"{
            "run_id": "x",
            "metrics": {"total_return":0.0,"cagr":0.0,"sharpe":0.0,"sortino":0.0,"calmar":0.0,
                "max_drawdown":0.0,"win_rate":0.0,"profit_factor":0.0,"trade_count":0,
                "turnover":0.0,"max_consecutive_wins":0,"max_consecutive_losses":0,
                "avg_losing_streak":0.0},
            "trades": [],
            "nav_curve": [],
            "start_date": "2024-01-02",
            "end_date": "2024-01-02",
            "bar_count": 0,
            "data_quality_warnings": []
        }"#;
        let back: BacktestResult = serde_json::from_str(json).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
    }
}
