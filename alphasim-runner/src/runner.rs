//! Backtest runner — wires a bar table, calendar, and ranker into a
//! complete [`alphasim_core::engine::Engine`] run and folds the result into
//! a [`BacktestResult`] with computed performance statistics.
//!
//! `run_backtest` is the single entry point for a full-history run; `run_sweep`
//! layers an embarrassingly-parallel map over independent `(config, bars)`
//! pairs on top of it for parameter sweeps, grounded in the teacher's own
//! `rayon`-backed sweep/walk-forward machinery (SPEC_FULL.md §5's ambient
//! addition — no shared mutable state crosses run boundaries).

use std::collections::HashMap;

use alphasim_core::domain::{Bar, Ticker};
use alphasim_core::engine::{Engine, EngineConfig};
use alphasim_core::price_index::PriceIndex;
use alphasim_core::scheduler::Scheduler;
use alphasim_core::signal_pipeline::{FeatureTable, Ranker};
use alphasim_core::tradability::TradabilityMap;
use chrono::NaiveDate;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{BacktestConfig, ConfigError};
use crate::metrics::PerformanceMetrics;
use crate::result::{BacktestResult, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine error: {0}")]
    Engine(#[from] alphasim_core::domain::EngineError),
    #[error("trading calendar is empty for the configured date range")]
    EmptyCalendar,
}

pub struct Runner;

impl Runner {
    /// Run a single backtest over the full supplied history.
    ///
    /// `calendar` must be the externally supplied trading-date sequence
    /// already clipped to `[config.start_date, config.end_date]`; `bars`
    /// is the clean bar table for the same window.
    pub fn run_backtest(
        config: &BacktestConfig,
        calendar: Vec<NaiveDate>,
        bars: Vec<Bar>,
        features_by_date: &HashMap<NaiveDate, FeatureTable>,
        ranker: &dyn Ranker,
    ) -> Result<BacktestResult, RunError> {
        config.validate()?;
        if calendar.is_empty() {
            return Err(RunError::EmptyCalendar);
        }

        let tradability = TradabilityMap::build(bars.iter());
        let price_index = PriceIndex::build(bars.iter().cloned());
        let mut scheduler = Scheduler::new(
            calendar.clone(),
            config.engine.rebalance_freq,
            config.engine.holding_period_days,
        );
        if let Some(batch) = config.engine.batch_rebalance {
            scheduler = scheduler.with_batch(batch, 0);
        }

        let engine = Engine::new(config.engine.clone(), &price_index, &tradability, scheduler);
        let run_result = engine.run(ranker, &config.universe, features_by_date)?;

        let metrics = PerformanceMetrics::compute(&run_result.nav_curve, &run_result.trades);
        Ok(BacktestResult {
            schema_version: SCHEMA_VERSION,
            run_id: config.run_id(),
            metrics,
            trades: run_result.trades,
            nav_curve: run_result.nav_curve,
            start_date: config.start_date,
            end_date: config.end_date,
            bar_count: run_result.bar_count,
            data_quality_warnings: run_result.data_quality_warnings,
        })
    }

    /// Run an independent batch of `(config, calendar, bars)` triples in
    /// parallel. Each triple gets its own `Engine`/`PriceIndex`/
    /// `TradabilityMap` instance; nothing is shared across the map, so a
    /// panic or error in one run cannot corrupt another's state.
    pub fn run_sweep<'a>(
        jobs: Vec<(BacktestConfig, Vec<NaiveDate>, Vec<Bar>)>,
        features_by_date: &HashMap<NaiveDate, FeatureTable>,
        ranker: &'a (dyn Ranker + Sync),
    ) -> Vec<Result<BacktestResult, RunError>> {
        jobs.into_par_iter()
            .map(|(config, calendar, bars)| {
                Self::run_backtest(&config, calendar, bars, features_by_date, ranker)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphasim_core::domain::Bar as CoreBar;
    use rust_decimal_macros::dec;

    struct AlwaysTop;
    impl Ranker for AlwaysTop {
        fn generate_ranked(
            &self,
            _date: NaiveDate,
            universe: &[Ticker],
            _features: &FeatureTable,
        ) -> Vec<(Ticker, f64)> {
            universe.iter().map(|t| (t.clone(), 1.0)).collect()
        }
    }

    fn bar(ticker: &str, date: NaiveDate, close: f64) -> CoreBar {
        CoreBar {
            ticker: Ticker::new(ticker),
            date,
            open: close,
            high: close,
            low: close,
            close,
            open_adj: close,
            close_adj: close,
            volume: 1000,
            amount: close * 1000.0,
            is_st: false,
            is_suspended: false,
            is_limit_up: false,
            is_limit_down: false,
        }
    }

    fn calendar(n: u32) -> Vec<NaiveDate> {
        (2..2 + n).map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap()).collect()
    }

    fn config(universe: Vec<Ticker>, cal: &[NaiveDate]) -> BacktestConfig {
        BacktestConfig {
            engine: EngineConfig {
                initial_capital: dec!(100_000),
                top_n: 1,
                max_gross_exposure: 1.0,
                ..EngineConfig::default()
            },
            start_date: *cal.first().unwrap(),
            end_date: *cal.last().unwrap(),
            universe,
        }
    }

    #[test]
    fn end_to_end_backtest_produces_nav_and_run_id() {
        let cal = calendar(5);
        let bars: Vec<CoreBar> = cal.iter().map(|d| bar("A", *d, 10.0)).collect();
        let cfg = config(vec![Ticker::new("A")], &cal);
        let result =
            Runner::run_backtest(&cfg, cal.clone(), bars, &HashMap::new(), &AlwaysTop).unwrap();
        assert_eq!(result.nav_curve.len(), 5);
        assert_eq!(result.run_id, cfg.run_id());
    }

    #[test]
    fn empty_calendar_is_rejected() {
        let cfg = config(vec![Ticker::new("A")], &calendar(1));
        let err = Runner::run_backtest(&cfg, Vec::new(), Vec::new(), &HashMap::new(), &AlwaysTop)
            .unwrap_err();
        assert!(matches!(err, RunError::EmptyCalendar));
    }

    #[test]
    fn sweep_runs_independent_configs_in_parallel() {
        let cal = calendar(3);
        let bars_a: Vec<CoreBar> = cal.iter().map(|d| bar("A", *d, 10.0)).collect();
        let bars_b: Vec<CoreBar> = cal.iter().map(|d| bar("B", *d, 20.0)).collect();
        let jobs = vec![
            (config(vec![Ticker::new("A")], &cal), cal.clone(), bars_a),
            (config(vec![Ticker::new("B")], &cal), cal.clone(), bars_b),
        ];
        let results = Runner::run_sweep(jobs, &HashMap::new(), &AlwaysTop);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
    }
}
