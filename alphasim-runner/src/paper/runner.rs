//! PaperRunner — the single-day, persistent counterpart to [`crate::runner::Runner`].
//!
//! Where a backtest replays a whole calendar through one in-memory `Engine`,
//! the paper runner holds the engine's state on disk between invocations and
//! advances it one trading day per `tick` call, with idempotency sentinels so
//! re-invoking `run --trade-date D` twice is a no-op the second time.

use std::path::PathBuf;

use alphasim_core::domain::{Bar, Portfolio, Ticker};
use alphasim_core::engine::{Engine, EngineState};
use alphasim_core::pending_queue::PendingOrderQueue;
use alphasim_core::price_index::PriceIndex;
use alphasim_core::scheduler::Scheduler;
use alphasim_core::signal_pipeline::{FeatureTable, Ranker};
use alphasim_core::tradability::TradabilityMap;
use chrono::NaiveDate;
use thiserror::Error;

use crate::config::ConfigError;
use crate::paper::config::PaperConfig;
use crate::paper::state::{
    read_json, write_json_atomic, RebalanceState, RunSentinel, StopLossState,
};
use crate::paper::storage;

#[derive(Debug, Error)]
pub enum PaperError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine error: {0}")]
    Engine(#[from] alphasim_core::domain::EngineError),
    #[error("no trading day on or after {0}")]
    NoTradingDayOnOrAfter(NaiveDate),
    #[error("persisted state at {path} is corrupt: {reason}")]
    CorruptState { path: String, reason: String },
}

/// Result of a single `tick` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick for this date ran and persisted new state.
    Executed { date: NaiveDate },
    /// `runs/t1_{date}.json` already existed; no-op, per the idempotency
    /// contract (SPEC_FULL.md §4.12, error class 5).
    AlreadyDone { date: NaiveDate },
}

pub struct PaperRunner {
    root: PathBuf,
}

impl PaperRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }
    fn account_path(&self) -> PathBuf {
        self.root.join("state").join("account.json")
    }
    fn stop_loss_path(&self) -> PathBuf {
        self.root.join("state").join("stop_loss_state.json")
    }
    fn pending_sells_path(&self) -> PathBuf {
        self.root.join("pending_sells").join("pending_sells.json")
    }
    fn pending_path(&self, date: NaiveDate) -> PathBuf {
        self.root.join("pending").join(format!("{}.parquet", fmt_date(date)))
    }
    fn trades_path(&self) -> PathBuf {
        self.root.join("trades").join("trades.parquet")
    }
    fn nav_path(&self) -> PathBuf {
        self.root.join("nav").join("nav.parquet")
    }
    fn rebalance_state_path(&self) -> PathBuf {
        self.root.join("runs").join("rebalance_state.json")
    }
    fn t0_sentinel_path(&self, date: NaiveDate) -> PathBuf {
        self.root.join("runs").join(format!("t0_{}.json", fmt_date(date)))
    }
    fn t1_sentinel_path(&self, date: NaiveDate) -> PathBuf {
        self.root.join("runs").join(format!("t1_{}.json", fmt_date(date)))
    }

    pub fn init(&self, config: &PaperConfig) -> Result<(), PaperError> {
        config.save(self.config_path())?;
        Ok(())
    }

    pub fn load_config(&self) -> Result<PaperConfig, PaperError> {
        Ok(PaperConfig::load(self.config_path())?)
    }

    /// Roll `requested` forward to the next date present in `calendar`.
    pub fn normalize_trade_date(calendar: &[NaiveDate], requested: NaiveDate) -> Option<NaiveDate> {
        calendar.iter().copied().find(|d| *d >= requested)
    }

    fn load_account(&self, initial_capital: rust_decimal::Decimal) -> Result<Portfolio, PaperError> {
        match read_json::<Portfolio>(&self.account_path())? {
            Some(p) => Ok(p),
            None => Ok(Portfolio::new(initial_capital)),
        }
    }

    fn load_pending_queue(
        &self,
        max_retries: u32,
        max_retry_days: u32,
    ) -> Result<PendingOrderQueue, PaperError> {
        match read_json::<PendingOrderQueue>(&self.pending_sells_path())? {
            Some(q) => Ok(q),
            None => Ok(PendingOrderQueue::new(max_retries, max_retry_days)),
        }
    }

    /// Advance the paper account by one trading day.
    ///
    /// `bars` must cover at least every date up to and including the
    /// normalized trade date; `calendar` is the externally supplied trading
    /// calendar clipped to the same window (ensured by the caller's
    /// `ensure(date)` data hook — an external collaborator, per SPEC_FULL.md
    /// §1, not something this runner reaches for itself).
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &self,
        calendar: &[NaiveDate],
        trade_date: NaiveDate,
        universe: &[Ticker],
        bars: Vec<Bar>,
        features: &FeatureTable,
        ranker: &dyn Ranker,
    ) -> Result<TickOutcome, PaperError> {
        let date = Self::normalize_trade_date(calendar, trade_date)
            .ok_or(PaperError::NoTradingDayOnOrAfter(trade_date))?;

        let t1_path = self.t1_sentinel_path(date);
        if t1_path.exists() {
            tracing::info!(%date, "t1 already completed for this date, no-op");
            return Ok(TickOutcome::AlreadyDone { date });
        }

        let config = self.load_config()?;
        let engine_config = config.to_engine_config();

        let portfolio = self.load_account(engine_config.initial_capital)?;
        let pending_queue = self.load_pending_queue(
            engine_config.pending_max_retries,
            engine_config.pending_max_retry_days,
        )?;
        let pending_target_weights = {
            let weights = storage::read_pending_weights(&self.pending_path(date))?;
            if weights.is_empty() {
                None
            } else {
                Some(weights)
            }
        };
        let state = EngineState::from_parts(portfolio, pending_queue, pending_target_weights);

        let tradability = TradabilityMap::build(bars.iter());
        let price_index = PriceIndex::build(bars);

        let rebalance_state: RebalanceState =
            read_json(&self.rebalance_state_path())?.unwrap_or_default();
        let mut scheduler = Scheduler::new(
            calendar.to_vec(),
            engine_config.rebalance_freq,
            engine_config.holding_period_days,
        )
        .with_last_rebalance_date(rebalance_state.last_rebalance_date);
        if let Some(batch) = engine_config.batch_rebalance {
            scheduler = scheduler.with_batch(batch, 0);
        }

        let mut engine = Engine::from_state(engine_config, &price_index, &tradability, scheduler, state);
        engine.step(date, ranker, universe, features)?;
        let warnings = engine.warnings().to_vec();
        for w in &warnings {
            tracing::warn!("{w}");
        }
        // `mark_rebalanced` has already run inside `step` if `date` triggered
        // a rebalance, so the scheduler's own `last_rebalance_date` equaling
        // `date` is now the signal rather than a fresh `is_rebalance_day` call.
        let did_rebalance = engine.scheduler().last_rebalance_date() == Some(date);
        let fill_date = engine.scheduler().next_trading_day(date);
        let mut new_state = engine.into_state();

        let new_trades = std::mem::take(&mut new_state.portfolio.trade_log);
        let new_nav = std::mem::take(&mut new_state.portfolio.nav_history);

        storage::append_trades(&self.trades_path(), &new_trades)?;
        storage::append_nav(&self.nav_path(), &new_nav)?;

        write_json_atomic(&self.account_path(), &new_state.portfolio)?;
        write_json_atomic(
            &self.stop_loss_path(),
            &StopLossState::from_portfolio(&new_state.portfolio),
        )?;
        write_json_atomic(&self.pending_sells_path(), &new_state.pending_queue)?;

        if let Some(weights) = &new_state.pending_target_weights {
            if let Some(fill_date) = fill_date {
                storage::write_pending_weights(&self.pending_path(fill_date), weights)?;
            }
        }

        if did_rebalance {
            let mut rebalance_state = rebalance_state;
            rebalance_state.last_rebalance_date = Some(date);
            write_json_atomic(&self.rebalance_state_path(), &rebalance_state)?;
        }

        let sentinel = RunSentinel { date, completed_at: chrono::Local::now().naive_local() };
        write_json_atomic(&self.t0_sentinel_path(date), &sentinel)?;
        write_json_atomic(&self.t1_sentinel_path(date), &sentinel)?;

        Ok(TickOutcome::Executed { date })
    }

    /// Current positions, mark-to-market against `bars` (the caller-supplied
    /// bar table for `as_of`).
    pub fn positions(&self, as_of: NaiveDate, bars: &[Bar]) -> Result<Portfolio, PaperError> {
        let config = self.load_config()?;
        let mut portfolio = self.load_account(config.initial_capital)?;
        let price_index = PriceIndex::build(bars.iter().cloned());
        let prices = price_index.pnl_closes_on(as_of);
        portfolio.mark_to_market(as_of, &prices);
        Ok(portfolio)
    }
}

fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphasim_core::signal_pipeline::FeatureTable;
    use tempfile::tempdir;

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

    fn bar(ticker: &str, date: NaiveDate, close: f64) -> Bar {
        Bar {
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

    #[test]
    fn normalize_rolls_forward_to_next_trading_day() {
        let cal = calendar(5);
        let requested = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let normalized = PaperRunner::normalize_trade_date(&cal, requested).unwrap();
        assert_eq!(normalized, cal[0]);
    }

    #[test]
    fn repeated_tick_on_same_date_is_idempotent() {
        let dir = tempdir().unwrap();
        let runner = PaperRunner::new(dir.path());
        let cfg = PaperConfig {
            universe: crate::paper::config::UniverseSelector::Mainboard,
            top_n: 1,
            rebalance_freq: 1,
            ..PaperConfig::default()
        };
        runner.init(&cfg).unwrap();

        let cal = calendar(3);
        let bars: Vec<Bar> = cal.iter().map(|d| bar("A", *d, 10.0)).collect();
        let universe = vec![Ticker::new("A")];
        let features = FeatureTable::new();

        let first = runner
            .tick(&cal, cal[0], &universe, bars.clone(), &features, &AlwaysTop)
            .unwrap();
        assert!(matches!(first, TickOutcome::Executed { .. }));

        let second = runner
            .tick(&cal, cal[0], &universe, bars, &features, &AlwaysTop)
            .unwrap();
        assert!(matches!(second, TickOutcome::AlreadyDone { .. }));
    }
}
