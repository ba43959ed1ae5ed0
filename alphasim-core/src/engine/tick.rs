//! The per-day tick loop (SPEC_FULL.md §2):
//!
//! ```text
//! tick(D) :=
//!   1. retry(PendingOrderQueue, D)
//!   2. for each open position: StopLossMonitor.update_and_check(D) -> enqueue sells
//!   3. execute holding-period exits whose due-date == D
//!   4. execute T+1 fills from signals generated at D-1
//!   5. if Scheduler.is_rebalance_day(D): compute and stash weights for D+1
//!   6. mark-to-market on pnl_price at D; append NAV[D]
//! ```

use super::config::EngineConfig;
use super::result::RunResult;
use super::state::EngineState;
use crate::domain::{
    error::EngineError, pending_order::PendingOrderReason, target_weight::validate_weights,
    trade::SellType, PendingOrder, TargetWeight, Ticker,
};
use crate::equity_curve::EquityCurveController;
use crate::pending_queue::RetryOutcome;
use crate::price_index::PriceIndex;
use crate::risk_budget::RiskBudgetScaler;
use crate::scheduler::Scheduler;
use crate::signal_pipeline::{rank_and_backfill, FeatureTable, Ranker};
use crate::stop_loss::StopLossMonitor;
use crate::tradability::TradabilityMap;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub struct Engine<'a> {
    config: EngineConfig,
    price_index: &'a PriceIndex,
    tradability: &'a TradabilityMap,
    scheduler: Scheduler,
    stop_monitor: StopLossMonitor,
    equity_ctl: EquityCurveController,
    risk_scaler: RiskBudgetScaler,
    state: EngineState,
    warnings: Vec<String>,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: EngineConfig,
        price_index: &'a PriceIndex,
        tradability: &'a TradabilityMap,
        scheduler: Scheduler,
    ) -> Self {
        let state = EngineState::new(
            config.initial_capital,
            config.pending_max_retries,
            config.pending_max_retry_days,
        );
        Self {
            stop_monitor: StopLossMonitor::new(config.stop_loss),
            equity_ctl: EquityCurveController::new(config.equity_curve.clone()),
            risk_scaler: RiskBudgetScaler::new(config.risk_budget),
            config,
            price_index,
            tradability,
            scheduler,
            state,
            warnings: Vec::new(),
        }
    }

    /// Resume a previously persisted run: same wiring as [`Engine::new`],
    /// but the portfolio/pending-queue/pending-weights come from a prior
    /// session's [`EngineState`] rather than a fresh one. Used by the paper
    /// runner, which ticks one day at a time and reloads its state between
    /// invocations instead of replaying a whole calendar in one `run`.
    pub fn from_state(
        config: EngineConfig,
        price_index: &'a PriceIndex,
        tradability: &'a TradabilityMap,
        scheduler: Scheduler,
        state: EngineState,
    ) -> Self {
        Self {
            stop_monitor: StopLossMonitor::new(config.stop_loss),
            equity_ctl: EquityCurveController::new(config.equity_curve.clone()),
            risk_scaler: RiskBudgetScaler::new(config.risk_budget),
            config,
            price_index,
            tradability,
            scheduler,
            state,
            warnings: Vec::new(),
        }
    }

    pub fn portfolio(&self) -> &crate::domain::Portfolio {
        &self.state.portfolio
    }

    /// The engine's scheduler, including whatever rebalance-cadence state it
    /// has accumulated this run — read before `into_state` by callers (the
    /// paper runner) that need to persist `last_rebalance_date`.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Warnings accumulated since construction (or since the last `run`/`step`).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Run a single day's tick and return, leaving the engine's state
    /// steppable again. The counterpart to `run`'s whole-calendar sweep,
    /// for callers (paper mode) that persist state between individual days
    /// rather than holding the engine in memory for a full backtest.
    pub fn step(
        &mut self,
        date: NaiveDate,
        ranker: &dyn Ranker,
        universe: &[Ticker],
        features: &FeatureTable,
    ) -> Result<(), EngineError> {
        self.tick(date, ranker, universe, features)
    }

    /// Consume the engine, handing back its mutable state for persistence.
    pub fn into_state(self) -> EngineState {
        self.state
    }

    /// Run the full calendar, producing the NAV curve and trade log.
    pub fn run(
        mut self,
        ranker: &dyn Ranker,
        universe: &[Ticker],
        features_by_date: &HashMap<NaiveDate, FeatureTable>,
    ) -> Result<RunResult, EngineError> {
        let empty_features = FeatureTable::new();
        for date in self.scheduler.calendar().to_vec() {
            let features = features_by_date.get(&date).unwrap_or(&empty_features);
            self.tick(date, ranker, universe, features)?;
        }
        let final_equity = self
            .state
            .portfolio
            .nav_history
            .last()
            .map(|(_, nav)| *nav)
            .unwrap_or(1.0);
        Ok(RunResult {
            nav_curve: self.state.portfolio.nav_history.clone(),
            trades: self.state.portfolio.trade_log.clone(),
            final_equity,
            bar_count: self.scheduler.calendar().len(),
            data_quality_warnings: self.warnings,
        })
    }

    fn tick(
        &mut self,
        date: NaiveDate,
        ranker: &dyn Ranker,
        universe: &[Ticker],
        features: &FeatureTable,
    ) -> Result<(), EngineError> {
        // 1. Retry pending orders.
        self.retry_pending(date)?;

        // 2. Stop-loss monitor over every open position.
        self.check_stop_losses(date)?;

        // 3. Holding-period exits due today.
        self.check_holding_period_exits(date)?;

        // 4. Apply target weights computed on a prior rebalance day, whose
        //    fill day is today.
        self.apply_pending_rebalance(date)?;

        // 5. If today is a rebalance day, compute tomorrow's target weights.
        if self.scheduler.is_rebalance_day(date) {
            self.compute_rebalance_weights(date, ranker, universe, features)?;
        }

        // 6. Mark to market and append NAV.
        let prices = self.price_index.pnl_closes_on(date);
        self.state.portfolio.mark_to_market(date, &prices);
        Ok(())
    }

    fn retry_pending(&mut self, date: NaiveDate) -> Result<(), EngineError> {
        let tradability = self.tradability;
        let scheduler = &self.scheduler;
        let outcomes = {
            let is_tradable = |order: &PendingOrder| -> bool {
                use crate::domain::pending_order::Side;
                match order.side {
                    Side::Buy => tradability.can_buy(date, &order.ticker),
                    Side::Sell => tradability.can_sell(date, &order.ticker),
                }
            };
            let trading_days_since = |first: NaiveDate, to: NaiveDate| {
                scheduler.trading_days_since(first, to)
            };
            self.state
                .pending_queue
                .drain_retryable(date, is_tradable, trading_days_since)
        };
        for outcome in outcomes {
            match outcome {
                RetryOutcome::Ready(order) => self.execute_pending(date, order)?,
                RetryOutcome::StillBlocked(order) => {
                    tracing::warn!(ticker = %order.ticker, %date, "pending order still blocked, re-enqueued");
                    self.state.pending_queue.requeue(order);
                }
                RetryOutcome::Expired(order) => {
                    let msg = format!(
                        "pending order for {} expired on {} after exhausting retry budget",
                        order.ticker, date
                    );
                    tracing::warn!("{msg}");
                    self.warnings.push(msg);
                }
            }
        }
        Ok(())
    }

    /// Execute an order the queue's own `is_tradable` check just classified
    /// as `Ready`. Tradability can still pass while execution itself fails
    /// (no trade price published for the ticker today, or — for a buy —
    /// insufficient cash); in that case the order is re-enqueued exactly as
    /// `StillBlocked` would be, rather than silently dropped.
    fn execute_pending(&mut self, date: NaiveDate, mut order: PendingOrder) -> Result<(), EngineError> {
        use crate::domain::pending_order::Side;
        let executed = match order.side {
            Side::Buy => match order.target_notional {
                Some(notional) => self.try_buy(date, &order.ticker, notional, None)?,
                None => true,
            },
            Side::Sell => self.try_sell(date, &order.ticker, sell_type_for(&order.reason))?,
        };
        if !executed {
            order.record_retry();
            if order.exceeded_retry_budget(self.config.pending_max_retries) {
                let msg = format!(
                    "pending order for {} expired on {} after exhausting retry budget",
                    order.ticker, date
                );
                tracing::warn!("{msg}");
                self.warnings.push(msg);
            } else {
                tracing::warn!(
                    ticker = %order.ticker, %date,
                    "pending order deemed tradable but execution failed, re-enqueued"
                );
                self.state.pending_queue.requeue(order);
            }
        }
        Ok(())
    }

    fn check_stop_losses(&mut self, date: NaiveDate) -> Result<(), EngineError> {
        let held: Vec<Ticker> = self.state.portfolio.positions.keys().cloned().collect();
        for ticker in held {
            let Some(price) = self.price_index.pnl_price(date, &ticker, false) else {
                continue;
            };
            let flags = self.tradability.get(date, &ticker);
            if let Some(lot) = self.state.portfolio.lot_mut(&ticker) {
                lot.update_high_water(price);
                lot.record_limit_down_day(flags.is_limit_down);
            }
            let trigger = {
                let lot = self.state.portfolio.lot(&ticker).expect("just updated");
                self.stop_monitor.check(lot, price)
            };
            if let Some(trigger) = trigger {
                // §4.6 step 4: the sell never executes same-day, regardless
                // of whether the ticker happens to be tradable on the
                // triggering day — it is always queued for the next trading
                // day, preserving the T+1 convention (unlike the
                // holding-period-exit path, which does attempt same-day).
                let shares = self.state.portfolio.lot(&ticker).map(|l| l.shares).unwrap_or(0);
                self.state.pending_queue.enqueue(PendingOrder::new_sell(
                    ticker,
                    shares,
                    date,
                    PendingOrderReason::StopLoss(trigger),
                ));
            }
        }
        Ok(())
    }

    fn check_holding_period_exits(&mut self, date: NaiveDate) -> Result<(), EngineError> {
        let due: Vec<Ticker> = self
            .state
            .portfolio
            .positions
            .iter()
            .filter(|(_, lot)| lot.exit_due_date == Some(date))
            .map(|(ticker, _)| ticker.clone())
            .collect();
        for ticker in due {
            let executed = self.try_sell(date, &ticker, SellType::HoldingPeriodExpiry)?;
            if !executed {
                let shares = self.state.portfolio.lot(&ticker).map(|l| l.shares).unwrap_or(0);
                self.state.pending_queue.enqueue(PendingOrder::new_sell(
                    ticker,
                    shares,
                    date,
                    PendingOrderReason::HoldingPeriodExpiry,
                ));
            }
        }
        Ok(())
    }

    fn apply_pending_rebalance(&mut self, date: NaiveDate) -> Result<(), EngineError> {
        let Some(weights) = self.state.pending_target_weights.take() else {
            return Ok(());
        };
        // Snapshot of the universe the ranking was drawn from at the
        // rebalance day that produced these weights — distinguishes a
        // ticker that merely ranked below the target set (an ordinary
        // rebalance exit) from one no longer in the universe at all (a
        // forced exit), per spec.md §3's `sell_type` taxonomy.
        let rebalance_universe = self.state.pending_rebalance_universe.take();
        let target_tickers: std::collections::HashSet<Ticker> =
            weights.iter().map(|w| w.ticker.clone()).collect();

        // Sell anything held that has fallen out of the target set.
        let to_sell: Vec<Ticker> = self
            .state
            .portfolio
            .positions
            .keys()
            .filter(|t| !target_tickers.contains(t))
            .cloned()
            .collect();
        for ticker in to_sell {
            let forced = rebalance_universe
                .as_ref()
                .is_some_and(|universe| !universe.contains(&ticker));
            let (sell_type, reason) = if forced {
                (SellType::Forced, PendingOrderReason::Forced)
            } else {
                (SellType::Rebalance, PendingOrderReason::Rebalance)
            };
            let executed = self.try_sell(date, &ticker, sell_type)?;
            if !executed {
                let shares = self.state.portfolio.lot(&ticker).map(|l| l.shares).unwrap_or(0);
                self.state.pending_queue.enqueue(PendingOrder::new_sell(
                    ticker,
                    shares,
                    date,
                    reason,
                ));
            }
        }

        // Buy anything in the target set not already held.
        let equity = self.state.portfolio.equity(&self.price_index.pnl_closes_on(date));
        for w in weights {
            if !self.state.portfolio.is_flat(&w.ticker) {
                continue;
            }
            let notional = equity * w.weight;
            let exit_due = self.scheduler.exit_due_date(date);
            let executed = self.try_buy(date, &w.ticker, notional, exit_due)?;
            if !executed {
                // Per spec.md §4.11: buys are never deferred to the pending
                // queue — backfill on T-day already filtered for T+1
                // tradability, so a block here means the signal went stale
                // (e.g. a late-emerging suspension) and is simply dropped.
                tracing::warn!(
                    ticker = %w.ticker, %date,
                    "T+1 buy blocked by tradability, stale signal dropped"
                );
            }
        }
        Ok(())
    }

    fn compute_rebalance_weights(
        &mut self,
        date: NaiveDate,
        ranker: &dyn Ranker,
        universe: &[Ticker],
        features: &FeatureTable,
    ) -> Result<(), EngineError> {
        let Some(fill_date) = self.scheduler.next_trading_day(date) else {
            return Ok(());
        };
        let held: std::collections::HashSet<Ticker> =
            self.state.portfolio.positions.keys().cloned().collect();
        let raw = rank_and_backfill(
            ranker,
            date,
            fill_date,
            universe,
            features,
            self.tradability,
            &held,
            self.config.top_n,
            self.config.max_gross_exposure,
            self.config.weight_method,
        );
        self.state.pending_rebalance_universe = Some(universe.iter().cloned().collect());
        let scaled = self.risk_scaler.scale(&raw, self.price_index, date);
        let (multiplier, reason) = if self.config.exposure_applies_once {
            self.equity_ctl.multiplier(&self.state.portfolio.nav_history)
        } else {
            (1.0, "exposure applied per-tranche, not here".to_string())
        };
        tracing::debug!(%date, multiplier, %reason, "equity-curve exposure applied to rebalance weights");
        let final_weights: Vec<TargetWeight> = scaled
            .into_iter()
            .map(|w| TargetWeight {
                ticker: w.ticker,
                weight: w.weight * multiplier,
            })
            .collect();
        // Polices invariant I6 (Σ weights <= 1, each in [0,1]) at the one
        // point the pipeline actually produces a target set; a violation
        // here means a bug upstream (backfill, equity-curve, or risk-budget
        // scaling), not bad input data, so it is logged rather than aborting
        // the run.
        if let Err(msg) = validate_weights(&final_weights) {
            tracing::warn!(%date, "target weight set violates I6: {msg}");
            self.warnings.push(format!("target weight set on {date} violates I6: {msg}"));
        }
        self.state.pending_target_weights = Some(final_weights);
        self.scheduler.mark_rebalanced(date);
        Ok(())
    }

    /// Attempt an immediate sell of the full lot. Returns `Ok(true)` if
    /// executed, `Ok(false)` if blocked by tradability (caller enqueues).
    fn try_sell(
        &mut self,
        date: NaiveDate,
        ticker: &Ticker,
        sell_type: SellType,
    ) -> Result<bool, EngineError> {
        if !self.tradability.can_sell(date, ticker) {
            return Ok(false);
        }
        let Some(trade_price) = self.price_index.trade_price(date, ticker, false) else {
            return Ok(false);
        };
        if trade_price <= 0.0 || !trade_price.is_finite() {
            return Err(EngineError::InvalidTradePrice {
                ticker: ticker.clone(),
                date,
                price: trade_price,
            });
        }
        let pnl_price = self
            .price_index
            .pnl_price(date, ticker, false)
            .unwrap_or(trade_price);
        let shares = self
            .state
            .portfolio
            .lot(ticker)
            .map(|l| l.shares)
            .ok_or_else(|| EngineError::Portfolio(crate::domain::PortfolioError::NotHeld(ticker.clone(), date)))?;
        let gross = Decimal::from(shares) * Decimal::from_f64_trade_price(trade_price);
        let (gross, commission, stamp_tax, slippage, net) =
            self.config.cost_model.sell_proceeds(gross);
        self.state.portfolio.sell(
            ticker,
            date,
            trade_price,
            pnl_price,
            net,
            (gross, commission, stamp_tax, slippage),
            sell_type,
        )?;
        Ok(true)
    }

    /// Attempt to open a new lot sized to `notional` cash. Returns
    /// `Ok(false)` if blocked by tradability (caller enqueues). Returns
    /// `Ok(true)` both when the buy executes and when sizing rounds down to
    /// fewer than one lot — an insufficient-notional skip, not a
    /// tradability failure, so it is logged as a warning rather than
    /// deferred to the pending queue.
    fn try_buy(
        &mut self,
        date: NaiveDate,
        ticker: &Ticker,
        notional: f64,
        exit_due_date: Option<NaiveDate>,
    ) -> Result<bool, EngineError> {
        if !self.tradability.can_buy(date, ticker) {
            return Ok(false);
        }
        let Some(trade_price) = self.price_index.trade_price(date, ticker, false) else {
            return Ok(false);
        };
        if trade_price <= 0.0 || !trade_price.is_finite() {
            return Err(EngineError::InvalidTradePrice {
                ticker: ticker.clone(),
                date,
                price: trade_price,
            });
        }
        let pnl_price = self
            .price_index
            .pnl_price(date, ticker, false)
            .unwrap_or(trade_price);
        let shares = size_to_lot(notional, trade_price, self.config.lot_size);
        if shares == 0 {
            // spec.md §4.4 step 2: shares < lot_size after rounding is an
            // insufficient-notional skip, not a tradability failure, but it
            // must still be observable rather than a silent no-op.
            let msg = format!(
                "buy for {ticker} on {date} skipped: notional {notional:.2} at price {trade_price} rounds to fewer than {} shares",
                self.config.lot_size
            );
            tracing::warn!("{msg}");
            self.warnings.push(msg);
            return Ok(true);
        }
        let gross = Decimal::from(shares) * Decimal::from_f64_trade_price(trade_price);
        let (gross, commission, stamp_tax, slippage, total_cost) =
            self.config.cost_model.buy_cost(gross);
        if total_cost > self.state.portfolio.cash {
            // Can't afford the full size; skip rather than partially fill —
            // sizing is always derived from current equity so this should
            // be rare (fee drift only).
            return Ok(true);
        }
        self.state.portfolio.buy(
            ticker.clone(),
            shares,
            date,
            trade_price,
            pnl_price,
            total_cost,
            exit_due_date,
            (gross, commission, stamp_tax, slippage),
        )?;
        Ok(true)
    }
}

fn sell_type_for(reason: &PendingOrderReason) -> SellType {
    match *reason {
        PendingOrderReason::Rebalance => SellType::Rebalance,
        PendingOrderReason::HoldingPeriodExpiry => SellType::HoldingPeriodExpiry,
        PendingOrderReason::StopLoss(trigger) => SellType::StopLoss(trigger),
        PendingOrderReason::Forced => SellType::Forced,
    }
}

/// Floor `notional / price` to the nearest multiple of `lot_size` shares.
fn size_to_lot(notional: f64, price: f64, lot_size: u64) -> u64 {
    if price <= 0.0 || !price.is_finite() || notional <= 0.0 {
        return 0;
    }
    let raw_shares = (notional / price).floor() as u64;
    (raw_shares / lot_size) * lot_size
}

trait DecimalFromF64Price {
    fn from_f64_trade_price(v: f64) -> Self;
}

impl DecimalFromF64Price for Decimal {
    fn from_f64_trade_price(v: f64) -> Self {
        Decimal::from_f64_retain(v).unwrap_or_default()
    }
}
