//! Lot — the engine's single open position record per ticker.
//!
//! The simulated account never holds more than one lot per ticker at a time
//! (a fresh buy signal for an already-held ticker is skipped upstream), so
//! FIFO matching is degenerate here: the "queue" is always depth one. The
//! name is kept to signal the policy (first lot in is the only lot, and it
//! is the one matched on exit) rather than to imply an actual queue.

use super::ticker::Ticker;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub ticker: Ticker,
    pub shares: u64,
    pub buy_date: NaiveDate,
    /// Unadjusted price actually paid, for cash reconciliation.
    pub buy_trade_price: f64,
    /// Back-adjusted price at entry, for PnL/return attribution.
    pub buy_pnl_price: f64,
    /// Total cash outlay including commission and stamp tax.
    pub buy_cost_cash: Decimal,
    /// Commission + slippage paid on entry (no stamp tax on buys), kept
    /// separately on the adjusted-price basis so the sell leg can compute
    /// `pnl_profit_pct` against `pnl_buy_notional + buy_leg_fee` per spec.
    pub buy_leg_fee: Decimal,
    /// Scheduled forced-exit date from a holding-period policy, if any.
    pub exit_due_date: Option<NaiveDate>,
    /// Running maximum of `pnl_price` observed since entry — monotonic,
    /// only ever increases. Drives the trailing-stop trigger.
    pub high_water_pnl_price: f64,
    /// The most recent `pnl_price` actually observed for this ticker
    /// (unlike `high_water_pnl_price`, this can fall). Carried forward on
    /// days with a missing bar so mark-to-market reuses the last real
    /// price instead of the (monotonic, and so upward-biased) high-water mark.
    pub last_known_pnl_price: f64,
    /// Consecutive trading days this ticker has printed limit-down while held.
    pub consecutive_limit_down_days: u32,
}

impl Lot {
    pub fn new(
        ticker: Ticker,
        shares: u64,
        buy_date: NaiveDate,
        buy_trade_price: f64,
        buy_pnl_price: f64,
        buy_cost_cash: Decimal,
        buy_leg_fee: Decimal,
        exit_due_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            ticker,
            shares,
            buy_date,
            buy_trade_price,
            buy_pnl_price,
            buy_cost_cash,
            buy_leg_fee,
            exit_due_date,
            high_water_pnl_price: buy_pnl_price,
            last_known_pnl_price: buy_pnl_price,
            consecutive_limit_down_days: 0,
        }
    }

    /// Ratchet the high-water mark. Only ever moves up, per the stop-loss
    /// monitor's monotonic-tightening invariant.
    pub fn update_high_water(&mut self, current_pnl_price: f64) {
        if current_pnl_price > self.high_water_pnl_price {
            self.high_water_pnl_price = current_pnl_price;
        }
    }

    pub fn record_limit_down_day(&mut self, was_limit_down: bool) {
        if was_limit_down {
            self.consecutive_limit_down_days += 1;
        } else {
            self.consecutive_limit_down_days = 0;
        }
    }

    /// Unrealized return since entry, measured on back-adjusted prices.
    pub fn unrealized_pnl_pct(&self, current_pnl_price: f64) -> f64 {
        if self.buy_pnl_price <= 0.0 {
            return 0.0;
        }
        (current_pnl_price - self.buy_pnl_price) / self.buy_pnl_price
    }

    /// Drawdown from the high-water mark, measured on back-adjusted prices.
    /// Always <= 0.
    pub fn drawdown_from_high_water(&self, current_pnl_price: f64) -> f64 {
        if self.high_water_pnl_price <= 0.0 {
            return 0.0;
        }
        (current_pnl_price - self.high_water_pnl_price) / self.high_water_pnl_price
    }

    pub fn market_value(&self, current_pnl_price: f64) -> f64 {
        self.shares as f64 * current_pnl_price
    }
}
