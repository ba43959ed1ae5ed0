//! PendingOrder — an order that could not be executed on its origin day
//! (suspension, limit-up/down) and is retried on subsequent ticks.

use super::ticker::Ticker;
use super::trade::StopTrigger;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Why this order is pending — carried through for logging and trade-log
/// attribution once it finally fills or expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingOrderReason {
    Rebalance,
    StopLoss(StopTrigger),
    HoldingPeriodExpiry,
    /// The ticker dropped out of the tradable universe entirely, rather
    /// than merely being ranked below the target set.
    Forced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub ticker: Ticker,
    pub side: Side,
    /// Target notional for a buy, sized against equity at origin time.
    pub target_notional: Option<f64>,
    /// Exact share count for a sell (always the full lot).
    pub shares: Option<u64>,
    pub origin_date: NaiveDate,
    pub first_enqueued_date: NaiveDate,
    pub retries_used: u32,
    pub reason: PendingOrderReason,
}

impl PendingOrder {
    pub fn new_buy(
        ticker: Ticker,
        target_notional: f64,
        origin_date: NaiveDate,
        reason: PendingOrderReason,
    ) -> Self {
        Self {
            ticker,
            side: Side::Buy,
            target_notional: Some(target_notional),
            shares: None,
            origin_date,
            first_enqueued_date: origin_date,
            retries_used: 0,
            reason,
        }
    }

    pub fn new_sell(
        ticker: Ticker,
        shares: u64,
        origin_date: NaiveDate,
        reason: PendingOrderReason,
    ) -> Self {
        Self {
            ticker,
            side: Side::Sell,
            target_notional: None,
            shares: Some(shares),
            origin_date,
            first_enqueued_date: origin_date,
            retries_used: 0,
            reason,
        }
    }

    pub fn record_retry(&mut self) {
        self.retries_used += 1;
    }

    pub fn exceeded_retry_budget(&self, max_retries: u32) -> bool {
        self.retries_used >= max_retries
    }

    /// `D - first_enqueued_date` in trading-day count exceeds `max_retry_days`
    /// (spec.md §4.5's second expiry condition, scenario B5). `elapsed` is
    /// supplied by the caller since only the trading calendar, which this
    /// type has no access to, can turn two dates into a trading-day count.
    pub fn exceeded_retry_days(&self, elapsed_trading_days: usize, max_retry_days: u32) -> bool {
        elapsed_trading_days as u32 > max_retry_days
    }
}
