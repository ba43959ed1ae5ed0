//! EngineState — the engine's own mutable state for one run, separate from
//! the immutable [`crate::price_index::PriceIndex`] / [`crate::tradability::TradabilityMap`]
//! it reads against.

use crate::domain::{Portfolio, TargetWeight, Ticker};
use crate::pending_queue::PendingOrderQueue;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Serialize, Deserialize)]
pub struct EngineState {
    pub portfolio: Portfolio,
    pub pending_queue: PendingOrderQueue,
    /// Target weights computed at a rebalance day T, applied at T's fill
    /// day (T+1 under the scheduler's next-trading-day rule). Cleared once
    /// applied.
    pub pending_target_weights: Option<Vec<TargetWeight>>,
    /// The candidate universe as of the rebalance day that produced
    /// `pending_target_weights`, kept alongside it so the fill day can tell
    /// a ticker that merely ranked out of the target set (still in the
    /// universe: an ordinary rebalance exit) from one dropped out of the
    /// universe entirely (a forced exit). Cleared together with the weights.
    pub pending_rebalance_universe: Option<HashSet<Ticker>>,
}

impl EngineState {
    pub fn new(initial_capital: Decimal, pending_max_retries: u32, pending_max_retry_days: u32) -> Self {
        Self {
            portfolio: Portfolio::new(initial_capital),
            pending_queue: PendingOrderQueue::new(pending_max_retries, pending_max_retry_days),
            pending_target_weights: None,
            pending_rebalance_universe: None,
        }
    }

    pub fn from_parts(
        portfolio: Portfolio,
        pending_queue: PendingOrderQueue,
        pending_target_weights: Option<Vec<TargetWeight>>,
    ) -> Self {
        Self {
            portfolio,
            pending_queue,
            pending_target_weights,
            pending_rebalance_universe: None,
        }
    }
}
