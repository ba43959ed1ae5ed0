//! StopLossMonitor — per-position drawdown / trailing / consecutive-limit-
//! down triggers, evaluated in that fixed priority order with the first
//! match winning. High-water state lives on the [`crate::domain::Lot`]
//! itself (the monitor reads/advances it, it does not shadow-copy it), so
//! the monitor's "persistent state" is just the portfolio's own lots.

use crate::domain::{Lot, StopTrigger};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLossConfig {
    /// Exit if unrealized return since entry falls below this (negative) threshold.
    pub drawdown_threshold: f64,
    /// Exit if the pullback from the high-water mark exceeds this (negative) threshold.
    pub trailing_threshold: f64,
    /// Exit after this many consecutive limit-down days while held.
    pub max_consecutive_limit_down_days: u32,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            drawdown_threshold: -0.15,
            trailing_threshold: -0.10,
            max_consecutive_limit_down_days: 3,
        }
    }
}

pub struct StopLossMonitor {
    config: StopLossConfig,
}

impl StopLossMonitor {
    pub fn new(config: StopLossConfig) -> Self {
        Self { config }
    }

    /// Evaluate all three triggers in priority order against the lot's
    /// *current* state (the caller must have already called
    /// `lot.update_high_water` and `lot.record_limit_down_day` for today
    /// before invoking this — the monitor itself never mutates the lot).
    pub fn check(&self, lot: &Lot, current_pnl_price: f64) -> Option<StopTrigger> {
        if lot.unrealized_pnl_pct(current_pnl_price) <= self.config.drawdown_threshold {
            return Some(StopTrigger::Drawdown);
        }
        if lot.drawdown_from_high_water(current_pnl_price) <= self.config.trailing_threshold {
            return Some(StopTrigger::Trailing);
        }
        if lot.consecutive_limit_down_days >= self.config.max_consecutive_limit_down_days {
            return Some(StopTrigger::ConsecutiveLimitDown);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Ticker;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn lot(buy_price: f64) -> Lot {
        Lot::new(
            Ticker::new("A"),
            100,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            buy_price,
            buy_price,
            dec!(10000),
            dec!(10),
            None,
        )
    }

    #[test]
    fn no_trigger_inside_thresholds() {
        let monitor = StopLossMonitor::new(StopLossConfig::default());
        let lot = lot(100.0);
        assert_eq!(monitor.check(&lot, 95.0), None);
    }

    #[test]
    fn drawdown_trigger_fires_first() {
        let monitor = StopLossMonitor::new(StopLossConfig::default());
        let mut lot = lot(100.0);
        lot.update_high_water(100.0);
        // -16% from entry: breaches drawdown (-15%) and would also breach
        // trailing (-10% from high water, since high water == entry here).
        // Drawdown must win because it's checked first.
        assert_eq!(monitor.check(&lot, 84.0), Some(StopTrigger::Drawdown));
    }

    #[test]
    fn trailing_trigger_fires_when_drawdown_is_clear() {
        let monitor = StopLossMonitor::new(StopLossConfig::default());
        let mut lot = lot(100.0);
        lot.update_high_water(130.0);
        // Still up 16% from entry (no drawdown trigger) but down ~11% from
        // the 130 high-water mark.
        assert_eq!(monitor.check(&lot, 116.0), Some(StopTrigger::Trailing));
    }

    #[test]
    fn consecutive_limit_down_trigger() {
        let monitor = StopLossMonitor::new(StopLossConfig::default());
        let mut lot = lot(100.0);
        lot.consecutive_limit_down_days = 3;
        assert_eq!(
            monitor.check(&lot, 99.0),
            Some(StopTrigger::ConsecutiveLimitDown)
        );
    }
}
