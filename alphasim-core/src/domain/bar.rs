//! Daily bar — one (ticker, date) observation, unadjusted and back-adjusted.

use super::ticker::Ticker;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily OHLC observation for one ticker.
///
/// `open`/`close`/`high`/`low` are the actual unadjusted, tradable prices.
/// `open_adj`/`close_adj` are back-adjusted for splits/dividends and are
/// used only for PnL/return attribution, never for cash movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_adj: f64,
    pub close_adj: f64,
    pub volume: u64,
    pub amount: f64,
    pub is_st: bool,
    pub is_suspended: bool,
    pub is_limit_up: bool,
    pub is_limit_down: bool,
}

impl Bar {
    /// Any of the required price fields is NaN or non-finite.
    pub fn is_void(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .any(|p| !p.is_finite())
    }

    /// OHLC consistency: `low <= open,close <= high`, all strictly positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        let positive = [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| *p > 0.0);
        positive
            && self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }

    /// The unadjusted price used for cash movement on a fill.
    pub fn trade_price(&self, at_open: bool) -> f64 {
        if at_open {
            self.open
        } else {
            self.close
        }
    }

    /// The back-adjusted price used for PnL/return attribution. Falls back to
    /// the unadjusted price (with the caller expected to log a warning) when
    /// the adjusted field is missing or non-finite.
    pub fn pnl_price(&self, at_open: bool) -> f64 {
        let (adj, raw) = if at_open {
            (self.open_adj, self.open)
        } else {
            (self.close_adj, self.close)
        };
        if adj.is_finite() && adj > 0.0 {
            adj
        } else {
            raw
        }
    }
}

/// Per-(date, ticker) tradability derived from the bar. Kept separate from
/// [`Bar`] because the engine consults tradability far more often than it
/// needs the raw OHLC, and the two evolve independently (e.g. a ST flag can
/// be sourced from a separate roster feed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradabilityFlags {
    pub is_suspended: bool,
    pub is_limit_up: bool,
    pub is_limit_down: bool,
}

impl TradabilityFlags {
    /// Suspension is the flag column OR'd with the volume-based fallback
    /// (spec.md §4.2: "suspended is true if volume ≤ 0 or the flag column
    /// says so") — a feed that forgets to set the flag on a halted ticker
    /// still reads as untradable here.
    pub fn from_bar(bar: &Bar) -> Self {
        Self {
            is_suspended: bar.is_suspended || bar.volume == 0,
            is_limit_up: bar.is_limit_up,
            is_limit_down: bar.is_limit_down,
        }
    }

    /// A buy is blocked by suspension or a limit-up print (can't source shares).
    pub fn blocks_buy(&self) -> bool {
        self.is_suspended || self.is_limit_up
    }

    /// A sell is blocked by suspension or a limit-down print (no bid depth).
    pub fn blocks_sell(&self) -> bool {
        self.is_suspended || self.is_limit_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bar {
        Bar {
            ticker: Ticker::new("600519.SH"),
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 95.0,
            close: 102.0,
            open_adj: 50.0,
            close_adj: 51.0,
            volume: 10_000,
            amount: 1_020_000.0,
            is_st: false,
            is_suspended: false,
            is_limit_up: false,
            is_limit_down: false,
        }
    }

    #[test]
    fn sane_bar_passes() {
        assert!(sample().is_sane());
    }

    #[test]
    fn void_bar_detected() {
        let mut bar = sample();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn insane_ohlc_detected() {
        let mut bar = sample();
        bar.high = 90.0; // below close
        assert!(!bar.is_sane());
    }

    #[test]
    fn pnl_price_falls_back_when_adj_missing() {
        let mut bar = sample();
        bar.close_adj = f64::NAN;
        assert_eq!(bar.pnl_price(false), bar.close);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample();
        let json = serde_json::to_string(&bar).unwrap();
        let back: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, back);
    }

    #[test]
    fn zero_volume_implies_suspended_even_without_the_flag() {
        let mut bar = sample();
        bar.is_suspended = false;
        bar.volume = 0;
        assert!(TradabilityFlags::from_bar(&bar).is_suspended);
    }

    #[test]
    fn tradability_buy_sell_blocking() {
        let mut flags = TradabilityFlags {
            is_suspended: false,
            is_limit_up: false,
            is_limit_down: false,
        };
        assert!(!flags.blocks_buy() && !flags.blocks_sell());
        flags.is_limit_up = true;
        assert!(flags.blocks_buy() && !flags.blocks_sell());
        flags.is_limit_up = false;
        flags.is_limit_down = true;
        assert!(!flags.blocks_buy() && flags.blocks_sell());
    }
}
