//! TradeRecord — a completed buy or sell, with full traceability.

use super::ticker::Ticker;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Why a sell happened, for attribution/reporting by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellType {
    /// Ordinary rebalance-driven exit: still in the tradable universe, just
    /// ranked below the target set on this rebalance.
    Rebalance,
    /// Holding-period policy forced the exit.
    HoldingPeriodExpiry,
    /// The stop-loss monitor triggered.
    StopLoss(StopTrigger),
    /// The ticker dropped out of the tradable universe entirely (e.g.
    /// delisted, moved off the configured board) rather than simply being
    /// ranked out — distinct from an ordinary rebalance trim.
    Forced,
}

/// Which stop-loss rule fired, in the evaluation order defined by the
/// monitor (drawdown, then trailing, then consecutive-limit-down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopTrigger {
    Drawdown,
    Trailing,
    ConsecutiveLimitDown,
}

/// A single executed buy or sell, fully traceable back to the lot it
/// opened or closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub side: Side,
    pub shares: u64,

    /// Unadjusted execution price — the one cash actually moved at.
    pub trade_price: f64,
    /// Back-adjusted execution price — used for PnL/return attribution.
    pub pnl_price: f64,

    pub gross_amount: Decimal,
    pub commission: Decimal,
    pub stamp_tax: Decimal,
    pub slippage: Decimal,
    /// Net cash effect: negative (outflow) for a buy, positive (inflow) for a sell.
    pub net_cash: Decimal,

    /// Populated for sells only: the matched buy's unadjusted fill price.
    pub matched_buy_trade_price: Option<f64>,
    /// Populated for sells only: the matched buy's back-adjusted price.
    pub matched_buy_pnl_price: Option<f64>,
    pub pnl_profit_amount: Option<Decimal>,
    pub pnl_profit_pct: Option<f64>,
    pub sell_type: Option<SellType>,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        matches!(self.pnl_profit_amount, Some(p) if p.is_sign_positive() && !p.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sell() -> TradeRecord {
        TradeRecord {
            ticker: Ticker::new("600519.SH"),
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            side: Side::Sell,
            shares: 100,
            trade_price: 55.0,
            pnl_price: 55.0,
            gross_amount: Decimal::new(550_000, 2),
            commission: Decimal::new(1650, 2),
            stamp_tax: Decimal::new(5500, 3),
            slippage: Decimal::new(550, 2),
            net_cash: Decimal::new(547_245, 2),
            matched_buy_trade_price: Some(50.0),
            matched_buy_pnl_price: Some(50.0),
            pnl_profit_amount: Some(Decimal::new(50_000, 2)),
            pnl_profit_pct: Some(0.1),
            sell_type: Some(SellType::Rebalance),
        }
    }

    #[test]
    fn winner_detection() {
        assert!(sample_sell().is_winner());
        let mut losing = sample_sell();
        losing.pnl_profit_amount = Some(Decimal::new(-10_000, 2));
        assert!(!losing.is_winner());
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let t = sample_sell();
        let json = serde_json::to_string(&t).unwrap();
        let back: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(t.ticker, back.ticker);
        assert_eq!(t.net_cash, back.net_cash);
        assert_eq!(t.sell_type, back.sell_type);
    }
}
