//! Portfolio — cash, open lots, NAV history, and the trade log.
//!
//! Exclusively owned by the execution engine for the lifetime of a run.
//! [`crate::stop_loss::StopLossMonitor`] reads and mutates per-lot monitor
//! state through this type rather than owning a shadow copy of it.

use super::error::PortfolioError;
use super::position::Lot;
use super::ticker::Ticker;
use super::trade::{Side, TradeRecord};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    pub initial_capital: Decimal,
    pub positions: HashMap<Ticker, Lot>,
    /// (date, NAV as a multiple of initial capital) appended once per tick.
    pub nav_history: Vec<(NaiveDate, f64)>,
    pub trade_log: Vec<TradeRecord>,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: HashMap::new(),
            nav_history: Vec::new(),
            trade_log: Vec::new(),
        }
    }

    pub fn is_flat(&self, ticker: &Ticker) -> bool {
        !self.positions.contains_key(ticker)
    }

    pub fn lot(&self, ticker: &Ticker) -> Option<&Lot> {
        self.positions.get(ticker)
    }

    pub fn lot_mut(&mut self, ticker: &Ticker) -> Option<&mut Lot> {
        self.positions.get_mut(ticker)
    }

    /// Open a new lot, debiting cash by the full cost (gross notional +
    /// commission + stamp tax + slippage, already folded into `cost_cash`
    /// by the caller via [`crate::cost_model::CostModel`]).
    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        &mut self,
        ticker: Ticker,
        shares: u64,
        date: NaiveDate,
        trade_price: f64,
        pnl_price: f64,
        cost_cash: Decimal,
        exit_due_date: Option<NaiveDate>,
        fees: (Decimal, Decimal, Decimal, Decimal), // gross, commission, stamp_tax, slippage
    ) -> Result<TradeRecord, PortfolioError> {
        if self.positions.contains_key(&ticker) {
            return Err(PortfolioError::AlreadyHeld(ticker));
        }
        if cost_cash > self.cash {
            return Err(PortfolioError::InsufficientCash {
                needed: cost_cash.to_string(),
                available: self.cash.to_string(),
            });
        }
        self.cash -= cost_cash;
        let (gross, commission, stamp_tax, slippage) = fees;
        let buy_leg_fee = commission + slippage;
        let lot = Lot::new(
            ticker.clone(),
            shares,
            date,
            trade_price,
            pnl_price,
            cost_cash,
            buy_leg_fee,
            exit_due_date,
        );
        self.positions.insert(ticker.clone(), lot);

        let record = TradeRecord {
            ticker,
            date,
            side: Side::Buy,
            shares,
            trade_price,
            pnl_price,
            gross_amount: gross,
            commission,
            stamp_tax,
            slippage,
            net_cash: -cost_cash,
            matched_buy_trade_price: None,
            matched_buy_pnl_price: None,
            pnl_profit_amount: None,
            pnl_profit_pct: None,
            sell_type: None,
        };
        self.trade_log.push(record.clone());
        Ok(record)
    }

    /// Close the open lot entirely, crediting cash with the net proceeds
    /// and recording realized PnL on back-adjusted prices.
    pub fn sell(
        &mut self,
        ticker: &Ticker,
        date: NaiveDate,
        trade_price: f64,
        pnl_price: f64,
        proceeds_cash: Decimal,
        fees: (Decimal, Decimal, Decimal, Decimal),
        sell_type: super::trade::SellType,
    ) -> Result<TradeRecord, PortfolioError> {
        let lot = self
            .positions
            .remove(ticker)
            .ok_or_else(|| PortfolioError::NotHeld(ticker.clone(), date))?;

        self.cash += proceeds_cash;
        let (gross, commission, stamp_tax, slippage) = fees;

        // PnL is reported on the back-adjusted basis (§4.4 step 4), which is
        // a distinct notional from the cash-accounting `gross`/`proceeds_cash`
        // above whenever `buy_pnl_price`/`pnl_price` diverge from the
        // unadjusted trade prices (splits/dividends between entry and exit).
        let shares_dec = Decimal::from(lot.shares);
        let pnl_buy_notional =
            shares_dec * Decimal::from_f64_retain(lot.buy_pnl_price).unwrap_or_default();
        let pnl_sell_notional =
            shares_dec * Decimal::from_f64_retain(pnl_price).unwrap_or_default();
        let round_trip_fees = lot.buy_leg_fee + commission + stamp_tax + slippage;
        let profit_amount = pnl_sell_notional - pnl_buy_notional - round_trip_fees;
        let profit_denominator = pnl_buy_notional + lot.buy_leg_fee;
        let profit_pct = if profit_denominator > Decimal::ZERO {
            (profit_amount / profit_denominator).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };

        let record = TradeRecord {
            ticker: ticker.clone(),
            date,
            side: Side::Sell,
            shares: lot.shares,
            trade_price,
            pnl_price,
            gross_amount: gross,
            commission,
            stamp_tax,
            slippage,
            net_cash: proceeds_cash,
            matched_buy_trade_price: Some(lot.buy_trade_price),
            matched_buy_pnl_price: Some(lot.buy_pnl_price),
            pnl_profit_amount: Some(profit_amount),
            pnl_profit_pct: Some(profit_pct),
            sell_type: Some(sell_type),
        };
        self.trade_log.push(record.clone());
        Ok(record)
    }

    /// Mark every open lot to its back-adjusted price and append the NAV
    /// point. `prices` maps ticker to `pnl_price` as of `date`; a missing
    /// entry reuses the lot's last observed `pnl_price` (spec.md §4.6) and
    /// logs a warning rather than silently substituting the high-water mark.
    pub fn mark_to_market(&mut self, date: NaiveDate, prices: &HashMap<Ticker, f64>) -> f64 {
        let mut positions_value = 0.0;
        for (ticker, lot) in self.positions.iter_mut() {
            let price = match prices.get(ticker).copied() {
                Some(p) => {
                    lot.last_known_pnl_price = p;
                    p
                }
                None => {
                    tracing::warn!(
                        ticker = %ticker, %date, price = lot.last_known_pnl_price,
                        "missing bar for held ticker, reusing last known pnl_price"
                    );
                    lot.last_known_pnl_price
                }
            };
            lot.update_high_water(price);
            positions_value += lot.market_value(price);
        }
        let cash_f64 = self.cash.to_f64().unwrap_or(0.0);
        let initial_f64 = self.initial_capital.to_f64().unwrap_or(1.0);
        let equity = cash_f64 + positions_value;
        let nav = if initial_f64 > 0.0 {
            equity / initial_f64
        } else {
            1.0
        };
        self.nav_history.push((date, nav));
        nav
    }

    pub fn equity(&self, prices: &HashMap<Ticker, f64>) -> f64 {
        let cash_f64 = self.cash.to_f64().unwrap_or(0.0);
        let positions_value: f64 = self
            .positions
            .iter()
            .map(|(ticker, lot)| {
                let price = match prices.get(ticker).copied() {
                    Some(p) => p,
                    None => {
                        tracing::warn!(
                            ticker = %ticker, price = lot.last_known_pnl_price,
                            "missing bar for held ticker, reusing last known pnl_price"
                        );
                        lot.last_known_pnl_price
                    }
                };
                lot.market_value(price)
            })
            .sum();
        cash_f64 + positions_value
    }
}
