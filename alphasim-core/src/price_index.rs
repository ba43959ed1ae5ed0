//! PriceIndex — read-only, dual-keyed lookup of trade and PnL prices.
//!
//! Backed by a `BTreeMap` keyed on date so the index is sorted by
//! construction, not by a sort the caller has to remember to perform
//! (spec's design note on columnar, sorted-by-date containers). Built once
//! per run from the externally-supplied bar table and shared by immutable
//! reference for the whole run — nothing here ever mutates after
//! construction.

use crate::domain::{Bar, Ticker};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePair {
    pub trade_price_open: f64,
    pub trade_price_close: f64,
    pub pnl_price_open: f64,
    pub pnl_price_close: f64,
}

#[derive(Debug, Default)]
pub struct PriceIndex {
    by_date: BTreeMap<NaiveDate, HashMap<Ticker, PricePair>>,
}

impl PriceIndex {
    pub fn build(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, HashMap<Ticker, PricePair>> = BTreeMap::new();
        for bar in bars {
            if bar.is_void() {
                tracing::warn!(ticker = %bar.ticker, date = %bar.date, "void bar excluded from price index");
                continue;
            }
            let pair = PricePair {
                trade_price_open: bar.trade_price(true),
                trade_price_close: bar.trade_price(false),
                pnl_price_open: bar.pnl_price(true),
                pnl_price_close: bar.pnl_price(false),
            };
            by_date.entry(bar.date).or_default().insert(bar.ticker.clone(), pair);
        }
        Self { by_date }
    }

    pub fn get(&self, date: NaiveDate, ticker: &Ticker) -> Option<PricePair> {
        self.by_date.get(&date).and_then(|day| day.get(ticker)).copied()
    }

    pub fn trade_price(&self, date: NaiveDate, ticker: &Ticker, at_open: bool) -> Option<f64> {
        self.get(date, ticker)
            .map(|p| if at_open { p.trade_price_open } else { p.trade_price_close })
    }

    pub fn pnl_price(&self, date: NaiveDate, ticker: &Ticker, at_open: bool) -> Option<f64> {
        self.get(date, ticker)
            .map(|p| if at_open { p.pnl_price_open } else { p.pnl_price_close })
    }

    /// All tickers with a price entry on `date`.
    pub fn tickers_on(&self, date: NaiveDate) -> Vec<Ticker> {
        self.by_date
            .get(&date)
            .map(|day| day.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All dates present in the index, in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.by_date.keys().copied().collect()
    }

    /// Map of ticker -> close `pnl_price` on `date`, for mark-to-market.
    pub fn pnl_closes_on(&self, date: NaiveDate) -> HashMap<Ticker, f64> {
        self.by_date
            .get(&date)
            .map(|day| {
                day.iter()
                    .map(|(t, p)| (t.clone(), p.pnl_price_close))
                    .collect()
            })
            .unwrap_or_default()
    }
}
