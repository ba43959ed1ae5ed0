//! TradabilityMap — per-(date, ticker) suspension/limit flags, derived from
//! the bar table the same way [`crate::price_index::PriceIndex`] is, and
//! consulted far more frequently than the raw OHLC.

use crate::domain::{Bar, Ticker, TradabilityFlags};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct TradabilityMap {
    by_date: BTreeMap<NaiveDate, HashMap<Ticker, TradabilityFlags>>,
}

impl TradabilityMap {
    pub fn build<'a>(bars: impl IntoIterator<Item = &'a Bar>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, HashMap<Ticker, TradabilityFlags>> = BTreeMap::new();
        for bar in bars {
            by_date
                .entry(bar.date)
                .or_default()
                .insert(bar.ticker.clone(), TradabilityFlags::from_bar(bar));
        }
        Self { by_date }
    }

    /// A ticker with no entry on `date` (e.g. it never listed, or the bar
    /// was void) is treated as suspended — it cannot be bought or sold.
    pub fn get(&self, date: NaiveDate, ticker: &Ticker) -> TradabilityFlags {
        self.by_date
            .get(&date)
            .and_then(|day| day.get(ticker))
            .copied()
            .unwrap_or(TradabilityFlags {
                is_suspended: true,
                is_limit_up: false,
                is_limit_down: false,
            })
    }

    pub fn can_buy(&self, date: NaiveDate, ticker: &Ticker) -> bool {
        !self.get(date, ticker).blocks_buy()
    }

    pub fn can_sell(&self, date: NaiveDate, ticker: &Ticker) -> bool {
        !self.get(date, ticker).blocks_sell()
    }
}
