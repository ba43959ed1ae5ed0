//! End-to-end scenario: a single ticker bought on the first rebalance and
//! sold once it drops out of the target set, checking the trade log and
//! cash/NAV bookkeeping line up across the whole run.

use std::collections::HashMap;

use alphasim_core::domain::trade::Side;
use alphasim_core::domain::{Bar, Ticker};
use alphasim_core::engine::{Engine, EngineConfig};
use alphasim_core::price_index::PriceIndex;
use alphasim_core::scheduler::Scheduler;
use alphasim_core::signal_pipeline::{FeatureTable, Ranker};
use alphasim_core::tradability::TradabilityMap;
use chrono::{Datelike, NaiveDate};

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn bar(ticker: &str, d: u32, close: f64) -> Bar {
    Bar {
        ticker: Ticker::new(ticker),
        date: date(d),
        open: close,
        high: close,
        low: close,
        close,
        open_adj: close,
        close_adj: close,
        volume: 10_000,
        amount: close * 10_000.0,
        is_st: false,
        is_suspended: false,
        is_limit_up: false,
        is_limit_down: false,
    }
}

/// Selects ticker A on days 1-3, then drops it from the universe entirely
/// so the rebalance at day 4 forces a sell.
struct DropsAAfterThreeDays;

impl Ranker for DropsAAfterThreeDays {
    fn generate_ranked(
        &self,
        date: NaiveDate,
        universe: &[Ticker],
        _features: &FeatureTable,
    ) -> Vec<(Ticker, f64)> {
        if date >= NaiveDate::from_ymd_opt(2024, 1, 5).unwrap() {
            Vec::new()
        } else {
            universe.iter().map(|t| (t.clone(), 1.0)).collect()
        }
    }
}

#[test]
fn buy_then_forced_sell_produces_a_matched_trade_pair() {
    let cal: Vec<NaiveDate> = (2..9).map(date).collect();
    let closes = [10.0, 10.5, 11.0, 11.2, 11.5, 11.8, 12.0];
    let bars: Vec<Bar> = cal
        .iter()
        .zip(closes.iter())
        .map(|(d, c)| bar("A", d.day(), *c))
        .collect();

    let idx = PriceIndex::build(bars.clone());
    let tradability = TradabilityMap::build(bars.iter());
    let scheduler = Scheduler::new(cal.clone(), 1, None);
    let config = EngineConfig {
        top_n: 1,
        max_gross_exposure: 1.0,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, &idx, &tradability, scheduler);
    let universe = vec![Ticker::new("A")];
    let result = engine.run(&DropsAAfterThreeDays, &universe, &HashMap::new()).unwrap();

    let buys: Vec<_> = result.trades.iter().filter(|t| t.side == Side::Buy).collect();
    let sells: Vec<_> = result.trades.iter().filter(|t| t.side == Side::Sell).collect();
    assert_eq!(buys.len(), 1, "expected exactly one buy");
    assert_eq!(sells.len(), 1, "expected exactly one forced sell");
    assert_eq!(buys[0].ticker, sells[0].ticker);
    assert_eq!(buys[0].shares, sells[0].shares);
    assert!(sells[0].pnl_profit_amount.is_some());
    assert_eq!(result.nav_curve.len(), cal.len());
}
