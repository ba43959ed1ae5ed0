//! Execution-pipeline behavior: a buy blocked by limit-up on its fill day
//! gets deferred into the pending queue and fills once the block clears,
//! and a buy that never clears expires after exhausting its retry budget.

use std::collections::HashMap;

use alphasim_core::domain::trade::Side;
use alphasim_core::domain::{Bar, Ticker};
use alphasim_core::engine::{Engine, EngineConfig};
use alphasim_core::price_index::PriceIndex;
use alphasim_core::scheduler::Scheduler;
use alphasim_core::signal_pipeline::{FeatureTable, Ranker};
use alphasim_core::tradability::TradabilityMap;
use chrono::NaiveDate;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
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

struct AlwaysTopUniverse;

impl Ranker for AlwaysTopUniverse {
    fn generate_ranked(&self, _date: NaiveDate, universe: &[Ticker], _features: &FeatureTable) -> Vec<(Ticker, f64)> {
        universe.iter().map(|t| (t.clone(), 1.0)).collect()
    }
}

#[test]
fn buy_blocked_on_fill_day_retries_and_fills_once_tradable_again() {
    // Rebalance is signalled on day 1 (2024-03-02), fill is due day 2
    // (2024-03-03). Day 2 and day 3 are limit-up (blocks buy); day 4 opens up.
    let days: Vec<u32> = (2..9).collect();
    let mut bars: Vec<Bar> = days.iter().map(|d| bar("A", *d, 10.0)).collect();
    bars[1].is_limit_up = true; // 2024-03-03
    bars[2].is_limit_up = true; // 2024-03-04

    let cal: Vec<NaiveDate> = days.iter().map(|d| date(*d)).collect();
    let idx = PriceIndex::build(bars.clone());
    let tradability = TradabilityMap::build(bars.iter());
    let scheduler = Scheduler::new(cal.clone(), 1, None);
    let config = EngineConfig {
        top_n: 1,
        max_gross_exposure: 1.0,
        pending_max_retries: 5,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, &idx, &tradability, scheduler);
    let universe = vec![Ticker::new("A")];
    let result = engine.run(&AlwaysTopUniverse, &universe, &HashMap::new()).unwrap();

    let buys: Vec<_> = result.trades.iter().filter(|t| t.side == Side::Buy).collect();
    assert_eq!(buys.len(), 1, "exactly one buy should eventually clear");
    assert!(
        buys[0].date >= date(5),
        "buy should not fill until the limit-up block clears on {}, filled on {}",
        date(5),
        buys[0].date
    );
}

#[test]
fn buy_that_never_clears_expires_without_crashing_the_run() {
    let days: Vec<u32> = (2..9).collect();
    let mut bars: Vec<Bar> = days.iter().map(|d| bar("A", *d, 10.0)).collect();
    // Blocked on every day after the signal, so the retry budget always runs out.
    for b in bars.iter_mut().skip(1) {
        b.is_limit_up = true;
    }

    let cal: Vec<NaiveDate> = days.iter().map(|d| date(*d)).collect();
    let idx = PriceIndex::build(bars.clone());
    let tradability = TradabilityMap::build(bars.iter());
    let scheduler = Scheduler::new(cal.clone(), 1, None);
    let config = EngineConfig {
        top_n: 1,
        max_gross_exposure: 1.0,
        pending_max_retries: 2,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, &idx, &tradability, scheduler);
    let universe = vec![Ticker::new("A")];
    let result = engine.run(&AlwaysTopUniverse, &universe, &HashMap::new()).unwrap();

    assert!(result.trades.is_empty(), "a never-tradable buy should never execute");
    assert!(
        !result.data_quality_warnings.is_empty(),
        "an expired pending order should surface as a data-quality warning"
    );
    assert_eq!(result.nav_curve.len(), cal.len());
}

#[test]
fn sell_blocked_by_limit_down_stays_queued_and_fills_once_it_clears() {
    // Signal on day 2 (2024-03-02), buy fills day 3 at 100. A sharp drop on
    // day 4 trips the drawdown stop (-50% <= -15% threshold) but day 4 is
    // also limit-down, so the sell can't execute and must be deferred
    // rather than silently dropped. Day 5 partially recovers (-5%, clear of
    // both the drawdown and trailing thresholds) while remaining
    // limit-down, so the stop-loss monitor must not re-fire a second sell
    // for the same ticker while the first is still queued; the order must
    // simply stay queued. Day 6 clears the limit-down block and the
    // deferred sell must finally execute, still attributed to the
    // drawdown trigger that originally fired it.
    let days: Vec<u32> = (2..9).collect();
    let mut bars: Vec<Bar> = days.iter().map(|d| bar("A", *d, 100.0)).collect();
    bars[2].close = 50.0; // 2024-03-04
    bars[2].is_limit_down = true;
    bars[3].close = 95.0; // 2024-03-05
    bars[3].is_limit_down = true;
    bars[4].close = 95.0; // 2024-03-06: block clears

    let cal: Vec<NaiveDate> = days.iter().map(|d| date(*d)).collect();
    let idx = PriceIndex::build(bars.clone());
    let tradability = TradabilityMap::build(bars.iter());
    let scheduler = Scheduler::new(cal.clone(), 1, None);
    let config = EngineConfig {
        top_n: 1,
        max_gross_exposure: 1.0,
        pending_max_retries: 5,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, &idx, &tradability, scheduler);
    let universe = vec![Ticker::new("A")];
    let result = engine.run(&AlwaysTopUniverse, &universe, &HashMap::new()).unwrap();

    let stop_loss_sells: Vec<_> = result
        .trades
        .iter()
        .filter(|t| {
            t.side == Side::Sell
                && matches!(
                    t.sell_type,
                    Some(alphasim_core::domain::trade::SellType::StopLoss(
                        alphasim_core::domain::trade::StopTrigger::Drawdown
                    ))
                )
        })
        .collect();
    assert_eq!(
        stop_loss_sells.len(),
        1,
        "the deferred sell must fill exactly once, not vanish and not duplicate: {:?}",
        result.trades
    );
    assert_eq!(
        stop_loss_sells[0].date,
        date(6),
        "the sell must not clear until the limit-down block lifts on {}",
        date(6)
    );
}

#[test]
fn drawdown_trigger_on_a_fully_tradable_day_still_defers_the_sell_to_the_next_day() {
    // Signal on day 2 (2024-03-02), buy fills day 3 at 100. Day 4 drops to
    // 80 (-20%, tripping a -15% drawdown threshold) with no limit-down or
    // suspension at all — the ticker is otherwise perfectly tradable that
    // day. Per spec.md §4.6 step 4 / scenario S3, the sell must still not
    // execute until day 5, never same-day.
    let days: Vec<u32> = (2..9).collect();
    let mut bars: Vec<Bar> = days.iter().map(|d| bar("A", *d, 100.0)).collect();
    bars[2].close = 80.0; // 2024-03-04, fully tradable, trigger fires

    let cal: Vec<NaiveDate> = days.iter().map(|d| date(*d)).collect();
    let idx = PriceIndex::build(bars.clone());
    let tradability = TradabilityMap::build(bars.iter());
    let scheduler = Scheduler::new(cal.clone(), 1, None);
    let config = EngineConfig {
        top_n: 1,
        max_gross_exposure: 1.0,
        pending_max_retries: 5,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, &idx, &tradability, scheduler);
    let universe = vec![Ticker::new("A")];
    let result = engine.run(&AlwaysTopUniverse, &universe, &HashMap::new()).unwrap();

    let stop_loss_sells: Vec<_> = result
        .trades
        .iter()
        .filter(|t| {
            t.side == Side::Sell
                && matches!(
                    t.sell_type,
                    Some(alphasim_core::domain::trade::SellType::StopLoss(
                        alphasim_core::domain::trade::StopTrigger::Drawdown
                    ))
                )
        })
        .collect();
    assert_eq!(stop_loss_sells.len(), 1, "expected exactly one drawdown-triggered sell: {:?}", result.trades);
    assert!(
        stop_loss_sells[0].date > date(4),
        "a trigger firing on an otherwise fully tradable day must still fill strictly \
         after the triggering day, not same-day; filled on {}",
        stop_loss_sells[0].date
    );
}

#[test]
fn holding_period_policy_forces_an_exit_independent_of_ranking() {
    // A is ranked top every day (never rotated out by the rebalance), so the
    // only thing that can close the position is the holding-period policy.
    let days: Vec<u32> = (2..20).collect();
    let cal: Vec<NaiveDate> = days.iter().map(|d| date(*d)).collect();
    let bars: Vec<Bar> = days.iter().map(|d| bar("A", *d, 10.0)).collect();

    let idx = PriceIndex::build(bars.clone());
    let tradability = TradabilityMap::build(bars.iter());
    let scheduler = Scheduler::new(cal.clone(), 1, Some(3));
    let config = EngineConfig {
        top_n: 1,
        max_gross_exposure: 1.0,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, &idx, &tradability, scheduler);
    let universe = vec![Ticker::new("A")];
    let result = engine.run(&AlwaysTopUniverse, &universe, &HashMap::new()).unwrap();

    let holding_period_sells = result
        .trades
        .iter()
        .filter(|t| {
            t.side == Side::Sell
                && matches!(
                    t.sell_type,
                    Some(alphasim_core::domain::trade::SellType::HoldingPeriodExpiry)
                )
        })
        .count();
    assert!(
        holding_period_sells >= 1,
        "expected at least one forced exit from the holding-period policy over an 18-day run"
    );
    assert_eq!(result.nav_curve.len(), cal.len());
}
