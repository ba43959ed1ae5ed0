//! Core simulation engine for a daily-frequency, long-only A-share strategy.
//!
//! - Domain types (bars, lots, portfolio, trades, target weights, pending orders)
//! - [`price_index`] / [`tradability`] — read-only market-data lookups
//! - [`cost_model`] — commission/stamp-tax/slippage
//! - [`pending_queue`] — deferred orders with bounded retries
//! - [`stop_loss`] — drawdown/trailing/consecutive-limit-down monitor
//! - [`equity_curve`] — NAV-history-driven exposure multiplier
//! - [`risk_budget`] — volatility-inverse weight scaling
//! - [`scheduler`] — rebalance-day / tranche / holding-period determination
//! - [`signal_pipeline`] — the `Ranker` trait and T-day/T+1 backfill
//! - [`engine`] — the per-day tick loop that wires the above together

pub mod cost_model;
pub mod domain;
pub mod engine;
pub mod equity_curve;
pub mod pending_queue;
pub mod price_index;
pub mod risk_budget;
pub mod scheduler;
pub mod signal_pipeline;
pub mod stop_loss;
pub mod tradability;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: every type that crosses a thread boundary in the
    /// runner's parallel-map orchestration is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Lot>();
        require_sync::<domain::Lot>();
        require_send::<domain::Portfolio>();
        require_sync::<domain::Portfolio>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();
        require_send::<price_index::PriceIndex>();
        require_sync::<price_index::PriceIndex>();
        require_send::<tradability::TradabilityMap>();
        require_sync::<tradability::TradabilityMap>();
        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();
    }

    /// Architecture contract: the `Ranker` trait never takes a `Portfolio`
    /// parameter — ranking is blind to current holdings.
    #[test]
    fn ranker_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            ranker: &dyn signal_pipeline::Ranker,
            date: chrono::NaiveDate,
            universe: &[domain::Ticker],
            features: &signal_pipeline::FeatureTable,
        ) -> Vec<(domain::Ticker, f64)> {
            ranker.generate_ranked(date, universe, features)
        }
    }
}
