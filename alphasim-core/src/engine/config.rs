//! EngineConfig — every tunable the tick loop needs, collected in one
//! serializable struct so a run is fully reproducible from `(config, dataset)`.

use crate::cost_model::CostModel;
use crate::equity_curve::EquityCurveConfig;
use crate::risk_budget::RiskBudgetConfig;
use crate::scheduler::BatchRebalanceConfig;
use crate::signal_pipeline::WeightMethod;
use crate::stop_loss::StopLossConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: Decimal,
    pub cost_model: CostModel,
    pub stop_loss: StopLossConfig,
    pub equity_curve: EquityCurveConfig,
    pub risk_budget: RiskBudgetConfig,
    /// Trading-day count between rebalances (spec.md §4.9's `rebalance_freq`).
    pub rebalance_freq: usize,
    /// Optional batch-rebalance tranching over the target universe.
    pub batch_rebalance: Option<BatchRebalanceConfig>,
    pub holding_period_days: Option<usize>,
    /// Number of tickers the ranker's top slice is sized into.
    pub top_n: usize,
    pub weight_method: WeightMethod,
    /// Fraction of equity allocated across the top-N set; the remainder stays cash.
    pub max_gross_exposure: f64,
    pub pending_max_retries: u32,
    /// Trading-day count since a pending order's `first_enqueued_date`
    /// beyond which it expires regardless of remaining retry budget
    /// (spec.md §4.5).
    pub pending_max_retry_days: u32,
    /// Shares must be traded in multiples of this lot size.
    pub lot_size: u64,
    /// Resolution of the batch-rebalance / exposure-controller interaction
    /// open question: the `EquityCurveController` multiplier is applied
    /// once, to the whole target-weight vector produced at the rebalance,
    /// not re-derived per tranche.
    pub exposure_applies_once: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            initial_capital: dec!(1_000_000),
            cost_model: CostModel::default(),
            stop_loss: StopLossConfig::default(),
            equity_curve: EquityCurveConfig::default(),
            risk_budget: RiskBudgetConfig::default(),
            rebalance_freq: 5,
            batch_rebalance: None,
            holding_period_days: None,
            top_n: 20,
            weight_method: WeightMethod::Equal,
            max_gross_exposure: 0.95,
            pending_max_retries: 5,
            pending_max_retry_days: 10,
            lot_size: 100,
            exposure_applies_once: true,
        }
    }
}
