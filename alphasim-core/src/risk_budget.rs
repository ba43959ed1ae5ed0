//! RiskBudgetScaler — reweights target weights inversely to each ticker's
//! trailing realized volatility, computed strictly from prices before the
//! rebalance date (no look-ahead), preserving the total allocated weight.

use crate::domain::{Ticker, TargetWeight};
use crate::price_index::PriceIndex;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBudgetConfig {
    /// Number of trailing trading days used to estimate volatility.
    pub vol_window: usize,
    /// Volatility floor to avoid dividing by (near-)zero for flat series.
    pub min_volatility: f64,
}

impl Default for RiskBudgetConfig {
    fn default() -> Self {
        Self {
            vol_window: 20,
            min_volatility: 1e-4,
        }
    }
}

pub struct RiskBudgetScaler {
    config: RiskBudgetConfig,
}

impl RiskBudgetScaler {
    pub fn new(config: RiskBudgetConfig) -> Self {
        Self { config }
    }

    /// Trailing daily-return stdev of `pnl_price` over the `vol_window`
    /// trading days strictly preceding `as_of` (i.e. using dates < as_of,
    /// so the rebalance decision at T never sees T's own close).
    fn trailing_volatility(&self, prices: &PriceIndex, ticker: &Ticker, as_of: NaiveDate) -> f64 {
        let history_dates: Vec<NaiveDate> =
            prices.dates().into_iter().filter(|d| *d < as_of).collect();
        let window: Vec<NaiveDate> = history_dates
            .iter()
            .rev()
            .take(self.config.vol_window + 1)
            .rev()
            .copied()
            .collect();
        let closes: Vec<f64> = window
            .iter()
            .filter_map(|d| prices.pnl_price(*d, ticker, false))
            .collect();
        if closes.len() < 3 {
            return self.config.min_volatility;
        }
        // Spec.md §4.8 specifies log-returns for the volatility estimate.
        let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        variance.sqrt().max(self.config.min_volatility)
    }

    /// Rescale `weights` inversely to trailing volatility, holding the sum
    /// of weights fixed (cash allocation is preserved, not grown).
    pub fn scale(
        &self,
        weights: &[TargetWeight],
        prices: &PriceIndex,
        as_of: NaiveDate,
    ) -> Vec<TargetWeight> {
        if weights.is_empty() {
            return Vec::new();
        }
        let original_total: f64 = weights.iter().map(|w| w.weight).sum();
        let inv_vols: Vec<f64> = weights
            .iter()
            .map(|w| 1.0 / self.trailing_volatility(prices, &w.ticker, as_of))
            .collect();
        let inv_vol_total: f64 = inv_vols.iter().sum();
        if inv_vol_total <= 0.0 {
            return weights.to_vec();
        }
        weights
            .iter()
            .zip(inv_vols.iter())
            .map(|(w, inv_vol)| TargetWeight {
                ticker: w.ticker.clone(),
                weight: original_total * inv_vol / inv_vol_total,
            })
            .collect()
    }
}
