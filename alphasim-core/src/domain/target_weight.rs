//! TargetWeight — one ticker's desired portfolio share, produced by the
//! signal pipeline and consumed by the execution engine.

use super::ticker::Ticker;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetWeight {
    pub ticker: Ticker,
    /// Fraction of total equity this position should occupy, in [0, 1].
    pub weight: f64,
}

/// Validate that a full set of target weights is individually non-negative
/// and sums to at most 1 (cash is allowed to remain unallocated).
pub fn validate_weights(weights: &[TargetWeight]) -> Result<(), String> {
    let mut total = 0.0;
    for w in weights {
        if !(0.0..=1.0).contains(&w.weight) {
            return Err(format!(
                "weight for {} out of [0,1]: {}",
                w.ticker, w.weight
            ));
        }
        total += w.weight;
    }
    if total > 1.0 + 1e-9 {
        return Err(format!("target weights sum to {total} > 1"));
    }
    Ok(())
}
