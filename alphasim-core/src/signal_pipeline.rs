//! SignalPipeline — the T-day ranking step and its T+1 tradability backfill.
//!
//! The [`Ranker`] trait is deliberately portfolio-blind: it sees only the
//! universe and the feature table, never the current holdings, so a single
//! ranking implementation can be reused and compared across strategies
//! without risking it leaking position state into its scores.

use crate::domain::{TargetWeight, Ticker};
use crate::tradability::TradabilityMap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How a selected candidate set is turned into target weights (spec.md
/// §4.10 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMethod {
    /// `1 / accepted_count` for every selected ticker.
    Equal,
    /// Proportional to the ranker's score, clipped at zero, then normalized
    /// to the same total as equal-weighting would have allocated.
    Score,
}

/// A read-only, per-day table of named features keyed by ticker, handed to
/// the ranker. Feature construction itself is an external collaborator's
/// responsibility (SPEC_FULL.md §1); this is only the consumption shape.
#[derive(Debug, Default, Clone)]
pub struct FeatureTable {
    rows: HashMap<Ticker, HashMap<String, f64>>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: Ticker, feature: impl Into<String>, value: f64) {
        self.rows.entry(ticker).or_default().insert(feature.into(), value);
    }

    pub fn get(&self, ticker: &Ticker, feature: &str) -> Option<f64> {
        self.rows.get(ticker).and_then(|f| f.get(feature)).copied()
    }
}

/// A pre-fit predictor that scores and orders candidate tickers. Never
/// receives the portfolio — see the architecture-contract test in `lib.rs`.
pub trait Ranker {
    /// Return `(ticker, score)` pairs, higher score first, for the given
    /// trading day and candidate universe.
    fn generate_ranked(
        &self,
        date: NaiveDate,
        universe: &[Ticker],
        features: &FeatureTable,
    ) -> Vec<(Ticker, f64)>;
}

/// Top-N equal-weight target-weight construction from a ranker's output,
/// filtered by T+1 tradability (a ticker that will be untradable on the fill
/// day is dropped from the target set rather than queued, per SPEC_FULL.md
/// §4's T-day/T+1 split).
#[allow(clippy::too_many_arguments)]
pub fn rank_and_backfill(
    ranker: &dyn Ranker,
    date: NaiveDate,
    fill_date: NaiveDate,
    universe: &[Ticker],
    features: &FeatureTable,
    tradability: &TradabilityMap,
    already_held: &HashSet<Ticker>,
    top_n: usize,
    max_gross_exposure: f64,
    weight_method: WeightMethod,
) -> Vec<TargetWeight> {
    let mut ranked = ranker.generate_ranked(date, universe, features);
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    // Walk the ordered candidate list and backfill: skip anything that will
    // be untradable on the fill day, or already held with a remaining
    // holding period, rather than stopping at the first miss (spec.md §4.10
    // steps 2-3).
    let mut selected: Vec<(Ticker, f64)> = Vec::with_capacity(top_n);
    for (ticker, score) in ranked {
        if selected.len() >= top_n {
            break;
        }
        if already_held.contains(&ticker) {
            tracing::debug!(%ticker, %fill_date, "candidate already held, backfilling");
            continue;
        }
        if !tradability.can_buy(fill_date, &ticker) {
            tracing::warn!(%ticker, %fill_date, "candidate untradable on fill day, backfilling");
            continue;
        }
        selected.push((ticker, score));
    }
    if selected.is_empty() {
        return Vec::new();
    }
    if selected.len() < top_n {
        tracing::warn!(
            accepted = selected.len(),
            requested = top_n,
            %date,
            "fewer tradable candidates than top_n, issuing a smaller weight set"
        );
    }

    match weight_method {
        WeightMethod::Equal => {
            let weight = max_gross_exposure / selected.len() as f64;
            selected
                .into_iter()
                .map(|(ticker, _)| TargetWeight { ticker, weight })
                .collect()
        }
        WeightMethod::Score => {
            let clipped: Vec<f64> = selected.iter().map(|(_, s)| s.max(0.0)).collect();
            let total: f64 = clipped.iter().sum();
            if total <= 0.0 {
                let weight = max_gross_exposure / selected.len() as f64;
                selected
                    .into_iter()
                    .map(|(ticker, _)| TargetWeight { ticker, weight })
                    .collect()
            } else {
                selected
                    .into_iter()
                    .zip(clipped)
                    .map(|((ticker, _), c)| TargetWeight {
                        ticker,
                        weight: max_gross_exposure * c / total,
                    })
                    .collect()
            }
        }
    }
}
