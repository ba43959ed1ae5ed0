//! EquityCurveController — derives an exposure multiplier in
//! `[min_exposure, max_exposure]` from the NAV history so far (spec.md
//! §4.7): a drawdown bracket, intersected with a moving-average trend
//! filter, combined conservatively (the minimum of the two), then subject
//! to a recovery policy (immediate or gradual) before being clamped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One rung of the drawdown ladder: once the trailing drawdown from the
/// running peak exceeds `threshold_pct`, `exposure_level` is adopted.
/// Brackets are evaluated from the deepest threshold down, so the *lowest*
/// bracket whose threshold the drawdown exceeds wins (spec.md §4.7 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownBracket {
    pub threshold_pct: f64,
    pub exposure_level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryMode {
    Immediate,
    Gradual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurveConfig {
    /// Drawdown brackets, ordered by ascending `threshold_pct` (e.g. the
    /// spec.md S6 example: `[5, 10, 15, 20] -> [0.8, 0.6, 0.4, 0.2]`).
    pub drawdown_brackets: Vec<DrawdownBracket>,
    /// Trailing-mean window (in trading days) for the short leg of the MA
    /// trend filter.
    pub ma_short_window: usize,
    /// Trailing-mean window for the long leg.
    pub ma_long_window: usize,
    /// Exposure factor applied when the short MA sits above the long MA.
    pub ma_exposure_on: f64,
    /// Exposure factor applied when the short MA sits at or below the long MA.
    pub ma_exposure_off: f64,
    pub recovery_mode: RecoveryMode,
    /// Gradual mode only: rebalance periods to wait after a decrease before
    /// exposure is allowed to rise again.
    pub recovery_delay_periods: u32,
    /// Gradual mode only: maximum increase applied per rebalance once the
    /// delay has elapsed.
    pub recovery_step: f64,
    pub min_exposure: f64,
    pub max_exposure: f64,
}

impl Default for EquityCurveConfig {
    fn default() -> Self {
        Self {
            drawdown_brackets: vec![
                DrawdownBracket { threshold_pct: 5.0, exposure_level: 0.8 },
                DrawdownBracket { threshold_pct: 10.0, exposure_level: 0.6 },
                DrawdownBracket { threshold_pct: 15.0, exposure_level: 0.4 },
                DrawdownBracket { threshold_pct: 20.0, exposure_level: 0.2 },
            ],
            ma_short_window: 10,
            ma_long_window: 60,
            ma_exposure_on: 1.0,
            ma_exposure_off: 0.5,
            recovery_mode: RecoveryMode::Gradual,
            recovery_delay_periods: 2,
            recovery_step: 0.2,
            min_exposure: 0.0,
            max_exposure: 1.0,
        }
    }
}

/// The controller's own persistent state: the last exposure it applied, and
/// how many rebalance periods have elapsed since a decrease (for the
/// gradual-recovery policy). Carried across rebalances within one engine
/// run; the paper runner has no cross-process persistence requirement for
/// this state since a fresh multiplier is derived from `nav_history` (which
/// is itself durable) on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityCurveState {
    last_applied_exposure: f64,
    periods_since_decrease: u32,
}

impl Default for EquityCurveState {
    fn default() -> Self {
        Self {
            last_applied_exposure: 1.0,
            periods_since_decrease: u32::MAX,
        }
    }
}

pub struct EquityCurveController {
    config: EquityCurveConfig,
    state: EquityCurveState,
}

impl EquityCurveController {
    pub fn new(config: EquityCurveConfig) -> Self {
        Self { config, state: EquityCurveState::default() }
    }

    /// The lowest bracket whose threshold the current drawdown (a positive
    /// percentage) exceeds; 1.0 (full exposure) if no bracket is breached.
    fn drawdown_factor(&self, drawdown_pct: f64) -> f64 {
        let mut factor = 1.0;
        for bracket in &self.config.drawdown_brackets {
            if drawdown_pct > bracket.threshold_pct {
                factor = bracket.exposure_level;
            }
        }
        factor
    }

    fn ma_factor(&self, nav_history: &[(NaiveDate, f64)]) -> f64 {
        let short = trailing_mean(nav_history, self.config.ma_short_window);
        let long = trailing_mean(nav_history, self.config.ma_long_window);
        match (short, long) {
            (Some(s), Some(l)) if s > l => self.config.ma_exposure_on,
            (Some(_), Some(_)) => self.config.ma_exposure_off,
            _ => 1.0,
        }
    }

    /// `nav_history` must contain only NAV points strictly before the
    /// current tick (no look-ahead) — the caller passes `nav_history[..D]`.
    /// Returns the clamped exposure multiplier and a human-readable reason
    /// (spec.md §4.7's output contract).
    pub fn multiplier(&mut self, nav_history: &[(NaiveDate, f64)]) -> (f64, String) {
        if nav_history.len() < self.config.ma_long_window {
            self.state.last_applied_exposure = 1.0;
            return (1.0, "insufficient history".to_string());
        }

        let peak = nav_history
            .iter()
            .map(|(_, nav)| *nav)
            .fold(f64::MIN, f64::max)
            .max(f64::MIN_POSITIVE);
        let current = nav_history.last().unwrap().1;
        let drawdown_pct = (1.0 - current / peak) * 100.0;
        let dd_factor = self.drawdown_factor(drawdown_pct);
        let ma_factor = self.ma_factor(nav_history);
        let raw = dd_factor.min(ma_factor);

        let applied = if raw > self.state.last_applied_exposure {
            match self.config.recovery_mode {
                RecoveryMode::Immediate => raw,
                RecoveryMode::Gradual => {
                    if self.state.periods_since_decrease < self.config.recovery_delay_periods {
                        self.state.last_applied_exposure
                    } else {
                        (self.state.last_applied_exposure + self.config.recovery_step).min(raw)
                    }
                }
            }
        } else {
            raw
        };

        let clamped = applied.clamp(self.config.min_exposure, self.config.max_exposure);

        if clamped < self.state.last_applied_exposure {
            self.state.periods_since_decrease = 0;
        } else if self.state.periods_since_decrease != u32::MAX {
            self.state.periods_since_decrease += 1;
        }
        self.state.last_applied_exposure = clamped;

        let reason = format!(
            "drawdown={drawdown_pct:.2}% -> {dd_factor:.2}, ma_factor={ma_factor:.2}, applied={clamped:.2}"
        );
        (clamped, reason)
    }
}

fn trailing_mean(nav_history: &[(NaiveDate, f64)], window: usize) -> Option<f64> {
    if nav_history.len() < window || window == 0 {
        return None;
    }
    let slice = &nav_history[nav_history.len() - window..];
    Some(slice.iter().map(|(_, nav)| *nav).sum::<f64>() / window as f64)
}
