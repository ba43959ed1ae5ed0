//! PaperConfig — the durable, JSON-shaped configuration a paper-trading
//! account is parameterized by (`paper/config.json`, written once by the
//! `config` CLI verb and read by every subsequent `run`/`positions` call).

use alphasim_core::engine::EngineConfig;
use alphasim_core::equity_curve::{DrawdownBracket, EquityCurveConfig, RecoveryMode};
use alphasim_core::risk_budget::RiskBudgetConfig;
use alphasim_core::stop_loss::StopLossConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Close,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMethod {
    Equal,
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniverseSelector {
    Mainboard,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PaperConfig {
    #[serde(default = "default_buy_price")]
    pub buy_price: PriceField,
    #[serde(default = "default_sell_price")]
    pub sell_price: PriceField,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
    pub rebalance_freq: u32,
    #[serde(default = "default_weight_method")]
    pub weight_method: WeightMethod,
    pub universe: UniverseSelector,
    #[serde(default)]
    pub model_version: Option<u32>,
    #[serde(default)]
    pub batch_rebalance_tranches: Option<usize>,

    #[serde(default)]
    pub stop_loss_enabled: bool,
    #[serde(default = "default_stop_loss_drawdown_pct")]
    pub stop_loss_drawdown_pct: f64,
    #[serde(default)]
    pub stop_loss_trailing_enabled: bool,
    #[serde(default = "default_stop_loss_trailing_pct")]
    pub stop_loss_trailing_pct: f64,
    #[serde(default = "default_consecutive_limit_down")]
    pub stop_loss_consecutive_limit_down: u32,

    #[serde(default)]
    pub equity_curve_enabled: bool,
    /// Parallel to `equity_curve_drawdown_levels`: ascending drawdown-pct
    /// thresholds, e.g. `[5, 10, 15, 20]` (spec.md §4.7 step 1 / S6).
    #[serde(default = "default_drawdown_thresholds")]
    pub equity_curve_drawdown_thresholds: Vec<f64>,
    #[serde(default = "default_drawdown_levels")]
    pub equity_curve_drawdown_levels: Vec<f64>,
    #[serde(default = "default_ma_short_window")]
    pub equity_curve_ma_short_window: usize,
    #[serde(default = "default_ma_long_window")]
    pub equity_curve_ma_long_window: usize,
    #[serde(default = "default_ma_exposure_on")]
    pub equity_curve_ma_exposure_on: f64,
    #[serde(default = "default_ma_exposure_off")]
    pub equity_curve_ma_exposure_off: f64,
    #[serde(default = "default_recovery_mode")]
    pub equity_curve_recovery_mode: RecoveryMode,
    #[serde(default = "default_recovery_delay_periods")]
    pub equity_curve_recovery_delay_periods: u32,
    #[serde(default = "default_recovery_step")]
    pub equity_curve_recovery_step: f64,
    #[serde(default = "default_min_exposure")]
    pub equity_curve_min_exposure: f64,
    #[serde(default = "default_max_exposure")]
    pub equity_curve_max_exposure: f64,

    #[serde(default)]
    pub risk_budget_enabled: bool,
    #[serde(default = "default_vol_window")]
    pub vol_window: usize,
    #[serde(default = "default_vol_epsilon")]
    pub vol_epsilon: f64,
}

fn default_buy_price() -> PriceField {
    PriceField::Close
}
fn default_sell_price() -> PriceField {
    PriceField::Close
}
fn default_top_n() -> usize {
    5
}
fn default_initial_capital() -> Decimal {
    Decimal::from(500_000)
}
fn default_weight_method() -> WeightMethod {
    WeightMethod::Equal
}
fn default_stop_loss_drawdown_pct() -> f64 {
    0.15
}
fn default_stop_loss_trailing_pct() -> f64 {
    0.10
}
fn default_consecutive_limit_down() -> u32 {
    3
}
fn default_drawdown_thresholds() -> Vec<f64> {
    vec![5.0, 10.0, 15.0, 20.0]
}
fn default_drawdown_levels() -> Vec<f64> {
    vec![0.8, 0.6, 0.4, 0.2]
}
fn default_ma_short_window() -> usize {
    10
}
fn default_ma_long_window() -> usize {
    60
}
fn default_ma_exposure_on() -> f64 {
    1.0
}
fn default_ma_exposure_off() -> f64 {
    0.5
}
fn default_recovery_mode() -> RecoveryMode {
    RecoveryMode::Gradual
}
fn default_recovery_delay_periods() -> u32 {
    2
}
fn default_recovery_step() -> f64 {
    0.2
}
fn default_min_exposure() -> f64 {
    0.0
}
fn default_max_exposure() -> f64 {
    1.0
}
fn default_vol_window() -> usize {
    20
}
fn default_vol_epsilon() -> f64 {
    1e-4
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            buy_price: PriceField::Close,
            sell_price: PriceField::Close,
            top_n: default_top_n(),
            initial_capital: default_initial_capital(),
            rebalance_freq: 5,
            weight_method: WeightMethod::Equal,
            universe: UniverseSelector::Mainboard,
            model_version: None,
            batch_rebalance_tranches: None,
            stop_loss_enabled: false,
            stop_loss_drawdown_pct: default_stop_loss_drawdown_pct(),
            stop_loss_trailing_enabled: false,
            stop_loss_trailing_pct: default_stop_loss_trailing_pct(),
            stop_loss_consecutive_limit_down: default_consecutive_limit_down(),
            equity_curve_enabled: false,
            equity_curve_drawdown_thresholds: default_drawdown_thresholds(),
            equity_curve_drawdown_levels: default_drawdown_levels(),
            equity_curve_ma_short_window: default_ma_short_window(),
            equity_curve_ma_long_window: default_ma_long_window(),
            equity_curve_ma_exposure_on: default_ma_exposure_on(),
            equity_curve_ma_exposure_off: default_ma_exposure_off(),
            equity_curve_recovery_mode: default_recovery_mode(),
            equity_curve_recovery_delay_periods: default_recovery_delay_periods(),
            equity_curve_recovery_step: default_recovery_step(),
            equity_curve_min_exposure: default_min_exposure(),
            equity_curve_max_exposure: default_max_exposure(),
            risk_budget_enabled: false,
            vol_window: default_vol_window(),
            vol_epsilon: default_vol_epsilon(),
        }
    }
}

impl PaperConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Write `config.json` atomically (write to a sibling `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| ConfigError::Io {
            path: tmp.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn stop_loss_config(&self) -> StopLossConfig {
        StopLossConfig {
            drawdown_threshold: -self.stop_loss_drawdown_pct.abs(),
            trailing_threshold: if self.stop_loss_trailing_enabled {
                -self.stop_loss_trailing_pct.abs()
            } else {
                -1.0
            },
            max_consecutive_limit_down_days: self.stop_loss_consecutive_limit_down,
        }
    }

    pub fn equity_curve_config(&self) -> EquityCurveConfig {
        let brackets = self
            .equity_curve_drawdown_thresholds
            .iter()
            .zip(self.equity_curve_drawdown_levels.iter())
            .map(|(&threshold_pct, &exposure_level)| DrawdownBracket {
                threshold_pct,
                exposure_level,
            })
            .collect();
        EquityCurveConfig {
            drawdown_brackets: brackets,
            ma_short_window: self.equity_curve_ma_short_window,
            ma_long_window: self.equity_curve_ma_long_window,
            ma_exposure_on: self.equity_curve_ma_exposure_on,
            ma_exposure_off: self.equity_curve_ma_exposure_off,
            recovery_mode: self.equity_curve_recovery_mode,
            recovery_delay_periods: self.equity_curve_recovery_delay_periods,
            recovery_step: self.equity_curve_recovery_step,
            min_exposure: self.equity_curve_min_exposure,
            max_exposure: self.equity_curve_max_exposure,
        }
    }

    pub fn risk_budget_config(&self) -> RiskBudgetConfig {
        RiskBudgetConfig {
            vol_window: self.vol_window,
            min_volatility: self.vol_epsilon,
        }
    }

    /// Fold this config into the engine tunables `Engine` actually runs
    /// against. `stop_loss_enabled`/`equity_curve_enabled`/`risk_budget_enabled`
    /// gate inclusion by substituting the neutral/no-op config when disabled
    /// rather than the core threading an `Option` through every call site.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.initial_capital,
            stop_loss: if self.stop_loss_enabled {
                self.stop_loss_config()
            } else {
                StopLossConfig {
                    drawdown_threshold: -1.0,
                    trailing_threshold: -1.0,
                    max_consecutive_limit_down_days: u32::MAX,
                }
            },
            equity_curve: if self.equity_curve_enabled {
                self.equity_curve_config()
            } else {
                EquityCurveConfig {
                    drawdown_brackets: Vec::new(),
                    ma_short_window: 1,
                    ma_long_window: usize::MAX,
                    ma_exposure_on: 1.0,
                    ma_exposure_off: 1.0,
                    recovery_mode: RecoveryMode::Immediate,
                    recovery_delay_periods: 0,
                    recovery_step: 1.0,
                    min_exposure: 1.0,
                    max_exposure: 1.0,
                }
            },
            risk_budget: if self.risk_budget_enabled {
                self.risk_budget_config()
            } else {
                RiskBudgetConfig {
                    vol_window: 1,
                    min_volatility: 1.0,
                }
            },
            rebalance_freq: self.rebalance_freq as usize,
            batch_rebalance: self
                .batch_rebalance_tranches
                .map(|tranches| alphasim_core::scheduler::BatchRebalanceConfig { tranches }),
            weight_method: match self.weight_method {
                WeightMethod::Equal => alphasim_core::signal_pipeline::WeightMethod::Equal,
                WeightMethod::Score => alphasim_core::signal_pipeline::WeightMethod::Score,
            },
            holding_period_days: None,
            top_n: self.top_n,
            max_gross_exposure: 0.95,
            pending_max_retries: 5,
            lot_size: 100,
            exposure_applies_once: true,
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = PaperConfig {
            universe: UniverseSelector::All,
            ..PaperConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back = PaperConfig::from_json_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let json = r#"{"rebalance_freq": 5, "universe": "mainboard"}"#;
        let cfg = PaperConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.top_n, 5);
        assert_eq!(cfg.buy_price, PriceField::Close);
        assert!(!cfg.stop_loss_enabled);
    }

    #[test]
    fn disabled_stop_loss_substitutes_a_no_op_threshold() {
        let cfg = PaperConfig {
            universe: UniverseSelector::Mainboard,
            ..PaperConfig::default()
        };
        let engine_cfg = cfg.to_engine_config();
        assert!(engine_cfg.stop_loss.drawdown_threshold <= -1.0);
    }

    #[test]
    fn to_engine_config_carries_the_literal_rebalance_freq() {
        let cfg = PaperConfig { rebalance_freq: 7, ..PaperConfig::default() };
        assert_eq!(cfg.to_engine_config().rebalance_freq, 7);
    }

    #[test]
    fn disabled_equity_curve_always_returns_full_exposure() {
        let cfg = PaperConfig { equity_curve_enabled: false, ..PaperConfig::default() };
        let engine_cfg = cfg.to_engine_config();
        let mut ctl = alphasim_core::equity_curve::EquityCurveController::new(engine_cfg.equity_curve);
        let hist: Vec<_> = (1..200)
            .map(|d| (chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(d), 0.3))
            .collect();
        let (m, _) = ctl.multiplier(&hist);
        assert_eq!(m, 1.0);
    }
}
