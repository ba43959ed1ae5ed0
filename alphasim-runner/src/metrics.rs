//! Performance metrics — pure functions that compute strategy statistics
//! from a completed run's NAV curve and trade log.
//!
//! Every metric is a pure function: NAV curve and/or trade list in, scalar
//! out. No dependency on the runner or the engine beyond the result types.

use alphasim_core::domain::TradeRecord;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Aggregate performance statistics for a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub turnover: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_losing_streak: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a NAV curve (already normalized to 1.0 at
    /// inception) and the completed trade log.
    pub fn compute(nav_curve: &[(chrono::NaiveDate, f64)], trades: &[TradeRecord]) -> Self {
        let nav: Vec<f64> = nav_curve.iter().map(|(_, v)| *v).collect();
        let trading_days = nav.len();
        Self {
            total_return: total_return(&nav),
            cagr: cagr(&nav, trading_days),
            sharpe: sharpe_ratio(&nav, 0.0),
            sortino: sortino_ratio(&nav, 0.0),
            calmar: calmar_ratio(&nav, trading_days),
            max_drawdown: max_drawdown(&nav),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            turnover: turnover(trades, trading_days),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_losing_streak: avg_losing_streak(trades),
        }
    }
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(nav: &[f64]) -> f64 {
    if nav.len() < 2 {
        return 0.0;
    }
    let initial = nav[0];
    let final_nav = *nav.last().unwrap();
    if initial <= 0.0 {
        return 0.0;
    }
    (final_nav - initial) / initial
}

/// Compound Annual Growth Rate, assuming 252 trading days per year.
pub fn cagr(nav: &[f64], trading_days: usize) -> f64 {
    if nav.len() < 2 || trading_days < 2 {
        return 0.0;
    }
    let initial = nav[0];
    let final_nav = *nav.last().unwrap();
    if initial <= 0.0 || final_nav <= 0.0 {
        return 0.0;
    }
    let years = trading_days as f64 / TRADING_DAYS_PER_YEAR;
    if years <= 0.0 {
        return 0.0;
    }
    (final_nav / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily NAV returns.
pub fn sharpe_ratio(nav: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(nav);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(nav: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(nav);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let downside_sq: Vec<f64> = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();
    if downside_sq.is_empty() {
        return 0.0;
    }
    let downside_var = downside_sq.iter().sum::<f64>() / returns.len() as f64;
    let downside_std = downside_var.sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean / downside_std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Calmar ratio: CAGR / |max drawdown|.
pub fn calmar_ratio(nav: &[f64], trading_days: usize) -> f64 {
    let c = cagr(nav, trading_days);
    let dd = max_drawdown(nav);
    if dd >= 0.0 || c <= 0.0 {
        return 0.0;
    }
    c / dd.abs()
}

/// Maximum drawdown as a negative fraction (e.g. -0.15 = 15% drawdown).
pub fn max_drawdown(nav: &[f64]) -> f64 {
    if nav.len() < 2 {
        return 0.0;
    }
    let mut peak = nav[0];
    let mut max_dd = 0.0_f64;
    for &v in nav {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            let dd = (v - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Win rate: fraction of sell trades that realized a profit.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    let sells: Vec<&TradeRecord> = trades.iter().filter(|t| t.pnl_profit_amount.is_some()).collect();
    if sells.is_empty() {
        return 0.0;
    }
    let winners = sells.iter().filter(|t| t.is_winner()).count();
    winners as f64 / sells.len() as f64
}

/// Profit factor: gross profits / gross losses, capped at 100 for the
/// all-winners edge case.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let pnls: Vec<f64> = trades
        .iter()
        .filter_map(|t| t.pnl_profit_amount)
        .filter_map(|d| d.to_f64())
        .collect();
    if pnls.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|p| **p < 0.0).map(|p| p.abs()).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Annual turnover: total traded notional, normalized to years of history.
pub fn turnover(trades: &[TradeRecord], trading_days: usize) -> f64 {
    if trades.is_empty() || trading_days < 2 {
        return 0.0;
    }
    let total_notional: f64 = trades
        .iter()
        .filter_map(|t| t.gross_amount.to_f64())
        .sum();
    let years = trading_days as f64 / TRADING_DAYS_PER_YEAR;
    if years <= 0.0 {
        return 0.0;
    }
    total_notional / years
}

fn max_consecutive(trades: &[TradeRecord], winning: bool) -> usize {
    let sells: Vec<&TradeRecord> = trades.iter().filter(|t| t.pnl_profit_amount.is_some()).collect();
    let mut best = 0;
    let mut current = 0;
    for t in sells {
        if t.is_winner() == winning {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// Average length of losing streaks (runs of consecutive losing sells).
pub fn avg_losing_streak(trades: &[TradeRecord]) -> f64 {
    let sells: Vec<&TradeRecord> = trades.iter().filter(|t| t.pnl_profit_amount.is_some()).collect();
    if sells.is_empty() {
        return 0.0;
    }
    let mut streaks: Vec<usize> = Vec::new();
    let mut current = 0;
    for t in sells {
        if !t.is_winner() {
            current += 1;
        } else if current > 0 {
            streaks.push(current);
            current = 0;
        }
    }
    if current > 0 {
        streaks.push(current);
    }
    if streaks.is_empty() {
        return 0.0;
    }
    streaks.iter().sum::<usize>() as f64 / streaks.len() as f64
}

/// Daily returns derived from a NAV (or equity) series.
pub fn daily_returns(nav: &[f64]) -> Vec<f64> {
    if nav.len() < 2 {
        return Vec::new();
    }
    nav.windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
