//! Parquet-backed append-only tables: `trades/trades.parquet`,
//! `nav/nav.parquet`, and `pending/{date}.parquet`. Writes are atomic
//! (`.tmp` then rename), grounded in the teacher's equity-curve/cache
//! Parquet I/O (`reporting/artifacts/equity.rs`, `data/cache.rs`).

use std::fs::File;
use std::path::Path;

use alphasim_core::domain::{TargetWeight, Ticker, TradeRecord};
use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::prelude::ToPrimitive;

use crate::config::ConfigError;

fn atomic_write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let tmp = path.with_extension("parquet.tmp");
    let mut file = File::create(&tmp).map_err(|source| ConfigError::Io {
        path: tmp.display().to_string(),
        source,
    })?;
    ParquetWriter::new(&mut file)
        .finish(df)
        .map_err(|e| ConfigError::Invalid(format!("parquet write failed: {e}")))?;
    std::fs::rename(&tmp, path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<Option<DataFrame>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| ConfigError::Invalid(format!("parquet read failed: {e}")))?;
    Ok(Some(df))
}

fn trade_side_str(side: alphasim_core::domain::trade::Side) -> &'static str {
    match side {
        alphasim_core::domain::trade::Side::Buy => "buy",
        alphasim_core::domain::trade::Side::Sell => "sell",
    }
}

fn sell_type_str(sell_type: alphasim_core::domain::SellType) -> &'static str {
    use alphasim_core::domain::trade::{SellType, StopTrigger};
    match sell_type {
        SellType::Rebalance => "rebalance",
        SellType::HoldingPeriodExpiry => "holding_period",
        SellType::StopLoss(StopTrigger::Drawdown) => "stop_loss:drawdown",
        SellType::StopLoss(StopTrigger::Trailing) => "stop_loss:trailing",
        SellType::StopLoss(StopTrigger::ConsecutiveLimitDown) => "stop_loss:consecutive_limit_down",
        SellType::Forced => "forced",
    }
}

fn trades_to_dataframe(trades: &[TradeRecord]) -> Result<DataFrame, ConfigError> {
    let tickers: Vec<String> = trades.iter().map(|t| t.ticker.as_str().to_string()).collect();
    let dates: Vec<i32> = trades
        .iter()
        .map(|t| (t.date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32)
        .collect();
    let sides: Vec<&str> = trades.iter().map(|t| trade_side_str(t.side)).collect();
    let shares: Vec<u64> = trades.iter().map(|t| t.shares).collect();
    let trade_prices: Vec<f64> = trades.iter().map(|t| t.trade_price).collect();
    let pnl_prices: Vec<f64> = trades.iter().map(|t| t.pnl_price).collect();
    let gross_amount: Vec<f64> = trades.iter().map(|t| t.gross_amount.to_f64().unwrap_or(0.0)).collect();
    let commission: Vec<f64> = trades.iter().map(|t| t.commission.to_f64().unwrap_or(0.0)).collect();
    let stamp_tax: Vec<f64> = trades.iter().map(|t| t.stamp_tax.to_f64().unwrap_or(0.0)).collect();
    let slippage: Vec<f64> = trades.iter().map(|t| t.slippage.to_f64().unwrap_or(0.0)).collect();
    let net_cash: Vec<f64> = trades.iter().map(|t| t.net_cash.to_f64().unwrap_or(0.0)).collect();
    let matched_buy_trade_price: Vec<Option<f64>> =
        trades.iter().map(|t| t.matched_buy_trade_price).collect();
    let matched_buy_pnl_price: Vec<Option<f64>> =
        trades.iter().map(|t| t.matched_buy_pnl_price).collect();
    let pnl_amount: Vec<Option<f64>> = trades
        .iter()
        .map(|t| t.pnl_profit_amount.and_then(|d| d.to_f64()))
        .collect();
    let pnl_pct: Vec<Option<f64>> = trades.iter().map(|t| t.pnl_profit_pct).collect();
    let sell_type: Vec<Option<&str>> = trades.iter().map(|t| t.sell_type.map(sell_type_str)).collect();

    DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| ConfigError::Invalid(format!("date cast: {e}")))?,
        Column::new("side".into(), sides),
        Column::new("shares".into(), shares),
        Column::new("trade_price".into(), trade_prices),
        Column::new("pnl_price".into(), pnl_prices),
        Column::new("gross_amount".into(), gross_amount),
        Column::new("commission".into(), commission),
        Column::new("stamp_tax".into(), stamp_tax),
        Column::new("slippage".into(), slippage),
        Column::new("net_cash".into(), net_cash),
        Column::new("matched_buy_trade_price".into(), matched_buy_trade_price),
        Column::new("matched_buy_pnl_price".into(), matched_buy_pnl_price),
        Column::new("pnl_profit_amount".into(), pnl_amount),
        Column::new("pnl_profit_pct".into(), pnl_pct),
        Column::new("sell_type".into(), sell_type),
    ])
    .map_err(|e| ConfigError::Invalid(format!("dataframe build failed: {e}")))
}

/// Append `new_trades` to `trades/trades.parquet`, creating the file on
/// first write.
pub fn append_trades(path: &Path, new_trades: &[TradeRecord]) -> Result<(), ConfigError> {
    if new_trades.is_empty() {
        return Ok(());
    }
    let mut df = trades_to_dataframe(new_trades)?;
    if let Some(existing) = read_parquet(path)? {
        df = existing
            .vstack(&df)
            .map_err(|e| ConfigError::Invalid(format!("trade log append failed: {e}")))?;
    }
    atomic_write_parquet(&mut df, path)
}

/// Append `(date, nav)` rows to `nav/nav.parquet`.
pub fn append_nav(path: &Path, points: &[(NaiveDate, f64)]) -> Result<(), ConfigError> {
    if points.is_empty() {
        return Ok(());
    }
    let dates: Vec<i32> = points
        .iter()
        .map(|(d, _)| (*d - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32)
        .collect();
    let navs: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let mut df = DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| ConfigError::Invalid(format!("date cast: {e}")))?,
        Column::new("nav".into(), navs),
    ])
    .map_err(|e| ConfigError::Invalid(format!("dataframe build failed: {e}")))?;
    if let Some(existing) = read_parquet(path)? {
        df = existing
            .vstack(&df)
            .map_err(|e| ConfigError::Invalid(format!("nav append failed: {e}")))?;
    }
    atomic_write_parquet(&mut df, path)
}

/// Write the full set of target weights computed for `date`'s fill, to
/// `pending/{date}.parquet`. Overwritten (not appended) — one file per
/// rebalance date holds that date's complete target set.
pub fn write_pending_weights(path: &Path, weights: &[TargetWeight]) -> Result<(), ConfigError> {
    let tickers: Vec<String> = weights.iter().map(|w| w.ticker.as_str().to_string()).collect();
    let wts: Vec<f64> = weights.iter().map(|w| w.weight).collect();
    let mut df = DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        Column::new("weight".into(), wts),
    ])
    .map_err(|e| ConfigError::Invalid(format!("dataframe build failed: {e}")))?;
    atomic_write_parquet(&mut df, path)
}

pub fn read_pending_weights(path: &Path) -> Result<Vec<TargetWeight>, ConfigError> {
    let Some(df) = read_parquet(path)? else {
        return Ok(Vec::new());
    };
    let tickers = df
        .column("ticker")
        .map_err(|e| ConfigError::Invalid(format!("missing ticker column: {e}")))?
        .str()
        .map_err(|e| ConfigError::Invalid(format!("ticker column type: {e}")))?;
    let weights = df
        .column("weight")
        .map_err(|e| ConfigError::Invalid(format!("missing weight column: {e}")))?
        .f64()
        .map_err(|e| ConfigError::Invalid(format!("weight column type: {e}")))?;
    Ok(tickers
        .into_iter()
        .zip(weights.into_iter())
        .filter_map(|(t, w)| match (t, w) {
            (Some(t), Some(w)) => Some(TargetWeight { ticker: Ticker::new(t), weight: w }),
            _ => None,
        })
        .collect())
}
