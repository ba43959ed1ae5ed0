//! Error taxonomy for the core engine.
//!
//! Locally-recoverable conditions (missing tradability data, a blocked
//! order, a pending order exhausting its retry budget) are never
//! represented here — they are logged via `tracing::warn!` and folded into
//! a skip. Only conditions that corrupt the run's invariants surface as
//! `Result::Err`.

use super::ticker::Ticker;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by [`crate::domain::portfolio::Portfolio`] mutations.
#[derive(Debug, Error, PartialEq)]
pub enum PortfolioError {
    #[error("insufficient cash: need {needed}, have {available}")]
    InsufficientCash { needed: String, available: String },

    #[error("no open lot for {0} on {1}")]
    NotHeld(Ticker, NaiveDate),

    #[error("already holding {0}; at most one lot per ticker is supported")]
    AlreadyHeld(Ticker),

    #[error("data integrity violation: {0}")]
    DataIntegrity(String),
}

/// Errors that abort a simulation run outright.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),

    #[error("non-positive or non-finite trade price for {ticker} on {date}: {price}")]
    InvalidTradePrice {
        ticker: Ticker,
        date: NaiveDate,
        price: f64,
    },

    #[error("trading calendar is empty")]
    EmptyCalendar,

    #[error("{0} has no price entry on {1}")]
    MissingPrice(Ticker, NaiveDate),
}
