//! Domain types for the A-share daily simulation engine.
//!
//! - [`Ticker`], [`Bar`], [`TradabilityFlags`] — market data shapes
//! - [`Lot`], [`Portfolio`] — position and cash bookkeeping with dual-price
//!   accounting (unadjusted `trade_price` for cash, back-adjusted
//!   `pnl_price` for PnL attribution)
//! - [`TradeRecord`] — a completed buy or sell, fully traceable
//! - [`TargetWeight`], [`PendingOrder`] — signal-pipeline and execution-queue
//!   payloads
//! - [`error`] — the per-subsystem `thiserror` taxonomy

pub mod bar;
pub mod error;
pub mod pending_order;
pub mod portfolio;
pub mod position;
pub mod target_weight;
pub mod ticker;
pub mod trade;

pub use bar::{Bar, TradabilityFlags};
pub use error::{EngineError, PortfolioError};
pub use pending_order::{PendingOrder, PendingOrderReason, Side};
pub use portfolio::Portfolio;
pub use position::Lot;
pub use target_weight::TargetWeight;
pub use ticker::Ticker;
pub use trade::{SellType, StopTrigger, TradeRecord};
