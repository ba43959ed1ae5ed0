//! RunResult — everything a completed simulation run hands back.

use crate::domain::TradeRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// (date, NAV as a multiple of initial capital), one point per trading day.
    pub nav_curve: Vec<(NaiveDate, f64)>,
    pub trades: Vec<TradeRecord>,
    pub final_equity: f64,
    pub bar_count: usize,
    /// Non-fatal conditions surfaced during the run (missing adjusted
    /// prices, pending orders expired, etc.) for the caller to inspect.
    pub data_quality_warnings: Vec<String>,
}
