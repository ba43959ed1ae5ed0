//! ExecutionEngine — the per-day tick loop wiring PriceIndex, TradabilityMap,
//! PendingOrderQueue, StopLossMonitor, EquityCurveController, RiskBudgetScaler,
//! Scheduler, and SignalPipeline into one deterministic run.

pub mod config;
pub mod result;
pub mod state;
pub mod tick;

pub use config::EngineConfig;
pub use result::RunResult;
pub use state::EngineState;
pub use tick::Engine;
