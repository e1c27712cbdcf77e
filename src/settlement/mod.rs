pub mod metrics;
pub mod trade;

pub use metrics::StrategyMetrics;
pub use trade::{Trade, TradeLedger, TradeResult};
