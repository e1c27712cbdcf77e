use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::execution::PaperOrder;
use crate::market::{Countdown, Market, MarketMetadata, PriceSnapshot};
use crate::settlement::{StrategyMetrics, Trade};
use crate::strategy::{PositionState, StrategyKind};

/// Read-only view of engine state, rebuilt and replaced wholesale after every tick.
#[derive(Clone, Debug, Serialize)]
pub struct EngineSnapshot {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub ticks: u64,
    pub current_market: Option<MarketView>,
    pub latest_price: Option<PriceSnapshot>,
    pub strategies: Vec<StrategyView>,
    pub recent_trades: Vec<Trade>,
    pub realized_pnl: f64,
    /// Markets still awaiting exit or settlement.
    pub tracked_markets: Vec<String>,
}

impl EngineSnapshot {
    pub fn idle() -> Self {
        Self {
            running: false,
            started_at: None,
            updated_at: None,
            last_error: None,
            ticks: 0,
            current_market: None,
            latest_price: None,
            strategies: Vec::new(),
            recent_trades: Vec::new(),
            realized_pnl: 0.0,
            tracked_markets: Vec::new(),
        }
    }

    pub fn strategy(&self, kind: StrategyKind) -> Option<&StrategyView> {
        self.strategies.iter().find(|s| s.strategy == kind)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MarketView {
    pub market: Market,
    pub metadata: MarketMetadata,
    pub countdown: Countdown,
}

#[derive(Clone, Debug, Serialize)]
pub struct StrategyView {
    pub strategy: StrategyKind,
    pub threshold: f64,
    /// Entry state for the current market, if it is being tracked.
    pub current_state: Option<PositionState>,
    pub open_orders: Vec<PaperOrder>,
    pub metrics: StrategyMetrics,
}
