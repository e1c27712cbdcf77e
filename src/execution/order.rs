use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::Outcome;
use crate::strategy::StrategyKind;

/// Identifier used for tracking paper orders locally.
pub type OrderId = Uuid;

/// Lifecycle state of a paper order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

/// Simulated buy limit order on one side of a binary market.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaperOrder {
    pub id: OrderId,
    pub strategy: StrategyKind,
    pub market_id: String,
    pub outcome: Outcome,
    /// Limit price (0-1).
    pub price: f64,
    /// Requested size in shares.
    pub size: f64,
    pub filled_size: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaperOrder {
    pub fn new(
        strategy: StrategyKind,
        market_id: String,
        outcome: Outcome,
        price: f64,
        size: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new_v4(),
            strategy,
            market_id,
            outcome,
            price,
            size,
            filled_size: 0.0,
            status: OrderStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `qty` shares to the filled amount, capped at the requested size.
    /// No-op on terminal orders.
    pub fn fill(&mut self, qty: f64, ts: DateTime<Utc>) {
        if self.status.is_terminal() || qty <= 0.0 {
            return;
        }
        self.filled_size = (self.filled_size + qty).min(self.size);
        self.status = if self.filled_size >= self.size {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = ts;
    }

    /// Returns true if the order moved to `Cancelled`.
    pub fn cancel(&mut self, ts: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = ts;
        true
    }

    /// Capital tied up by the filled portion.
    pub fn committed(&self) -> f64 {
        self.filled_size * self.price
    }
}
