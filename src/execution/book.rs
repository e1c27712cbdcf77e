use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::market::{Market, Outcome, PriceSnapshot};
use crate::monitoring::metrics::METRICS;
use crate::strategy::StrategyKind;
use crate::utils::math::is_valid_price;

use super::order::{OrderId, OrderStatus, PaperOrder};
use super::{ExecutionError, ExecutionResult};

/// Local paper order book for a single strategy.
///
/// Fill policy: a resting buy at `P` on outcome `O` fills in full the first time
/// an observed price of `O` is at or below `P`. There is no depth model, so there
/// are no partial fills from simulation.
#[derive(Debug)]
pub struct PaperOrderBook {
    strategy: StrategyKind,
    orders: BTreeMap<OrderId, PaperOrder>,
}

impl PaperOrderBook {
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            orders: BTreeMap::new(),
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Place a paper buy order. At most one live or filled order per market.
    pub fn place(
        &mut self,
        market: &Market,
        outcome: Outcome,
        price: f64,
        size: f64,
        now: DateTime<Utc>,
    ) -> ExecutionResult<PaperOrder> {
        if !is_valid_price(price) {
            return Err(ExecutionError::InvalidOrder(format!(
                "price {price} outside (0, 1)"
            )));
        }
        if !size.is_finite() || size <= 0.0 {
            return Err(ExecutionError::InvalidOrder(format!(
                "size {size} must be positive"
            )));
        }
        if self
            .orders_for_market(&market.id)
            .any(|o| o.status != OrderStatus::Cancelled)
        {
            return Err(ExecutionError::DuplicatePosition {
                strategy: self.strategy,
                market_id: market.id.clone(),
            });
        }

        let order = PaperOrder::new(self.strategy, market.id.clone(), outcome, price, size, now);
        info!(
            target: "execution",
            strategy = %self.strategy,
            market = %market.id,
            order_id = %order.id,
            side = %outcome,
            price,
            size,
            "paper order placed"
        );
        METRICS.record_order_placed(&market.id, self.strategy.as_str());
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    /// Evaluate one snapshot against one order. Returns true if this call filled it.
    pub fn simulate_fill(&mut self, id: OrderId, snapshot: &PriceSnapshot) -> ExecutionResult<bool> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| ExecutionError::OrderNotFound(id.to_string()))?;

        if order.status.is_terminal() || order.market_id != snapshot.market_id {
            return Ok(false);
        }

        let observed = snapshot.price(order.outcome);
        if observed > order.price {
            debug!(
                target: "execution",
                order_id = %id,
                observed,
                limit = order.price,
                "limit not crossed"
            );
            return Ok(false);
        }

        let remaining = order.size - order.filled_size;
        order.fill(remaining, snapshot.ts);
        info!(
            target: "execution",
            strategy = %order.strategy,
            market = %order.market_id,
            order_id = %id,
            side = %order.outcome,
            observed,
            price = order.price,
            filled = order.filled_size,
            "paper order filled"
        );
        METRICS.record_order_filled(&order.market_id, order.strategy.as_str());
        Ok(true)
    }

    /// Run every open order on `snapshot.market_id` through the fill policy.
    pub fn on_snapshot(&mut self, snapshot: &PriceSnapshot) -> Vec<OrderId> {
        let candidates: Vec<OrderId> = self
            .orders_for_market(&snapshot.market_id)
            .filter(|o| !o.status.is_terminal())
            .map(|o| o.id)
            .collect();

        candidates
            .into_iter()
            .filter(|id| matches!(self.simulate_fill(*id, snapshot), Ok(true)))
            .collect()
    }

    /// Cancel a non-terminal order. Returns false for terminal orders.
    pub fn cancel(&mut self, id: OrderId, now: DateTime<Utc>) -> ExecutionResult<bool> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| ExecutionError::OrderNotFound(id.to_string()))?;

        let cancelled = order.cancel(now);
        if cancelled {
            info!(
                target: "execution",
                strategy = %order.strategy,
                market = %order.market_id,
                order_id = %id,
                filled = order.filled_size,
                "paper order cancelled"
            );
            METRICS.record_order_cancelled(&order.market_id, order.strategy.as_str());
        }
        Ok(cancelled)
    }

    pub fn order(&self, id: &OrderId) -> Option<&PaperOrder> {
        self.orders.get(id)
    }

    pub fn orders_for_market<'a>(
        &'a self,
        market_id: &'a str,
    ) -> impl Iterator<Item = &'a PaperOrder> + 'a {
        self.orders.values().filter(move |o| o.market_id == market_id)
    }

    pub fn open_orders(&self) -> Vec<PaperOrder> {
        self.orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect()
    }

    pub fn has_open_orders(&self, market_id: &str) -> bool {
        self.orders_for_market(market_id)
            .any(|o| !o.status.is_terminal())
    }

    pub fn has_filled_orders(&self, market_id: &str) -> bool {
        self.orders_for_market(market_id).any(|o| o.filled_size > 0.0)
    }

    /// Drop retained orders for a settled market.
    pub fn release_market(&mut self, market_id: &str) {
        self.orders.retain(|_, o| o.market_id != market_id);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
