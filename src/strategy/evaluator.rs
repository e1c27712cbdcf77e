use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::execution::{ExecutionError, ExecutionResult, OrderId, PaperOrder, PaperOrderBook};
use crate::market::{Market, PriceSnapshot};

use super::{StrategyKind, StrategyParams};

/// Per-market lifecycle of one strategy's entry attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PositionState {
    Idle,
    AwaitingFill { order_id: OrderId },
    /// Entry rule did not trigger; no order will ever be placed for this market.
    Skipped,
    Settled,
}

/// Outcome of evaluating the entry rule at the entry checkpoint.
#[derive(Clone, Debug)]
pub enum EntryDecision {
    Placed(PaperOrder),
    Skipped,
    /// The pair already left `Idle`; nothing was evaluated.
    AlreadyActed,
}

#[derive(Clone, Debug)]
struct PairInternal {
    state: PositionState,
    exit_handled: bool,
}

impl PairInternal {
    fn new() -> Self {
        Self {
            state: PositionState::Idle,
            exit_handled: false,
        }
    }
}

/// Threshold strategy with its own isolated paper order book.
#[derive(Debug)]
pub struct StrategyEvaluator {
    params: StrategyParams,
    book: PaperOrderBook,
    positions: HashMap<String, PairInternal>,
}

impl StrategyEvaluator {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            book: PaperOrderBook::new(params.kind),
            params,
            positions: HashMap::new(),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.params.kind
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn book(&self) -> &PaperOrderBook {
        &self.book
    }

    /// Start tracking `market_id` in `Idle` if it is not tracked yet.
    pub fn track(&mut self, market_id: &str) {
        self.positions
            .entry(market_id.to_string())
            .or_insert_with(PairInternal::new);
    }

    pub fn state_for(&self, market_id: &str) -> Option<PositionState> {
        self.positions.get(market_id).map(|p| p.state.clone())
    }

    pub fn awaiting_entry(&self, market_id: &str) -> bool {
        matches!(self.state_for(market_id), Some(PositionState::Idle))
    }

    /// Apply the entry rule to `snapshot`. Only acts while the pair is `Idle`.
    pub fn on_entry_checkpoint(
        &mut self,
        market: &Market,
        snapshot: &PriceSnapshot,
        now: DateTime<Utc>,
    ) -> ExecutionResult<EntryDecision> {
        let kind = self.params.kind;
        let pair = self
            .positions
            .entry(market.id.clone())
            .or_insert_with(PairInternal::new);

        if pair.state != PositionState::Idle {
            return Ok(EntryDecision::AlreadyActed);
        }

        let Some((side, price)) = self
            .params
            .select_side(snapshot.up_price, snapshot.down_price)
        else {
            pair.state = PositionState::Skipped;
            info!(
                target: "strategy",
                strategy = %kind,
                market = %market.id,
                up = snapshot.up_price,
                down = snapshot.down_price,
                threshold = self.params.threshold,
                "entry condition not met; skipping market"
            );
            return Ok(EntryDecision::Skipped);
        };

        match self
            .book
            .place(market, side, price, self.params.order_size, now)
        {
            Ok(order) => {
                pair.state = PositionState::AwaitingFill { order_id: order.id };
                Ok(EntryDecision::Placed(order))
            }
            Err(err @ ExecutionError::InvalidOrder(_)) => {
                pair.state = PositionState::Skipped;
                warn!(
                    target: "strategy",
                    strategy = %kind,
                    market = %market.id,
                    error = %err,
                    "entry rejected; skipping market"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Feed a snapshot to the book's fill simulation. Returns the orders filled.
    pub fn on_snapshot(&mut self, snapshot: &PriceSnapshot) -> Vec<OrderId> {
        self.book.on_snapshot(snapshot)
    }

    /// Cancel anything still resting on `market`. Runs at most once per market.
    pub fn on_exit_checkpoint(&mut self, market: &Market, now: DateTime<Utc>) -> Vec<OrderId> {
        let kind = self.params.kind;
        let pair = self
            .positions
            .entry(market.id.clone())
            .or_insert_with(PairInternal::new);

        if pair.exit_handled {
            return Vec::new();
        }
        pair.exit_handled = true;

        if pair.state == PositionState::Idle {
            pair.state = PositionState::Skipped;
            info!(
                target: "strategy",
                strategy = %kind,
                market = %market.id,
                "exit checkpoint reached without entry; skipping market"
            );
        }

        let live: Vec<OrderId> = self
            .book
            .orders_for_market(&market.id)
            .filter(|o| !o.status.is_terminal())
            .map(|o| o.id)
            .collect();

        live.into_iter()
            .filter(|id| matches!(self.book.cancel(*id, now), Ok(true)))
            .collect()
    }

    pub fn mark_settled(&mut self, market_id: &str) {
        if let Some(pair) = self.positions.get_mut(market_id) {
            pair.state = PositionState::Settled;
        }
    }

    /// Forget a settled market and its retained orders.
    pub fn release(&mut self, market_id: &str) {
        self.positions.remove(market_id);
        self.book.release_market(market_id);
    }
}
