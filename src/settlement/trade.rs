use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::execution::{OrderId, PaperOrder};
use crate::market::{Market, Outcome};
use crate::monitoring::metrics::METRICS;
use crate::strategy::StrategyKind;
use crate::utils::math::settlement_pnl;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResult {
    Win,
    Loss,
    Breakeven,
}

impl TradeResult {
    fn from_pnl(pnl: f64) -> Self {
        if pnl > 0.0 {
            TradeResult::Win
        } else if pnl < 0.0 {
            TradeResult::Loss
        } else {
            TradeResult::Breakeven
        }
    }
}

/// Closed paper trade derived from one filled order at market resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trade {
    pub order_id: OrderId,
    pub strategy: StrategyKind,
    pub market_id: String,
    pub outcome: Outcome,
    pub entry_price: f64,
    pub filled_size: f64,
    pub result: TradeResult,
    pub pnl: f64,
    pub entry_time: DateTime<Utc>,
    pub resolution_time: DateTime<Utc>,
}

impl Trade {
    fn settle(order: &PaperOrder, winner: Outcome, resolved_at: DateTime<Utc>) -> Self {
        let pnl = settlement_pnl(order.price, order.filled_size, order.outcome == winner);
        Self {
            order_id: order.id,
            strategy: order.strategy,
            market_id: order.market_id.clone(),
            outcome: order.outcome,
            entry_price: order.price,
            filled_size: order.filled_size,
            result: TradeResult::from_pnl(pnl),
            pnl,
            entry_time: order.updated_at,
            resolution_time: resolved_at,
        }
    }

    /// Capital committed to the position.
    pub fn committed(&self) -> f64 {
        self.filled_size * self.entry_price
    }
}

/// Append-only record of closed trades, keyed by source order for idempotence.
#[derive(Debug, Default)]
pub struct TradeLedger {
    trades: Vec<Trade>,
    settled_orders: HashSet<OrderId>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle every filled order on a resolved market. Orders that already
    /// produced a trade, unfilled orders and orders for other markets are
    /// ignored. Returns the trades created by this call.
    pub fn settle_market<'a>(
        &mut self,
        market: &Market,
        orders: impl IntoIterator<Item = &'a PaperOrder>,
        resolved_at: DateTime<Utc>,
    ) -> Vec<Trade> {
        let Some(winner) = market.outcome() else {
            return Vec::new();
        };

        let mut created = Vec::new();
        for order in orders {
            if order.market_id != market.id
                || order.filled_size <= 0.0
                || self.settled_orders.contains(&order.id)
            {
                continue;
            }

            let trade = Trade::settle(order, winner, resolved_at);
            info!(
                target: "settlement",
                strategy = %trade.strategy,
                market = %trade.market_id,
                order_id = %trade.order_id,
                side = %trade.outcome,
                winner = %winner,
                result = ?trade.result,
                pnl = trade.pnl,
                "trade resolved"
            );
            METRICS.record_trade_settled(&trade.market_id, trade.strategy.as_str());

            self.settled_orders.insert(order.id);
            self.trades.push(trade.clone());
            created.push(trade);
        }
        created
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn trades_for(&self, strategy: StrategyKind) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(move |t| t.strategy == strategy)
    }

    /// Most recent `limit` trades, oldest first.
    pub fn recent(&self, limit: usize) -> &[Trade] {
        let start = self.trades.len().saturating_sub(limit);
        &self.trades[start..]
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn market_pnl(&self, market_id: &str) -> f64 {
        self.trades
            .iter()
            .filter(|t| t.market_id == market_id)
            .map(|t| t.pnl)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::current_market;

    fn resolved_market(winner: Outcome) -> Market {
        let mut m = current_market(
            DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        m.resolve(winner);
        m
    }

    fn filled(m: &Market, strategy: StrategyKind, side: Outcome, price: f64, filled: f64) -> PaperOrder {
        let mut o = PaperOrder::new(strategy, m.id.clone(), side, price, 10.0, m.start_time);
        o.fill(filled, m.start_time);
        o
    }

    #[test]
    fn settles_wins_and_losses() {
        let m = resolved_market(Outcome::Up);
        let orders = vec![
            filled(&m, StrategyKind::Undervalued, Outcome::Up, 0.47, 10.0),
            filled(&m, StrategyKind::Momentum, Outcome::Down, 0.52, 10.0),
        ];
        let mut ledger = TradeLedger::new();
        let trades = ledger.settle_market(&m, &orders, m.resolution_time);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].result, TradeResult::Win);
        assert!((trades[0].pnl - 5.3).abs() < 1e-9);
        assert_eq!(trades[1].result, TradeResult::Loss);
        assert!((trades[1].pnl + 5.2).abs() < 1e-9);
        assert!((ledger.market_pnl(&m.id) - 0.1).abs() < 1e-9);
        assert!((ledger.realized_pnl() - ledger.market_pnl(&m.id)).abs() < 1e-12);
    }

    #[test]
    fn partial_fill_settles_filled_portion() {
        let m = resolved_market(Outcome::Down);
        let orders = vec![filled(&m, StrategyKind::Momentum, Outcome::Down, 0.6, 4.0)];
        let mut ledger = TradeLedger::new();
        let trades = ledger.settle_market(&m, &orders, m.resolution_time);
        assert!((trades[0].pnl - 1.6).abs() < 1e-9);
        assert!((trades[0].committed() - 2.4).abs() < 1e-9);
    }

    #[test]
    fn unfilled_orders_produce_no_trade() {
        let m = resolved_market(Outcome::Up);
        let orders = vec![PaperOrder::new(
            StrategyKind::Undervalued,
            m.id.clone(),
            Outcome::Up,
            0.47,
            10.0,
            m.start_time,
        )];
        let mut ledger = TradeLedger::new();
        assert!(ledger.settle_market(&m, &orders, m.resolution_time).is_empty());
    }

    #[test]
    fn resettling_is_a_noop() {
        let m = resolved_market(Outcome::Up);
        let orders = vec![filled(&m, StrategyKind::Undervalued, Outcome::Up, 0.47, 10.0)];
        let mut ledger = TradeLedger::new();
        assert_eq!(ledger.settle_market(&m, &orders, m.resolution_time).len(), 1);
        assert!(ledger.settle_market(&m, &orders, m.resolution_time).is_empty());
        assert_eq!(ledger.trades().len(), 1);
    }

    #[test]
    fn unresolved_market_settles_nothing() {
        let m = current_market(
            DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let orders = vec![filled(&m, StrategyKind::Undervalued, Outcome::Up, 0.47, 10.0)];
        let mut ledger = TradeLedger::new();
        assert!(ledger.settle_market(&m, &orders, m.resolution_time).is_empty());
    }

    #[test]
    fn price_of_one_half_wins() {
        let m = resolved_market(Outcome::Up);
        let orders = vec![filled(&m, StrategyKind::Undervalued, Outcome::Up, 0.5, 10.0)];
        let mut ledger = TradeLedger::new();
        let trades = ledger.settle_market(&m, &orders, m.resolution_time);
        assert_eq!(trades[0].result, TradeResult::Win);
        assert_eq!(ledger.recent(5).len(), 1);
    }
}
