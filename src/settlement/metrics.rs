use serde::{Deserialize, Serialize};

use crate::strategy::StrategyKind;
use crate::utils::math::percentage;

use super::trade::{Trade, TradeResult};

/// Aggregate performance of one strategy, recomputed from its closed trades.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub strategy: StrategyKind,
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    pub total_pnl: f64,
    /// Sum of `filled_size * entry_price` across trades.
    pub capital_committed: f64,
    /// Percentage of trades that won; 0 with no trades.
    pub win_rate: f64,
    /// `total_pnl / capital_committed` as a percentage; 0 with nothing committed.
    pub roi: f64,
}

impl StrategyMetrics {
    pub fn from_trades<'a>(
        strategy: StrategyKind,
        trades: impl IntoIterator<Item = &'a Trade>,
    ) -> Self {
        let mut m = Self {
            strategy,
            total_trades: 0,
            wins: 0,
            losses: 0,
            breakevens: 0,
            total_pnl: 0.0,
            capital_committed: 0.0,
            win_rate: 0.0,
            roi: 0.0,
        };

        for trade in trades.into_iter().filter(|t| t.strategy == strategy) {
            m.total_trades += 1;
            m.total_pnl += trade.pnl;
            m.capital_committed += trade.committed();
            match trade.result {
                TradeResult::Win => m.wins += 1,
                TradeResult::Loss => m.losses += 1,
                TradeResult::Breakeven => m.breakevens += 1,
            }
        }

        m.win_rate = percentage(m.wins as f64, m.total_trades as f64);
        m.roi = percentage(m.total_pnl, m.capital_committed);
        m
    }
}
