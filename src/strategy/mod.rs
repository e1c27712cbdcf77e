use std::fmt;

use serde::{Deserialize, Serialize};

pub mod evaluator;
pub mod params;

pub use evaluator::{EntryDecision, PositionState, StrategyEvaluator};
pub use params::StrategyParams;

/// The two competing paper strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Buys a side priced at or below the undervalued threshold.
    Undervalued,
    /// Buys a side priced at or above the momentum threshold.
    Momentum,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Undervalued, StrategyKind::Momentum];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Undervalued => "undervalued",
            StrategyKind::Momentum => "momentum",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
