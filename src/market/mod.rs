use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod countdown;
pub mod resolver;

pub use countdown::{seconds_to, Checkpoint, Countdown, Schedule};
pub use resolver::{current_market, market_at, parse_window_start, upcoming_markets};

/// Binary outcome of an up/down market.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Up,
    Down,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Up => "Up",
            Outcome::Down => "Down",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single 15-minute market window.
///
/// Everything but `outcome` is fixed at creation; `outcome` moves from `None`
/// to a terminal value exactly once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub resolution_time: DateTime<Utc>,
    outcome: Option<Outcome>,
}

impl Market {
    pub fn new(id: String, start_time: DateTime<Utc>, resolution_time: DateTime<Utc>) -> Self {
        Self {
            id,
            start_time,
            resolution_time,
            outcome: None,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    /// Record the final outcome. Returns false (and leaves the market untouched)
    /// if an outcome was already recorded.
    pub fn resolve(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }
}

/// Venue-side identifiers for a market, as returned by the data source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMetadata {
    pub slug: String,
    pub condition_id: String,
    pub up_token_id: String,
    pub down_token_id: String,
}

/// Latest observed Up/Down prices for a market (0-1 each; they need not sum to 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub market_id: String,
    pub up_price: f64,
    pub down_price: f64,
    pub ts: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn price(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Up => self.up_price,
            Outcome::Down => self.down_price,
        }
    }

    /// True if the snapshot was observed more than `max_age` before `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.ts > max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_transitions_once() {
        let mut m = current_market(resolver::tests::ts("2024-01-01T12:00:00Z"));
        assert!(!m.is_resolved());
        assert!(m.resolve(Outcome::Up));
        assert!(!m.resolve(Outcome::Down));
        assert_eq!(m.outcome(), Some(Outcome::Up));
    }

    #[test]
    fn staleness_is_relative_to_now() {
        let now = resolver::tests::ts("2024-01-01T12:00:10Z");
        let snap = PriceSnapshot {
            market_id: "m".to_string(),
            up_price: 0.5,
            down_price: 0.5,
            ts: now - chrono::Duration::seconds(3),
        };
        assert!(snap.is_stale(now, chrono::Duration::seconds(2)));
        assert!(!snap.is_stale(now, chrono::Duration::seconds(5)));
    }
}
