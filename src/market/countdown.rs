use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Market;
use crate::types::StrategyConfig;
use crate::utils::time::{seconds_until, WINDOW_SECONDS};

/// Scheduled points in a market's life at which the engine acts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Checkpoint {
    /// Strategies evaluate entry.
    Entry,
    /// Unfilled orders are cancelled.
    Exit,
    /// Market becomes active.
    Start,
    Resolution,
}

/// Checkpoint offsets, expressed as seconds remaining until the market starts.
#[derive(Clone, Copy, Debug)]
pub struct Schedule {
    pub entry_countdown_seconds: i64,
    pub exit_countdown_seconds: i64,
}

impl From<&StrategyConfig> for Schedule {
    fn from(cfg: &StrategyConfig) -> Self {
        Self {
            entry_countdown_seconds: cfg.entry_countdown_seconds,
            exit_countdown_seconds: cfg.exit_countdown_seconds,
        }
    }
}

impl Schedule {
    pub fn checkpoint_time(&self, checkpoint: Checkpoint, market: &Market) -> DateTime<Utc> {
        let offset = match checkpoint {
            Checkpoint::Entry => -self.entry_countdown_seconds,
            Checkpoint::Exit => -self.exit_countdown_seconds,
            Checkpoint::Start => 0,
            Checkpoint::Resolution => WINDOW_SECONDS,
        };
        market.start_time + Duration::seconds(offset)
    }

    pub fn has_passed(&self, checkpoint: Checkpoint, market: &Market, now: DateTime<Utc>) -> bool {
        now >= self.checkpoint_time(checkpoint, market)
    }

    /// Offset to add to `now` so that the window containing the shifted time
    /// is the one whose entry checkpoint most recently passed.
    pub fn entry_lead(&self) -> Duration {
        Duration::seconds(self.entry_countdown_seconds)
    }
}

/// Seconds from `now` until `checkpoint` of `market`, clamped at zero.
pub fn seconds_to(
    schedule: &Schedule,
    checkpoint: Checkpoint,
    market: &Market,
    now: DateTime<Utc>,
) -> i64 {
    seconds_until(schedule.checkpoint_time(checkpoint, market), now)
}

/// All countdowns for a market at a point in time, for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub to_entry: i64,
    pub to_exit: i64,
    pub to_start: i64,
    pub to_resolution: i64,
}

impl Countdown {
    pub fn at(schedule: &Schedule, market: &Market, now: DateTime<Utc>) -> Self {
        Self {
            to_entry: seconds_to(schedule, Checkpoint::Entry, market, now),
            to_exit: seconds_to(schedule, Checkpoint::Exit, market, now),
            to_start: seconds_to(schedule, Checkpoint::Start, market, now),
            to_resolution: seconds_to(schedule, Checkpoint::Resolution, market, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::current_market;
    use crate::market::resolver::tests::ts;

    fn schedule() -> Schedule {
        Schedule::from(&StrategyConfig::default())
    }

    #[test]
    fn checkpoints_count_back_from_start() {
        let m = current_market(ts("2024-01-01T12:15:00Z"));
        let s = schedule();
        // 20 minutes and 15m30s before the 12:15 start.
        assert_eq!(
            s.checkpoint_time(Checkpoint::Entry, &m),
            ts("2024-01-01T11:55:00Z")
        );
        assert_eq!(
            s.checkpoint_time(Checkpoint::Exit, &m),
            ts("2024-01-01T11:59:30Z")
        );
        assert_eq!(
            s.checkpoint_time(Checkpoint::Start, &m),
            ts("2024-01-01T12:15:00Z")
        );
        assert_eq!(
            s.checkpoint_time(Checkpoint::Resolution, &m),
            ts("2024-01-01T12:30:00Z")
        );
    }

    #[test]
    fn seconds_to_clamps_and_is_stable() {
        let m = current_market(ts("2024-01-01T12:15:00Z"));
        let s = schedule();
        let now = ts("2024-01-01T11:54:00Z");
        assert_eq!(seconds_to(&s, Checkpoint::Entry, &m, now), 60);
        assert_eq!(seconds_to(&s, Checkpoint::Entry, &m, now), 60);
        assert_eq!(seconds_to(&s, Checkpoint::Start, &m, now), 1260);
        let later = ts("2024-01-01T12:31:00Z");
        assert_eq!(seconds_to(&s, Checkpoint::Resolution, &m, later), 0);
    }

    #[test]
    fn entry_lead_selects_market_whose_entry_just_passed() {
        let s = schedule();
        let entry = ts("2024-01-01T11:55:00Z");
        let target = current_market(entry + s.entry_lead());
        assert_eq!(target.start_time, ts("2024-01-01T12:15:00Z"));
        assert!(s.has_passed(Checkpoint::Entry, &target, entry));
        assert!(!s.has_passed(Checkpoint::Exit, &target, entry));

        let just_before = entry - Duration::seconds(1);
        let previous = current_market(just_before + s.entry_lead());
        assert_eq!(previous.start_time, ts("2024-01-01T12:00:00Z"));
    }

    #[test]
    fn countdown_bundle() {
        let m = current_market(ts("2024-01-01T12:15:00Z"));
        let c = Countdown::at(&schedule(), &m, ts("2024-01-01T11:59:00Z"));
        assert_eq!(c.to_entry, 0);
        assert_eq!(c.to_exit, 30);
        assert_eq!(c.to_start, 960);
        assert_eq!(c.to_resolution, 1860);
    }
}
