//! Maps wall-clock time onto the fixed 15-minute market grid.
//!
//! Market identifiers follow the venue's dynamic slug scheme:
//! `btc-updown-15m-{window_start_unix}`.

use chrono::{DateTime, Duration, Utc};

use super::Market;
use crate::utils::time::{from_epoch, window_start_epoch, WINDOW_SECONDS};

const SLUG_PREFIX: &str = "btc-updown-15m-";

/// Build the market identifier for a window starting at `window_start` (Unix seconds).
pub fn slug_for(window_start: i64) -> String {
    format!("{SLUG_PREFIX}{window_start}")
}

/// Recover the window start epoch from a market identifier.
pub fn parse_window_start(slug: &str) -> Option<i64> {
    slug.strip_prefix(SLUG_PREFIX)?.parse().ok()
}

fn market_for_window(window_start: i64) -> Market {
    let start = from_epoch(window_start);
    Market::new(
        slug_for(window_start),
        start,
        start + Duration::seconds(WINDOW_SECONDS),
    )
}

/// The market whose window contains `now`.
pub fn current_market(now: DateTime<Utc>) -> Market {
    market_for_window(window_start_epoch(now.timestamp()))
}

/// The market `offset` windows away from the one containing `now`.
pub fn market_at(now: DateTime<Utc>, offset: i64) -> Market {
    market_for_window(window_start_epoch(now.timestamp()) + offset * WINDOW_SECONDS)
}

/// Markets from `back` windows before the current one to `forward` windows after it.
pub fn upcoming_markets(now: DateTime<Utc>, back: i64, forward: i64) -> Vec<Market> {
    (-back..=forward).map(|k| market_at(now, k)).collect()
}
