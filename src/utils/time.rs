use chrono::{DateTime, TimeZone, Utc};

/// Length of a Polymarket short-term window in seconds.
pub const WINDOW_SECONDS: i64 = 900;

/// Unix timestamp of the start of the 15-minute window containing `epoch`.
///
/// Boundaries are inclusive on the left: an exact multiple of 900 starts a new window.
pub fn window_start_epoch(epoch: i64) -> i64 {
    epoch.div_euclid(WINDOW_SECONDS) * WINDOW_SECONDS
}

/// Whole seconds from `now` until `target`, never negative.
pub fn seconds_until(target: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (target - now).num_seconds().max(0)
}

pub fn from_epoch(epoch: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
