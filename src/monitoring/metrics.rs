use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info};

/// Global counters shared by the engine and its components.
pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::default);

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[derive(Default)]
struct MetricsInner {
    ticks: AtomicU64,
    snapshots_observed: AtomicU64,
    orders_placed: AtomicU64,
    orders_filled: AtomicU64,
    orders_cancelled: AtomicU64,
    trades_settled: AtomicU64,
    source_errors: AtomicU64,
    last_event_ts: AtomicU64,
}

/// Lightweight metrics handle backed by atomics so it can be cloned cheaply.
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl Metrics {
    fn touch(&self) {
        self.inner
            .last_event_ts
            .store(now_unix_secs(), Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.inner.ticks.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_snapshot(&self, market_id: &str) {
        let total = self.inner.snapshots_observed.fetch_add(1, Ordering::Relaxed) + 1;
        self.touch();
        debug!(
            target: "metrics",
            event = "snapshot",
            market = %market_id,
            total_snapshots = total,
            "price snapshot observed"
        );
    }

    pub fn record_order_placed(&self, market_id: &str, strategy: &str) {
        let total = self.inner.orders_placed.fetch_add(1, Ordering::Relaxed) + 1;
        self.touch();
        info!(
            target: "metrics",
            event = "order_placed",
            market = %market_id,
            strategy = %strategy,
            total_orders = total,
            "order placed"
        );
    }

    pub fn record_order_filled(&self, market_id: &str, strategy: &str) {
        let total = self.inner.orders_filled.fetch_add(1, Ordering::Relaxed) + 1;
        self.touch();
        info!(
            target: "metrics",
            event = "order_filled",
            market = %market_id,
            strategy = %strategy,
            total_fills = total,
            "order filled"
        );
    }

    pub fn record_order_cancelled(&self, market_id: &str, strategy: &str) {
        let total = self.inner.orders_cancelled.fetch_add(1, Ordering::Relaxed) + 1;
        self.touch();
        info!(
            target: "metrics",
            event = "order_cancelled",
            market = %market_id,
            strategy = %strategy,
            total_cancels = total,
            "order cancelled"
        );
    }

    pub fn record_trade_settled(&self, market_id: &str, strategy: &str) {
        let total = self.inner.trades_settled.fetch_add(1, Ordering::Relaxed) + 1;
        self.touch();
        info!(
            target: "metrics",
            event = "trade_settled",
            market = %market_id,
            strategy = %strategy,
            total_trades = total,
            "trade settled"
        );
    }

    pub fn record_source_error(&self, operation: &str, reason: &str) {
        let total = self.inner.source_errors.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            target: "metrics",
            event = "source_error",
            operation = %operation,
            reason = %reason,
            total_failures = total,
            "source call failed"
        );
    }

    pub fn is_healthy(&self, max_staleness: Duration) -> bool {
        let last = self.inner.last_event_ts.load(Ordering::Relaxed);
        if last == 0 {
            // If we have never seen an event, treat as healthy immediately after startup.
            return true;
        }
        let now = now_unix_secs();
        now.saturating_sub(last) <= max_staleness.as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            ticks: load(&self.inner.ticks),
            snapshots_observed: load(&self.inner.snapshots_observed),
            orders_placed: load(&self.inner.orders_placed),
            orders_filled: load(&self.inner.orders_filled),
            orders_cancelled: load(&self.inner.orders_cancelled),
            trades_settled: load(&self.inner.trades_settled),
            source_errors: load(&self.inner.source_errors),
            last_event_ts: load(&self.inner.last_event_ts),
        }
    }
}

/// Serializable view of current metrics used by the dashboard log and health checks.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub snapshots_observed: u64,
    pub orders_placed: u64,
    pub orders_filled: u64,
    pub orders_cancelled: u64,
    pub trades_settled: u64,
    pub source_errors: u64,
    pub last_event_ts: u64,
}

pub fn log_metrics_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        target: "metrics",
        event = "metrics_snapshot",
        ticks = snapshot.ticks,
        snapshots_observed = snapshot.snapshots_observed,
        orders_placed = snapshot.orders_placed,
        orders_filled = snapshot.orders_filled,
        orders_cancelled = snapshot.orders_cancelled,
        trades_settled = snapshot.trades_settled,
        source_errors = snapshot.source_errors,
        last_event_ts = snapshot.last_event_ts,
        "metrics snapshot"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::default();
        m.record_tick();
        m.record_order_placed("m", "undervalued");
        m.record_order_filled("m", "undervalued");
        m.record_source_error("price_snapshot", "timeout");
        let s = m.snapshot();
        assert_eq!(s.ticks, 1);
        assert_eq!(s.orders_placed, 1);
        assert_eq!(s.orders_filled, 1);
        assert_eq!(s.source_errors, 1);
        assert!(s.last_event_ts > 0);
        assert!(m.is_healthy(Duration::from_secs(60)));
    }

    #[test]
    fn fresh_metrics_are_healthy() {
        assert!(Metrics::default().is_healthy(Duration::from_secs(0)));
    }
}
