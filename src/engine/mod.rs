//! Polling loop that drives market discovery, paper entries, fills, exits and
//! settlement for both strategies.
//!
//! Each tick awaits all source calls it needs and commits every state change
//! before returning; ticks never overlap. State is published to readers as a
//! fresh [`EngineSnapshot`] through a `watch` channel after every tick.

mod snapshot;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::client::{ClientError, MarketDataSource};
use crate::execution::ExecutionError;
use crate::market::{current_market, Checkpoint, Countdown, Market, MarketMetadata, PriceSnapshot, Schedule};
use crate::monitoring::metrics::METRICS;
use crate::settlement::{StrategyMetrics, TradeLedger};
use crate::strategy::{EntryDecision, StrategyEvaluator, StrategyKind, StrategyParams};
use crate::types::{AppConfig, EngineConfig};

pub use snapshot::{EngineSnapshot, MarketView, StrategyView};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("stale price snapshot for {market_id} ({age_secs}s old)")]
    StaleSnapshot { market_id: String, age_secs: i64 },

    #[error("resolution not yet available for {market_id}")]
    ResolutionUnavailable { market_id: String },

    #[error("source error: {0}")]
    Source(#[from] ClientError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("market data source unavailable after {failures} consecutive failed ticks: {last_error}")]
    SourceUnavailable { failures: u32, last_error: String },

    #[error("engine halted")]
    Halted,
}

impl EngineError {
    /// Fatal errors stop the loop; everything else is retried on later ticks.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::SourceUnavailable { .. } | EngineError::Halted
        )
    }
}

#[derive(Clone, Debug)]
struct TrackedMarket {
    market: Market,
    metadata: MarketMetadata,
    last_resolution_check: Option<DateTime<Utc>>,
    done: bool,
}

/// Cloneable handle for reading engine state and requesting shutdown.
#[derive(Clone)]
pub struct EngineHandle {
    snapshot_rx: watch::Receiver<EngineSnapshot>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl EngineHandle {
    /// Latest committed engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Ask the loop to stop after the tick in progress, if any, commits.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

pub struct Engine {
    engine_cfg: EngineConfig,
    schedule: Schedule,
    source: Arc<dyn MarketDataSource>,
    strategies: Vec<StrategyEvaluator>,
    ledger: TradeLedger,
    cursor: Option<(Market, MarketMetadata)>,
    tracked: Vec<TrackedMarket>,
    latest_price: Option<PriceSnapshot>,
    started_at: Option<DateTime<Utc>>,
    ticks: u64,
    tick_failures: u32,
    consecutive_failures: u32,
    last_error: Option<String>,
    running: bool,
    halted: bool,
    snapshot_tx: watch::Sender<EngineSnapshot>,
    shutdown_rx: watch::Receiver<bool>,
    handle: EngineHandle,
}

impl Engine {
    pub fn new(cfg: &AppConfig, source: Arc<dyn MarketDataSource>) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(EngineSnapshot::idle());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let strategies = StrategyKind::ALL
            .iter()
            .map(|kind| StrategyEvaluator::new(StrategyParams::from_config(*kind, &cfg.strategy)))
            .collect();

        Self {
            engine_cfg: cfg.engine.clone(),
            schedule: Schedule::from(&cfg.strategy),
            source,
            strategies,
            ledger: TradeLedger::new(),
            cursor: None,
            tracked: Vec::new(),
            latest_price: None,
            started_at: None,
            ticks: 0,
            tick_failures: 0,
            consecutive_failures: 0,
            last_error: None,
            running: false,
            halted: false,
            snapshot_tx,
            shutdown_rx,
            handle: EngineHandle {
                snapshot_rx,
                shutdown_tx: Arc::new(shutdown_tx),
            },
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn strategy(&self, kind: StrategyKind) -> Option<&StrategyEvaluator> {
        self.strategies.iter().find(|s| s.kind() == kind)
    }

    pub fn current_market(&self) -> Option<&Market> {
        self.cursor.as_ref().map(|(m, _)| m)
    }

    pub fn tracked_markets(&self) -> impl Iterator<Item = &Market> {
        self.tracked.iter().map(|t| &t.market)
    }

    /// Run ticks on the configured interval until stopped or a fatal error.
    pub async fn run(mut self) -> Result<(), EngineError> {
        let mut shutdown = self.shutdown_rx.clone();
        let mut ticker = interval(self.engine_cfg.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            target: "engine",
            poll_interval_secs = self.engine_cfg.poll_interval_secs,
            "engine loop starting"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick(Utc::now()).await {
                        error!(target: "engine", error = %err, "engine halted");
                        return Err(err);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.running = false;
        self.publish(Utc::now());
        info!(target: "engine", ticks = self.ticks, "engine loop stopped");
        Ok(())
    }

    /// Execute one tick at `now`. Only fatal errors are returned; everything
    /// else is logged and retried on a later tick.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.halted {
            return Err(EngineError::Halted);
        }
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.running = true;
        self.ticks += 1;
        self.tick_failures = 0;
        METRICS.record_tick();

        if let Err(err) = self.advance_cursor(now).await {
            self.report(err);
        }

        for idx in 0..self.tracked.len() {
            if let Err(err) = self.process_prices(idx, now).await {
                self.report(err);
            }
            self.process_exit(idx, now);
            if let Err(err) = self.process_resolution(idx, now).await {
                self.report(err);
            }
        }

        self.release_done();

        let result = if self.tick_failures > 0 {
            self.consecutive_failures += 1;
            if self.consecutive_failures >= self.engine_cfg.max_consecutive_failures {
                let err = EngineError::SourceUnavailable {
                    failures: self.consecutive_failures,
                    last_error: self.last_error.clone().unwrap_or_default(),
                };
                self.halted = true;
                self.running = false;
                self.last_error = Some(err.to_string());
                Err(err)
            } else {
                Ok(())
            }
        } else {
            if self.consecutive_failures > 0 {
                info!(
                    target: "engine",
                    failures = self.consecutive_failures,
                    "market data source recovered"
                );
            }
            self.consecutive_failures = 0;
            self.last_error = None;
            Ok(())
        };

        self.publish(now);
        result
    }

    fn report(&mut self, err: EngineError) {
        match &err {
            EngineError::Source(client_err) => {
                self.tick_failures += 1;
                self.last_error = Some(err.to_string());
                METRICS.record_source_error("tick", &client_err.to_string());
                warn!(target: "engine", error = %err, "market data source call failed");
            }
            EngineError::StaleSnapshot { .. } => {
                warn!(target: "engine", error = %err, "skipping decisions this tick");
            }
            EngineError::ResolutionUnavailable { .. } => {
                debug!(target: "engine", error = %err, "will retry resolution");
            }
            EngineError::Execution(ExecutionError::DuplicatePosition { .. }) => {
                debug!(target: "engine", error = %err, "duplicate entry ignored");
            }
            EngineError::Execution(_) => {
                warn!(target: "engine", error = %err, "paper order rejected");
            }
            EngineError::SourceUnavailable { .. } | EngineError::Halted => {
                error!(target: "engine", error = %err, "fatal engine error");
            }
        }
    }

    /// Start tracking the market whose entry checkpoint most recently passed.
    async fn advance_cursor(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        let target = current_market(now + self.schedule.entry_lead());
        if let Some((cursor, _)) = &self.cursor {
            if cursor.start_time >= target.start_time {
                return Ok(());
            }
        }

        let Some(metadata) = self.source.current_market(&target).await? else {
            debug!(target: "engine", market = %target.id, "market not listed yet");
            return Ok(());
        };

        info!(
            target: "engine",
            market = %target.id,
            condition_id = %metadata.condition_id,
            start = %target.start_time,
            countdown_to_start = Countdown::at(&self.schedule, &target, now).to_start,
            "tracking new market"
        );

        for ev in self.strategies.iter_mut() {
            ev.track(&target.id);
        }
        self.latest_price = None;
        self.tracked.push(TrackedMarket {
            market: target.clone(),
            metadata: metadata.clone(),
            last_resolution_check: None,
            done: false,
        });
        self.cursor = Some((target, metadata));
        Ok(())
    }

    /// Fetch prices for a market inside its entry window and run fills and entries.
    async fn process_prices(&mut self, idx: usize, now: DateTime<Utc>) -> Result<(), EngineError> {
        let tracked = &self.tracked[idx];
        let market = tracked.market.clone();
        let metadata = tracked.metadata.clone();

        let in_window = self.schedule.has_passed(Checkpoint::Entry, &market, now)
            && !self.schedule.has_passed(Checkpoint::Exit, &market, now);
        if !in_window {
            return Ok(());
        }

        let needs_entry = self.strategies.iter().any(|ev| ev.awaiting_entry(&market.id));
        let has_open = self
            .strategies
            .iter()
            .any(|ev| ev.book().has_open_orders(&market.id));
        if !needs_entry && !has_open {
            return Ok(());
        }

        let snapshot = self.source.price_snapshot(&metadata).await?;
        if snapshot.market_id != market.id {
            return Err(ClientError::InvalidResponse(format!(
                "snapshot for {} returned while polling {}",
                snapshot.market_id, market.id
            ))
            .into());
        }
        METRICS.record_snapshot(&market.id);
        self.latest_price = Some(snapshot.clone());

        let max_age = chrono::Duration::seconds(self.engine_cfg.poll_interval_secs as i64);
        if snapshot.is_stale(now, max_age) {
            return Err(EngineError::StaleSnapshot {
                market_id: market.id.clone(),
                age_secs: (now - snapshot.ts).num_seconds(),
            });
        }

        for ev in self.strategies.iter_mut() {
            ev.on_snapshot(&snapshot);
        }

        let mut rejected = Vec::new();
        for ev in self.strategies.iter_mut() {
            if !ev.awaiting_entry(&market.id) {
                continue;
            }
            match ev.on_entry_checkpoint(&market, &snapshot, now) {
                Ok(EntryDecision::Placed(order)) => {
                    info!(
                        target: "engine",
                        strategy = %ev.kind(),
                        market = %market.id,
                        side = %order.outcome,
                        price = order.price,
                        size = order.size,
                        "entry placed"
                    );
                }
                Ok(EntryDecision::Skipped) | Ok(EntryDecision::AlreadyActed) => {}
                Err(err) => rejected.push(EngineError::from(err)),
            }
        }
        for err in rejected {
            self.report(err);
        }
        Ok(())
    }

    fn process_exit(&mut self, idx: usize, now: DateTime<Utc>) {
        let market = &self.tracked[idx].market;
        if !self.schedule.has_passed(Checkpoint::Exit, market, now) {
            return;
        }
        for ev in self.strategies.iter_mut() {
            let cancelled = ev.on_exit_checkpoint(market, now);
            if !cancelled.is_empty() {
                info!(
                    target: "engine",
                    strategy = %ev.kind(),
                    market = %market.id,
                    cancelled = cancelled.len(),
                    "exit checkpoint: unfilled orders cancelled"
                );
            }
        }
    }

    /// Settle filled orders once the market's outcome is final.
    async fn process_resolution(&mut self, idx: usize, now: DateTime<Utc>) -> Result<(), EngineError> {
        let tracked = &self.tracked[idx];
        if tracked.done || !self.schedule.has_passed(Checkpoint::Exit, &tracked.market, now) {
            return Ok(());
        }
        let market_id = tracked.market.id.clone();

        let has_position = self
            .strategies
            .iter()
            .any(|ev| ev.book().has_filled_orders(&market_id));
        if !has_position {
            info!(target: "engine", market = %market_id, "no filled positions; releasing market");
            self.tracked[idx].done = true;
            return Ok(());
        }

        if !self.schedule.has_passed(Checkpoint::Resolution, &tracked.market, now) {
            return Ok(());
        }

        let min_gap = chrono::Duration::seconds(self.engine_cfg.resolution_check_interval_secs as i64);
        if let Some(last) = tracked.last_resolution_check {
            if now - last < min_gap {
                return Ok(());
            }
        }
        self.tracked[idx].last_resolution_check = Some(now);

        let Some(outcome) = self.source.resolution(&market_id).await? else {
            return Err(EngineError::ResolutionUnavailable { market_id });
        };

        let tracked = &mut self.tracked[idx];
        tracked.market.resolve(outcome);
        let market = tracked.market.clone();
        tracked.done = true;

        for ev in self.strategies.iter_mut() {
            let trades = self
                .ledger
                .settle_market(&market, ev.book().orders_for_market(&market.id), now);
            ev.mark_settled(&market.id);
            debug!(
                target: "engine",
                strategy = %ev.kind(),
                market = %market.id,
                trades = trades.len(),
                "strategy settled"
            );
        }

        info!(
            target: "engine",
            market = %market.id,
            winner = %outcome,
            market_pnl = self.ledger.market_pnl(&market.id),
            realized_pnl = self.ledger.realized_pnl(),
            "market resolved"
        );
        Ok(())
    }

    fn release_done(&mut self) {
        let strategies = &mut self.strategies;
        self.tracked.retain(|t| {
            if t.done {
                for ev in strategies.iter_mut() {
                    ev.release(&t.market.id);
                }
            }
            !t.done
        });
    }

    fn publish(&self, now: DateTime<Utc>) {
        let cursor_id = self.cursor.as_ref().map(|(m, _)| m.id.as_str());

        let strategies = self
            .strategies
            .iter()
            .map(|ev| StrategyView {
                strategy: ev.kind(),
                threshold: ev.params().threshold,
                current_state: cursor_id.and_then(|id| ev.state_for(id)),
                open_orders: ev.book().open_orders(),
                metrics: StrategyMetrics::from_trades(ev.kind(), self.ledger.trades()),
            })
            .collect();

        let snapshot = EngineSnapshot {
            running: self.running,
            started_at: self.started_at,
            updated_at: Some(now),
            last_error: self.last_error.clone(),
            ticks: self.ticks,
            current_market: self.cursor.as_ref().map(|(market, metadata)| MarketView {
                market: market.clone(),
                metadata: metadata.clone(),
                countdown: Countdown::at(&self.schedule, market, now),
            }),
            latest_price: self.latest_price.clone(),
            strategies,
            recent_trades: self
                .ledger
                .recent(self.engine_cfg.recent_trades_limit)
                .to_vec(),
            realized_pnl: self.ledger.realized_pnl(),
            tracked_markets: self.tracked.iter().map(|t| t.market.id.clone()).collect(),
        };

        self.snapshot_tx.send_replace(snapshot);
    }
}
