use serde::Serialize;
use tracing::info;

use crate::types::AppConfig;

#[derive(Serialize)]
struct StartupLog<'a> {
    event: &'a str,
    mode: &'a str,
    undervalued_threshold: f64,
    momentum_threshold: f64,
    order_size_shares: f64,
    entry_countdown_seconds: i64,
    exit_countdown_seconds: i64,
    poll_interval_secs: u64,
    gamma_url: &'a str,
    clob_url: &'a str,
}

pub fn log_startup(cfg: &AppConfig) {
    let payload = StartupLog {
        event: "startup",
        mode: "paper",
        undervalued_threshold: cfg.strategy.undervalued_threshold,
        momentum_threshold: cfg.strategy.momentum_threshold,
        order_size_shares: cfg.strategy.order_size_shares,
        entry_countdown_seconds: cfg.strategy.entry_countdown_seconds,
        exit_countdown_seconds: cfg.strategy.exit_countdown_seconds,
        poll_interval_secs: cfg.engine.poll_interval_secs,
        gamma_url: &cfg.api.gamma_url,
        clob_url: &cfg.api.clob_url,
    };
    info!(target: "bot", startup = serde_json::to_string(&payload).unwrap_or_default().as_str());
}
