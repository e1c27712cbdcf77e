use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

/// Thresholds and checkpoint offsets shared by both paper strategies.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Undervalued buys a side priced at or below this.
    pub undervalued_threshold: f64,
    /// Momentum buys a side priced at or above this.
    pub momentum_threshold: f64,
    /// Shares requested per paper order.
    pub order_size_shares: f64,
    /// Entry fires when this many seconds remain until the market starts.
    pub entry_countdown_seconds: i64,
    /// Unfilled orders are cancelled when this many seconds remain until the market starts.
    pub exit_countdown_seconds: i64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            undervalued_threshold: 0.48,
            momentum_threshold: 0.52,
            order_size_shares: 10.0,
            entry_countdown_seconds: 1200,
            exit_countdown_seconds: 930,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_secs: u64,
    /// Minimum spacing between resolution queries for the same market.
    pub resolution_check_interval_secs: u64,
    pub recent_trades_limit: usize,
    /// Consecutive ticks with a source failure before the engine halts.
    pub max_consecutive_failures: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            resolution_check_interval_secs: 15,
            recent_trades_limit: 10,
            max_consecutive_failures: 20,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub gamma_url: String,
    pub clob_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            clob_url: "https://clob.polymarket.com".to_string(),
            request_timeout_secs: 15,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub dashboard_period_secs: u64,
    /// `host:port` for the plain-text health endpoint; disabled when unset.
    pub health_addr: Option<String>,
    pub max_staleness_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            dashboard_period_secs: 10,
            health_addr: None,
            max_staleness_secs: 60,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub engine: EngineConfig,
    pub api: ApiConfig,
    pub monitoring: MonitoringConfig,
}

impl AppConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {path}"))?;
        let cfg: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to deserialize TOML config at {path}"))?;
        Ok(cfg)
    }

    /// Load from `path` if it exists, fall back to defaults otherwise, then apply
    /// environment overrides and validate.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut cfg = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(target: "bot", config = %path, "config file not found; using defaults");
            Self::default()
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        let s = &mut self.strategy;
        override_from_env("UNDERVALUED_THRESHOLD", &mut s.undervalued_threshold)?;
        override_from_env("MOMENTUM_THRESHOLD", &mut s.momentum_threshold)?;
        override_from_env("ORDER_SIZE_SHARES", &mut s.order_size_shares)?;
        override_from_env("ENTRY_COUNTDOWN_SECONDS", &mut s.entry_countdown_seconds)?;
        override_from_env("EXIT_COUNTDOWN_SECONDS", &mut s.exit_countdown_seconds)?;
        override_from_env("POLL_INTERVAL_SECS", &mut self.engine.poll_interval_secs)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.strategy;
        ensure!(
            s.undervalued_threshold > 0.0 && s.undervalued_threshold < 1.0,
            "undervalued_threshold must be in (0, 1), got {}",
            s.undervalued_threshold
        );
        ensure!(
            s.momentum_threshold > 0.0 && s.momentum_threshold < 1.0,
            "momentum_threshold must be in (0, 1), got {}",
            s.momentum_threshold
        );
        ensure!(
            s.order_size_shares.is_finite() && s.order_size_shares > 0.0,
            "order_size_shares must be positive, got {}",
            s.order_size_shares
        );
        ensure!(
            s.entry_countdown_seconds > s.exit_countdown_seconds,
            "entry_countdown_seconds ({}) must be greater than exit_countdown_seconds ({})",
            s.entry_countdown_seconds,
            s.exit_countdown_seconds
        );
        ensure!(
            s.exit_countdown_seconds >= 0,
            "exit_countdown_seconds must not be negative"
        );
        ensure!(self.engine.poll_interval_secs > 0, "poll_interval_secs must be positive");
        ensure!(
            self.engine.max_consecutive_failures > 0,
            "max_consecutive_failures must be positive"
        );
        Ok(())
    }
}

fn override_from_env<T>(key: &str, slot: &mut T) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Ok(raw) = std::env::var(key) {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}"))?;
    }
    Ok(())
}
