use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use polymarket_strategy_tester::{
    client::{MarketDataSource, PolymarketSource},
    engine::Engine,
    market::{upcoming_markets, Countdown, Schedule},
    monitoring,
    types::AppConfig,
};

#[derive(Parser, Debug)]
#[command(name = "polymarket-strategy-tester")]
#[command(about = "Paper-trades Undervalued and Momentum strategies on Polymarket 15m BTC up/down markets", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the paper-trading engine until Ctrl-C
    Run {},
    /// Print the 15-minute market schedule around now
    Markets {
        /// Windows to list before the current one
        #[arg(long, default_value_t = 2)]
        back: i64,
        /// Windows to list after the current one
        #[arg(long, default_value_t = 6)]
        forward: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "polymarket_strategy_tester=debug,bot=debug,info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(target: "bot", "polymarket-strategy-tester starting");

    let cli = Cli::parse();
    tracing::debug!(target: "bot", config = %cli.config, "loading config");

    let settings = AppConfig::load(&cli.config)?;
    tracing::info!(
        target: "bot",
        config = %cli.config,
        gamma_url = %settings.api.gamma_url,
        clob_url = %settings.api.clob_url,
        "config loaded"
    );

    match cli.command.unwrap_or(Commands::Run {}) {
        Commands::Run {} => {
            monitoring::logger::log_startup(&settings);
            run(settings).await?;
        }
        Commands::Markets { back, forward } => {
            let schedule = Schedule::from(&settings.strategy);
            let now = Utc::now();
            for market in upcoming_markets(now, back, forward) {
                let countdown = Countdown::at(&schedule, &market, now);
                tracing::info!(
                    target: "bot",
                    market = %market.id,
                    start = %market.start_time,
                    resolution = %market.resolution_time,
                    to_entry = countdown.to_entry,
                    to_exit = countdown.to_exit,
                    to_resolution = countdown.to_resolution,
                    "scheduled market"
                );
            }
        }
    }

    Ok(())
}

async fn run(settings: AppConfig) -> anyhow::Result<()> {
    let source: Arc<dyn MarketDataSource> = Arc::new(PolymarketSource::new(&settings.api)?);
    let engine = Engine::new(&settings, source);
    let handle = engine.handle();

    let dashboard = monitoring::dashboard::spawn_dashboard_task(
        Duration::from_secs(settings.monitoring.dashboard_period_secs),
        handle.clone(),
    );

    let health = settings.monitoring.health_addr.clone().map(|addr| {
        let max_staleness = Duration::from_secs(settings.monitoring.max_staleness_secs);
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(err) = monitoring::dashboard::serve_health(&addr, max_staleness, handle).await {
                tracing::error!(target: "bot", error = %err, "health endpoint failed");
            }
        })
    });

    let ctrl_c_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "bot", "shutdown requested");
            ctrl_c_handle.stop();
        }
    });

    let result = engine.run().await;

    dashboard.abort();
    if let Some(task) = health {
        task.abort();
    }

    let final_state = handle.snapshot();
    monitoring::dashboard::log_engine_snapshot(&final_state);
    tracing::info!(
        target: "bot",
        realized_pnl = final_state.realized_pnl,
        trades = final_state.recent_trades.len(),
        "polymarket-strategy-tester stopped"
    );

    result.map_err(Into::into)
}
