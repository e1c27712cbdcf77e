use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::engine::{EngineHandle, EngineSnapshot};
use crate::monitoring::metrics::{log_metrics_snapshot, METRICS};

/// Spawn a background task that periodically logs metrics and a compact
/// summary of the engine snapshot.
///
/// Combined with JSON logs this is the operator's terminal dashboard.
pub fn spawn_dashboard_task(period: Duration, engine: EngineHandle) -> JoinHandle<()> {
    let mut ticker = interval(period);
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            log_metrics_snapshot(&METRICS.snapshot());
            log_engine_snapshot(&engine.snapshot());
        }
    })
}

pub fn log_engine_snapshot(snapshot: &EngineSnapshot) {
    let market = snapshot
        .current_market
        .as_ref()
        .map(|v| v.market.id.as_str())
        .unwrap_or("-");
    let to_exit = snapshot
        .current_market
        .as_ref()
        .map(|v| v.countdown.to_exit)
        .unwrap_or_default();
    let (up, down) = snapshot
        .latest_price
        .as_ref()
        .map(|p| (p.up_price, p.down_price))
        .unwrap_or_default();

    info!(
        target: "bot",
        event = "dashboard",
        running = snapshot.running,
        ticks = snapshot.ticks,
        market = %market,
        countdown_to_exit = to_exit,
        up_price = up,
        down_price = down,
        realized_pnl = snapshot.realized_pnl,
        tracked = snapshot.tracked_markets.len(),
        last_error = snapshot.last_error.as_deref().unwrap_or(""),
        "engine status"
    );

    for view in &snapshot.strategies {
        info!(
            target: "bot",
            event = "dashboard_strategy",
            strategy = %view.strategy,
            state = ?view.current_state,
            open_orders = view.open_orders.len(),
            trades = view.metrics.total_trades,
            wins = view.metrics.wins,
            losses = view.metrics.losses,
            win_rate = view.metrics.win_rate,
            total_pnl = view.metrics.total_pnl,
            roi = view.metrics.roi,
            "strategy status"
        );
    }
}

/// Healthy while the metrics heartbeat is fresh and the engine has not halted.
pub fn is_healthy(snapshot: &EngineSnapshot, max_staleness: Duration) -> bool {
    let halted = snapshot.ticks > 0 && !snapshot.running;
    !halted && METRICS.is_healthy(max_staleness)
}

/// Minimal health-check TCP listener exposing an HTTP-style endpoint.
///
/// Answers `OK` while healthy and `STALE` otherwise. The request itself is
/// not parsed.
pub async fn serve_health(
    addr: &str,
    max_staleness: Duration,
    engine: EngineHandle,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(target: "bot", %addr, "health endpoint listening");
    serve_health_on(listener, max_staleness, engine).await
}

/// Accept loop for an already bound listener. A failed connection is logged
/// and never ends the loop.
pub async fn serve_health_on(
    listener: TcpListener,
    max_staleness: Duration,
    engine: EngineHandle,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(target: "bot", error = %err, "health accept failed");
                continue;
            }
        };

        let healthy = is_healthy(&engine.snapshot(), max_staleness);
        if let Err(err) = respond(socket, healthy).await {
            debug!(target: "bot", %peer, error = %err, "health connection dropped");
        }
    }
}

async fn respond(mut socket: TcpStream, healthy: bool) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    socket.readable().await?;
    let _ = socket.try_read(&mut buf);

    let (status, body) = if healthy {
        ("200 OK", "OK")
    } else {
        ("503 Service Unavailable", "STALE")
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halted_engine_is_not_healthy() {
        let mut snapshot = EngineSnapshot::idle();
        snapshot.ticks = 3;
        assert!(!is_healthy(&snapshot, Duration::from_secs(60)));

        snapshot.running = true;
        assert!(is_healthy(&snapshot, Duration::from_secs(60)));
    }

    #[test]
    fn dashboard_logs_idle_snapshot() {
        log_engine_snapshot(&EngineSnapshot::idle());
    }

    #[tokio::test]
    async fn health_endpoint_survives_dropped_client() {
        use std::sync::Arc;
        use tokio::io::AsyncReadExt;

        use crate::client::PolymarketSource;
        use crate::engine::Engine;
        use crate::types::AppConfig;

        let cfg = AppConfig::default();
        let source = Arc::new(PolymarketSource::new(&cfg.api).unwrap());
        let engine = Engine::new(&cfg, source);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_health_on(
            listener,
            Duration::from_secs(60),
            engine.handle(),
        ));

        // Connect and hang up without sending a request.
        drop(TcpStream::connect(addr).await.unwrap());

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET /health HTTP/1.1\r\n\r\n").await.unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 "));
        assert!(!server.is_finished());

        server.abort();
    }
}
