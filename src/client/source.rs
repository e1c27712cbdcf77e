use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use super::clob::ClobClient;
use super::gamma::fetch_market_by_slug;
use super::{ClientError, ClientResult};
use crate::market::{Market, MarketMetadata, Outcome, PriceSnapshot};
use crate::types::ApiConfig;

/// Market data the engine consumes: discovery, prices and resolution.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Venue metadata for `market`, or `None` if the venue does not list it yet.
    async fn current_market(&self, market: &Market) -> ClientResult<Option<MarketMetadata>>;

    async fn price_snapshot(&self, market: &MarketMetadata) -> ClientResult<PriceSnapshot>;

    /// Final outcome, or `None` while the market is unresolved.
    async fn resolution(&self, market_id: &str) -> ClientResult<Option<Outcome>>;
}

/// Live source backed by the public Gamma and CLOB REST APIs.
pub struct PolymarketSource {
    http: Client,
    gamma_url: String,
    clob: ClobClient,
}

impl PolymarketSource {
    pub fn new(cfg: &ApiConfig) -> ClientResult<Self> {
        if cfg.gamma_url.is_empty() || cfg.clob_url.is_empty() {
            return Err(ClientError::Config(
                "gamma_url and clob_url must be configured".to_string(),
            ));
        }

        let http = Client::builder()
            .user_agent("polymarket-strategy-tester/0.1")
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(Self {
            clob: ClobClient::new(http.clone(), &cfg.clob_url),
            http,
            gamma_url: cfg.gamma_url.clone(),
        })
    }
}

#[async_trait]
impl MarketDataSource for PolymarketSource {
    async fn current_market(&self, market: &Market) -> ClientResult<Option<MarketMetadata>> {
        let found = fetch_market_by_slug(&self.http, &self.gamma_url, &market.id).await?;
        Ok(found.map(|m| m.metadata))
    }

    async fn price_snapshot(&self, market: &MarketMetadata) -> ClientResult<PriceSnapshot> {
        let (up_price, down_price) = self
            .clob
            .prices(&market.up_token_id, &market.down_token_id)
            .await?;
        debug!(target: "client", market = %market.slug, up_price, down_price, "prices fetched");
        Ok(PriceSnapshot {
            market_id: market.slug.clone(),
            up_price,
            down_price,
            ts: Utc::now(),
        })
    }

    async fn resolution(&self, market_id: &str) -> ClientResult<Option<Outcome>> {
        let found = fetch_market_by_slug(&self.http, &self.gamma_url, market_id).await?;
        Ok(found.and_then(|m| m.winner))
    }
}
