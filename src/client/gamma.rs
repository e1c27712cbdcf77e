//! Polymarket Gamma API client for looking up 15-minute market slugs.
//!
//! Gamma encodes `outcomes`, `clobTokenIds` and `outcomePrices` either as JSON
//! arrays or as strings containing a JSON array, depending on the endpoint.

use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::{ClientError, ClientResult};
use crate::market::{MarketMetadata, Outcome};

/// Market row as returned by Gamma, with the resolved winner if any.
#[derive(Clone, Debug, PartialEq)]
pub struct GammaMarket {
    pub metadata: MarketMetadata,
    pub winner: Option<Outcome>,
}

#[derive(Debug, Deserialize)]
struct GammaEventRow {
    #[serde(default)]
    markets: Vec<GammaMarketRow>,
}

#[derive(Debug, Deserialize)]
struct GammaMarketRow {
    #[serde(default, rename = "conditionId")]
    condition_id: Option<String>,
    #[serde(default, rename = "clobTokenIds", deserialize_with = "string_list")]
    clob_token_ids: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    outcomes: Vec<String>,
    #[serde(default, rename = "outcomePrices", deserialize_with = "string_list")]
    outcome_prices: Vec<String>,
    #[serde(default)]
    tokens: Option<Vec<GammaToken>>,
}

#[derive(Debug, Deserialize)]
struct GammaToken {
    token_id: String,
    outcome: String,
}

/// Accept `["a","b"]`, `"[\"a\",\"b\"]"`, numbers inside either, or null.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let items = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Array(items)) => items,
            _ => return Ok(Vec::new()),
        },
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

fn parse_outcome(label: &str) -> Option<Outcome> {
    if label.eq_ignore_ascii_case("up") {
        Some(Outcome::Up)
    } else if label.eq_ignore_ascii_case("down") {
        Some(Outcome::Down)
    } else {
        None
    }
}

fn is_settled_price(raw: &str) -> bool {
    raw.trim().parse::<f64>().map(|p| p >= 1.0).unwrap_or(false)
}

impl GammaMarketRow {
    fn into_market(self, slug: &str) -> Option<GammaMarket> {
        let mut up_token_id = None;
        let mut down_token_id = None;

        if let Some(tokens) = &self.tokens {
            for t in tokens {
                match parse_outcome(&t.outcome) {
                    Some(Outcome::Up) => up_token_id = Some(t.token_id.clone()),
                    Some(Outcome::Down) => down_token_id = Some(t.token_id.clone()),
                    None => {}
                }
            }
        } else {
            for (label, id) in self.outcomes.iter().zip(self.clob_token_ids.iter()) {
                match parse_outcome(label) {
                    Some(Outcome::Up) => up_token_id = Some(id.clone()),
                    Some(Outcome::Down) => down_token_id = Some(id.clone()),
                    None => {}
                }
            }
        }

        // A settled binary market prices the winning outcome at 1.
        let winner = self
            .outcomes
            .iter()
            .zip(self.outcome_prices.iter())
            .find(|(_, price)| is_settled_price(price))
            .and_then(|(label, _)| parse_outcome(label));

        match (up_token_id, down_token_id) {
            (Some(up), Some(down)) if !up.is_empty() && !down.is_empty() => Some(GammaMarket {
                metadata: MarketMetadata {
                    slug: slug.to_string(),
                    condition_id: self.condition_id.unwrap_or_default(),
                    up_token_id: up,
                    down_token_id: down,
                },
                winner,
            }),
            _ => {
                debug!(target: "client", slug, "gamma market is missing Up/Down token ids");
                None
            }
        }
    }
}

async fn get_json(http: &Client, url: &str, slug: &str) -> ClientResult<Value> {
    let resp = http.get(url).query(&[("slug", slug)]).send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::HttpStatus { status, body });
    }
    Ok(resp.json().await?)
}

/// Fetch a market by slug, trying `/events` first and `/markets` second.
pub async fn fetch_market_by_slug(
    http: &Client,
    base_url: &str,
    slug: &str,
) -> ClientResult<Option<GammaMarket>> {
    let base = base_url.trim_end_matches('/');

    match get_json(http, &format!("{base}/events"), slug).await {
        Ok(body) => {
            if let Some(market) = market_from_events(body, slug) {
                return Ok(Some(market));
            }
        }
        Err(err) => {
            debug!(target: "client", slug, error = %err, "gamma /events lookup failed; trying /markets");
        }
    }

    let body = get_json(http, &format!("{base}/markets"), slug).await?;
    let rows: Vec<GammaMarketRow> = serde_json::from_value(body)?;
    Ok(rows.into_iter().next().and_then(|row| row.into_market(slug)))
}

/// First usable market in an `/events` payload. An unexpected shape yields
/// `None` so the caller can fall back to `/markets`.
fn market_from_events(body: Value, slug: &str) -> Option<GammaMarket> {
    let events: Vec<GammaEventRow> = match serde_json::from_value(body) {
        Ok(events) => events,
        Err(err) => {
            debug!(target: "client", slug, error = %err, "unexpected gamma /events payload");
            return None;
        }
    };
    events
        .into_iter()
        .next()
        .and_then(|e| e.markets.into_iter().next())
        .and_then(|row| row.into_market(slug))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLUG: &str = "btc-updown-15m-1704110400";

    #[test]
    fn parses_stringified_arrays() {
        let json = r#"{
            "conditionId": "0xabc",
            "outcomes": "[\"Up\", \"Down\"]",
            "clobTokenIds": "[\"111\", \"222\"]",
            "outcomePrices": "[\"0.505\", \"0.495\"]"
        }"#;
        let row: GammaMarketRow = serde_json::from_str(json).unwrap();
        let m = row.into_market(SLUG).unwrap();
        assert_eq!(m.metadata.up_token_id, "111");
        assert_eq!(m.metadata.down_token_id, "222");
        assert_eq!(m.metadata.condition_id, "0xabc");
        assert_eq!(m.winner, None);
    }

    #[test]
    fn detects_winner_from_settled_prices() {
        let json = r#"{
            "outcomes": ["Up", "Down"],
            "clobTokenIds": ["111", "222"],
            "outcomePrices": ["0", "1"]
        }"#;
        let row: GammaMarketRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.into_market(SLUG).unwrap().winner, Some(Outcome::Down));
    }

    #[test]
    fn respects_outcome_order() {
        let json = r#"{
            "outcomes": ["Down", "Up"],
            "clobTokenIds": ["222", "111"],
            "outcomePrices": ["0", "1"]
        }"#;
        let row: GammaMarketRow = serde_json::from_str(json).unwrap();
        let m = row.into_market(SLUG).unwrap();
        assert_eq!(m.metadata.up_token_id, "111");
        assert_eq!(m.winner, Some(Outcome::Up));
    }

    #[test]
    fn token_list_takes_precedence() {
        let json = r#"{
            "tokens": [
                {"token_id": "u", "outcome": "Up"},
                {"token_id": "d", "outcome": "Down"}
            ]
        }"#;
        let row: GammaMarketRow = serde_json::from_str(json).unwrap();
        let m = row.into_market(SLUG).unwrap();
        assert_eq!(m.metadata.up_token_id, "u");
        assert_eq!(m.metadata.down_token_id, "d");
    }

    #[test]
    fn missing_tokens_is_none() {
        let row: GammaMarketRow = serde_json::from_str(r#"{"outcomes": null}"#).unwrap();
        assert!(row.into_market(SLUG).is_none());
    }

    #[test]
    fn malformed_events_payload_falls_through() {
        let body: Value = serde_json::from_str(r#"{"error": "internal"}"#).unwrap();
        assert_eq!(market_from_events(body, SLUG), None);

        let body: Value = serde_json::from_str(r#"[{"markets": []}]"#).unwrap();
        assert_eq!(market_from_events(body, SLUG), None);
    }

    #[test]
    fn events_payload_yields_first_market() {
        let body: Value = serde_json::from_str(
            r#"[{"markets": [{
                "conditionId": "0xabc",
                "outcomes": ["Up", "Down"],
                "clobTokenIds": ["111", "222"]
            }]}]"#,
        )
        .unwrap();
        let m = market_from_events(body, SLUG).unwrap();
        assert_eq!(m.metadata.up_token_id, "111");
        assert_eq!(m.metadata.slug, SLUG);
    }
}
