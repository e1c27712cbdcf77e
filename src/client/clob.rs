use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

use super::{ClientError, ClientResult};

const DEFAULT_MAX_RETRIES: u32 = 3;

/// Read-only client for the public CLOB price endpoints.
pub struct ClobClient {
    http: Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct MidpointResponse {
    mid: String,
}

impl ClobClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    fn backoff(attempt: u32) -> Duration {
        let capped = attempt.min(5);
        let millis = 500 * (1_u64 << capped);
        Duration::from_millis(millis.min(8_000))
    }

    /// GET a public endpoint, retrying transport errors and 5xx responses.
    pub async fn get_public<TResp>(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<TResp>
    where
        TResp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let mut attempt = 0;
        loop {
            match self.http.get(&url).query(query).send().await {
                Ok(resp) => {
                    if resp.status().is_success() {
                        return Ok(resp.json::<TResp>().await?);
                    }

                    if resp.status().is_server_error() && attempt < self.max_retries {
                        attempt += 1;
                        debug!(target: "client", %url, status = %resp.status(), attempt, "retrying CLOB request");
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }

                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ClientError::HttpStatus { status, body });
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        debug!(target: "client", %url, error = %err, attempt, "retrying CLOB request");
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }

                    return Err(ClientError::Http(err));
                }
            }
        }
    }

    /// Midpoint of best bid and best ask for a token, in 0-1.
    pub async fn midpoint(&self, token_id: &str) -> ClientResult<f64> {
        let resp: MidpointResponse = self.get_public("/midpoint", &[("token_id", token_id)]).await?;
        parse_price(&resp.mid)
    }

    /// Midpoints for the Up and Down tokens, fetched concurrently.
    pub async fn prices(&self, up_token_id: &str, down_token_id: &str) -> ClientResult<(f64, f64)> {
        futures::try_join!(self.midpoint(up_token_id), self.midpoint(down_token_id))
    }
}

fn parse_price(raw: &str) -> ClientResult<f64> {
    let price: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ClientError::InvalidResponse(format!("unparseable price {raw:?}")))?;
    if !(0.0..=1.0).contains(&price) {
        return Err(ClientError::InvalidResponse(format!(
            "price {price} outside [0, 1]"
        )));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        assert_eq!(ClobClient::backoff(1), Duration::from_millis(1_000));
        assert_eq!(ClobClient::backoff(2), Duration::from_millis(2_000));
        assert_eq!(ClobClient::backoff(10), Duration::from_millis(8_000));
    }

    #[test]
    fn parses_prices() {
        assert!((parse_price("0.475").unwrap() - 0.475).abs() < f64::EPSILON);
        assert!(parse_price("abc").is_err());
        assert!(parse_price("1.5").is_err());
    }

    #[test]
    fn midpoint_payload() {
        let r: MidpointResponse = serde_json::from_str(r#"{"mid":"0.51"}"#).unwrap();
        assert_eq!(r.mid, "0.51");
    }
}
