use crate::config::FeedConfig;
use crate::error::ApiError;
use crate::models::is_valid_price;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};

const PROVIDER: &str = "crypto.com";

/// Client for the Crypto.com Exchange public market-data API
#[derive(Clone)]
pub struct CryptoComClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
    backoff: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    result: Option<ApiResult>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    data: Vec<Value>,
}

/// One historical close
#[derive(Debug, Clone, PartialEq)]
pub struct ClosePrice {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl CryptoComClient {
    pub fn new(config: &FeedConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("paperbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    /// Fetch the last traded price of every instrument in one request
    ///
    /// Entries without an instrument name or a positive price are dropped.
    pub async fn get_tickers(&self) -> Result<HashMap<String, f64>, ApiError> {
        let url = format!("{}/public/get-tickers", self.base_url);
        let response: ApiResponse = self.get_with_retry(&url).await?;

        Ok(parse_tickers(response))
    }

    /// Fetch historical closes for one instrument, oldest first
    pub async fn get_candlesticks(
        &self,
        symbol: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<ClosePrice>, ApiError> {
        let url = format!(
            "{}/public/get-candlestick?instrument_name={}&timeframe={}&count={}",
            self.base_url, symbol, timeframe, count
        );
        let response: ApiResponse = self.get_with_retry(&url).await?;

        let mut closes: Vec<ClosePrice> = response
            .result
            .map(|r| r.data)
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| {
                let millis = entry.get("t")?.as_i64()?;
                let close = value_as_price(entry.get("c")?)?;
                let timestamp = Utc.timestamp_millis_opt(millis).single()?;
                Some(ClosePrice { timestamp, close })
            })
            .collect();

        closes.sort_by_key(|c| c.timestamp);
        Ok(closes)
    }

    /// GET with bounded retry and exponential backoff on transient failures
    async fn get_with_retry<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let mut attempt = 1;

        loop {
            match self.get_once(url).await {
                Ok(body) => {
                    if attempt > 1 {
                        tracing::info!("✓ Fetched {} after {} attempts", url, attempt);
                    }
                    return Ok(body);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let backoff = self.backoff * 2_u32.pow(attempt - 1);
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}. Retrying in {:?}...",
                        attempt,
                        self.max_attempts,
                        PROVIDER,
                        e,
                        backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })
    }
}

fn parse_tickers(response: ApiResponse) -> HashMap<String, f64> {
    response
        .result
        .map(|r| r.data)
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| {
            let symbol = entry.get("i")?.as_str()?;
            let price = value_as_price(entry.get("a")?)?;
            Some((symbol.to_string(), price))
        })
        .collect()
}

/// Prices arrive as strings on this API but numbers are accepted too
fn value_as_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    is_valid_price(price).then_some(price)
}
