use crate::api::CryptoComClient;
use async_trait::async_trait;
use std::collections::HashMap;

/// Bulk snapshot of current prices, keyed by symbol
pub type PriceMap = HashMap<String, f64>;

/// Source of one full price snapshot per tick
///
/// Implementations never fail: transport or parse problems degrade to an empty
/// snapshot so the decision loop simply skips every symbol for that pass.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_all(&self) -> PriceMap;
}

/// Live price feed backed by the Crypto.com ticker endpoint
pub struct PriceFeed {
    client: CryptoComClient,
}

impl PriceFeed {
    pub fn new(client: CryptoComClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceSource for PriceFeed {
    async fn fetch_all(&self) -> PriceMap {
        match self.client.get_tickers().await {
            Ok(prices) => {
                tracing::debug!(instruments = prices.len(), "Fetched price snapshot");
                prices
            }
            Err(e) => {
                tracing::error!("Price fetch error: {}", e);
                PriceMap::new()
            }
        }
    }
}
