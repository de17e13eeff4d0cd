// AI advisory signals
pub mod parser;

pub use parser::{parse_response, ParseOutcome, ParseStage};

use async_trait::async_trait;
use rand::Rng;
use tokio::time::{sleep, Duration};

use crate::api::OpenRouterClient;
use crate::config::AdvisorConfig;
use crate::error::ApiError;
use crate::models::AdvisorySignal;

/// Source of advisory signals for the decision loop
///
/// `consult` never fails: every path ends in a valid signal, with `hold` as the
/// neutral answer.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn consult(
        &self,
        symbol: &str,
        recent_prices: &[f64],
        drop_pct: f64,
        gain_pct: f64,
    ) -> AdvisorySignal;

    /// Whether consults can reach a remote model at all
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Decided once at construction from credential presence
enum Capability {
    Enabled(OpenRouterClient),
    Disabled,
}

/// Retry schedule for advisor calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub rate_limit_backoff: Duration,
    pub rate_limit_backoff_cap: Duration,
    pub jitter: Duration,
    pub error_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AdvisorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
            rate_limit_backoff_cap: Duration::from_millis(config.rate_limit_backoff_cap_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            error_delay: Duration::from_millis(config.error_delay_ms),
        }
    }

    /// Rate-limit backoff after `current`: doubled, never above the cap
    pub fn next_backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.rate_limit_backoff_cap)
    }

    /// Wait after a non rate-limit failure on zero-based `attempt`
    pub fn error_delay_for(&self, attempt: u32) -> Duration {
        self.error_delay * (attempt + 1)
    }

    fn jittered(&self, backoff: Duration) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return backoff;
        }
        backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// OpenRouter-backed advisor with rate-limit aware retries
pub struct AdvisorClient {
    capability: Capability,
    policy: RetryPolicy,
    prompt_prices: usize,
}

impl AdvisorClient {
    /// Build an advisor; without an API key it stays disabled for its lifetime
    pub fn new(config: &AdvisorConfig, api_key: Option<String>) -> Result<Self, ApiError> {
        let capability = match api_key {
            Some(key) => Capability::Enabled(OpenRouterClient::new(config, key)?),
            None => {
                tracing::warn!("No advisor API key configured, running in rule-only mode");
                Capability::Disabled
            }
        };

        Ok(Self {
            capability,
            policy: RetryPolicy::from_config(config),
            prompt_prices: config.prompt_prices,
        })
    }

    pub fn disabled(config: &AdvisorConfig) -> Self {
        Self {
            capability: Capability::Disabled,
            policy: RetryPolicy::from_config(config),
            prompt_prices: config.prompt_prices,
        }
    }

    async fn consult_remote(
        &self,
        client: &OpenRouterClient,
        symbol: &str,
        prompt: &str,
    ) -> AdvisorySignal {
        let mut backoff = self.policy.rate_limit_backoff;

        for attempt in 0..self.policy.max_attempts {
            let is_last = attempt + 1 >= self.policy.max_attempts;

            match client.complete(prompt).await {
                Ok(text) => {
                    let outcome = parse_response(&text);
                    tracing::debug!(
                        symbol = %symbol,
                        stage = ?outcome.stage,
                        signal = %outcome.signal.action,
                        reason = %outcome.signal.reason,
                        "Advisor responded"
                    );
                    return outcome.signal;
                }
                Err(ApiError::RateLimited { .. }) => {
                    tracing::warn!(symbol = %symbol, attempt = attempt + 1, "Advisor rate limited");
                    if !is_last {
                        sleep(self.policy.jittered(backoff)).await;
                    }
                    backoff = self.policy.next_backoff(backoff);
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, attempt = attempt + 1, "Advisor error: {}", e);
                    if !is_last {
                        sleep(self.policy.error_delay_for(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(
            symbol = %symbol,
            attempts = self.policy.max_attempts,
            "Advisor unavailable, defaulting to hold"
        );
        AdvisorySignal::hold("error")
    }
}

#[async_trait]
impl Advisor for AdvisorClient {
    async fn consult(
        &self,
        symbol: &str,
        recent_prices: &[f64],
        drop_pct: f64,
        gain_pct: f64,
    ) -> AdvisorySignal {
        match &self.capability {
            Capability::Disabled => AdvisorySignal::hold("no key"),
            Capability::Enabled(client) => {
                let start = recent_prices.len().saturating_sub(self.prompt_prices);
                let prompt = build_prompt(symbol, &recent_prices[start..], drop_pct, gain_pct);
                self.consult_remote(client, symbol, &prompt).await
            }
        }
    }

    fn is_enabled(&self) -> bool {
        matches!(self.capability, Capability::Enabled(_))
    }
}

/// Prompt asking for exactly one `{"signal", "reason"}` object
pub fn build_prompt(symbol: &str, recent_prices: &[f64], drop_pct: f64, gain_pct: f64) -> String {
    let prices = recent_prices
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are an automated trading signal generator. Respond with VALID JSON ONLY.\n\
         Return EXACTLY one JSON object with the keys signal and reason:\n \
         - signal must be one of \"buy\", \"sell\", \"hold\"\n \
         - reason must be a short explanation of at most 60 characters\n\
         Do not include any other text or markup.\n\n\
         EXAMPLE:\n{{\"signal\":\"buy\",\"reason\":\"volatility breakout\"}}\n\n\
         Analyze this coin and return the JSON object only.\n\
         Coin: {symbol}\n\
         Recent prices (most recent last): [{prices}]\n\
         Current drop %: {drop_pct:.2}\n\
         Current gain %: {gain_pct:.2}\n"
    )
}
