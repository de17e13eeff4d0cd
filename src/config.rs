use crate::error::ConfigError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

const DEFAULT_SYMBOLS: &[&str] = &[
    "BTC_USDT",
    "ETH_USDT",
    "SOL_USDT",
    "DOGE_USDT",
    "SHIB_USDT",
    "CRO_USDT",
    "XRP_USDT",
    "ADA_USDT",
];

/// Environment variable consulted when no key is configured
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Decision rules and sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub symbols: Vec<String>,
    pub initial_balance: f64,
    pub update_interval_secs: u64,
    pub cooldown_secs: i64,
    pub history_capacity: usize,
    pub volatility_window: usize,
    pub min_risk_pct: f64,
    pub max_risk_pct: f64,
    pub stop_loss_pct: f64,      // profit ratio, -0.05 = -5%
    pub take_profit_pct: f64,    // profit ratio, 0.10 = +10%
    pub buy_drawdown_pct: f64,   // percent, -0.5 = -0.5%
    pub min_notional: f64,
    pub advisor_sell_fraction: f64,
    pub forced_buy_pct: f64,
    pub forced_buy_cap: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            initial_balance: 1_000_000.0,
            update_interval_secs: 10,
            cooldown_secs: 300,
            history_capacity: 100,
            volatility_window: 10,
            min_risk_pct: 0.01,
            max_risk_pct: 0.03,
            stop_loss_pct: -0.05,
            take_profit_pct: 0.10,
            buy_drawdown_pct: -0.5,
            min_notional: 10.0,
            advisor_sell_fraction: 0.5,
            forced_buy_pct: 0.03,
            forced_buy_cap: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.crypto.com/exchange/v1".to_string(),
            timeout_secs: 10,
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Consult on every Nth pass
    pub consult_interval: u64,
    pub min_history: usize,
    pub prompt_prices: usize,
    pub referer: String,
    pub title: String,
    pub max_attempts: u32,
    pub rate_limit_backoff_ms: u64,
    pub rate_limit_backoff_cap_ms: u64,
    pub jitter_ms: u64,
    pub error_delay_ms: u64,
    pub api_key: Option<String>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "deepseek/deepseek-chat".to_string(),
            max_tokens: 80,
            temperature: 0.0,
            timeout_secs: 8,
            consult_interval: 15,
            min_history: 3,
            prompt_prices: 10,
            referer: "https://mohameddodda.github.io/Paper_trading_bot/".to_string(),
            title: "Paper Trading Bot".to_string(),
            max_attempts: 3,
            rate_limit_backoff_ms: 2000,
            rate_limit_backoff_cap_ms: 30_000,
            jitter_ms: 1000,
            error_delay_ms: 1000,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeLogConfig {
    pub path: String,
}

impl Default for TradeLogConfig {
    fn default() -> Self {
        Self {
            path: "paper_trading_log.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub telegram_base_url: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_base_url: "https://api.telegram.org".to_string(),
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub trading: TradingConfig,
    pub feed: FeedConfig,
    pub advisor: AdvisorConfig,
    pub trade_log: TradeLogConfig,
    pub notify: NotifyConfig,
}

impl Settings {
    /// Layer defaults, an optional settings file and `PAPERBOT__*` variables
    ///
    /// Without an explicit path, `Settings.{toml,yaml,json}` is picked up when present.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::with_name(p).required(true),
            None => File::with_name("Settings").required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix("PAPERBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("trading.symbols")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trading;

        if t.symbols.is_empty() {
            return Err(invalid("trading.symbols", "at least one symbol is required"));
        }
        if !(t.initial_balance.is_finite() && t.initial_balance > 0.0) {
            return Err(invalid("trading.initial_balance", "must be positive"));
        }
        if !(t.min_risk_pct > 0.0 && t.min_risk_pct <= t.max_risk_pct) {
            return Err(invalid(
                "trading.min_risk_pct",
                "must be positive and not exceed max_risk_pct",
            ));
        }
        if t.stop_loss_pct >= 0.0 {
            return Err(invalid("trading.stop_loss_pct", "must be negative"));
        }
        if t.take_profit_pct <= 0.0 {
            return Err(invalid("trading.take_profit_pct", "must be positive"));
        }
        if t.history_capacity < 2 {
            return Err(invalid("trading.history_capacity", "must be at least 2"));
        }
        if !(t.advisor_sell_fraction > 0.0 && t.advisor_sell_fraction <= 1.0) {
            return Err(invalid("trading.advisor_sell_fraction", "must be in (0, 1]"));
        }
        if self.advisor.consult_interval == 0 {
            return Err(invalid("advisor.consult_interval", "must be at least 1"));
        }
        if self.feed.max_attempts == 0 || self.advisor.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }

        Ok(())
    }

    /// Advisor credential from settings, falling back to `OPENROUTER_API_KEY`
    pub fn advisor_api_key(&self) -> Option<String> {
        self.advisor
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::Validation {
        field,
        message: message.to_string(),
    }
}
