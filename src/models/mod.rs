use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Longest advisory reason kept after parsing
pub const MAX_REASON_CHARS: usize = 60;

/// A single observed price for a tradable pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceTick {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    /// Build a tick, discarding non-positive or non-finite prices
    pub fn new(symbol: impl Into<String>, price: f64, timestamp: DateTime<Utc>) -> Option<Self> {
        if is_valid_price(price) {
            Some(Self {
                symbol: symbol.into(),
                price,
                timestamp,
            })
        } else {
            None
        }
    }
}

/// Prices must be positive and finite to enter history or settle a trade
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Parse one of the three lowercase action words
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "buy" => Some(Signal::Buy),
            "sell" => Some(Signal::Sell),
            "hold" => Some(Signal::Hold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommendation returned by one advisor consult
///
/// Lives for the current pass plus a per-symbol mirror kept for status output.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorySignal {
    pub action: Signal,
    pub reason: String,
    pub raw: String,
}

impl AdvisorySignal {
    pub fn new(action: Signal, reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            action,
            reason: truncate_chars(&reason.into(), MAX_REASON_CHARS),
            raw: raw.into(),
        }
    }

    /// Neutral signal used whenever the advisor cannot answer
    pub fn hold(reason: impl Into<String>) -> Self {
        Self::new(Signal::Hold, reason, String::new())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

/// Immutable record of one completed simulated trade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
    /// Cash balance after settlement
    pub balance: f64,
    /// Realised profit of the sold units in percent (sells only)
    pub profit_pct: Option<f64>,
    pub reason: String,
}

impl ExecutionRecord {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
