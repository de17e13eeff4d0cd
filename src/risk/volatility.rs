use crate::config::TradingConfig;
use serde::{Deserialize, Serialize};

/// Volatility-driven position sizing
///
/// Volatility is the mean absolute percent change between consecutive prices
/// over the most recent `window` changes. The risk fraction grows with it and is
/// clamped to `[min_risk_pct, max_risk_pct]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModel {
    pub min_risk_pct: f64,
    pub max_risk_pct: f64,
    pub window: usize,
}

impl Default for RiskModel {
    fn default() -> Self {
        Self {
            min_risk_pct: 0.01, // 1% of balance
            max_risk_pct: 0.03, // 3% of balance
            window: 10,
        }
    }
}

impl RiskModel {
    pub fn from_config(config: &TradingConfig) -> Self {
        Self {
            min_risk_pct: config.min_risk_pct,
            max_risk_pct: config.max_risk_pct,
            window: config.volatility_window.max(1),
        }
    }

    /// Mean absolute percent change over the last `window` changes
    ///
    /// Pairs whose earlier price is zero are skipped. Returns `None` when no
    /// valid change exists.
    pub fn volatility(&self, prices: &[f64]) -> Option<f64> {
        let changes: Vec<f64> = prices
            .windows(2)
            .filter(|pair| pair[0] != 0.0)
            .map(|pair| ((pair[1] - pair[0]) / pair[0] * 100.0).abs())
            .collect();

        if changes.is_empty() {
            return None;
        }

        let recent = &changes[changes.len().saturating_sub(self.window)..];
        Some(recent.iter().sum::<f64>() / recent.len() as f64)
    }

    /// Share of the balance to commit for a given volatility
    pub fn fraction_for_volatility(&self, volatility: f64) -> f64 {
        (self.min_risk_pct + volatility / 10.0).min(self.max_risk_pct)
    }

    /// Share of the balance to commit to a new position
    pub fn risk_fraction(&self, prices: &[f64]) -> f64 {
        if prices.len() < 2 {
            return self.min_risk_pct;
        }

        match self.volatility(prices) {
            Some(vol) => self.fraction_for_volatility(vol),
            None => self.min_risk_pct,
        }
    }
}
