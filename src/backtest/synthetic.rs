use crate::api::ClosePrice;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise
    Uptrend,
    /// Steady downtrend with noise
    Downtrend,
    /// Mean-reverting chop around the start price
    Sideways,
    /// Large random swings
    Volatile,
    /// Flat, then a sharp 30% collapse, then a partial recovery
    Crash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::Crash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::Crash => "crash",
        }
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown scenario '{}'", s))
    }
}

/// Seeded random-walk price series for offline backtests
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `count` closes spaced `interval_secs` apart, ending now
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        count: usize,
        interval_secs: i64,
    ) -> Vec<ClosePrice> {
        let start = Utc::now() - Duration::seconds(count as i64 * interval_secs);
        self.generate_from(scenario, start, count, interval_secs)
    }

    /// Same as `generate` with an explicit start time
    pub fn generate_from(
        &mut self,
        scenario: MarketScenario,
        start: DateTime<Utc>,
        count: usize,
        interval_secs: i64,
    ) -> Vec<ClosePrice> {
        let mut closes = Vec::with_capacity(count);
        let mut price = self.base_price;
        let floor = self.base_price * 0.05;

        for i in 0..count {
            price += self.step(scenario, price, i, count);
            price = price.max(floor);

            closes.push(ClosePrice {
                timestamp: start + Duration::seconds(i as i64 * interval_secs),
                close: price,
            });
        }

        closes
    }

    /// Price change for step `i` of `count`
    fn step(&mut self, scenario: MarketScenario, price: f64, i: usize, count: usize) -> f64 {
        match scenario {
            MarketScenario::Uptrend => price * (0.0008 + self.rng.gen_range(-0.004..0.004)),
            MarketScenario::Downtrend => price * (-0.0008 + self.rng.gen_range(-0.004..0.004)),
            MarketScenario::Sideways => {
                // 10% pull back to the start price
                (self.base_price - price) * 0.1 + price * self.rng.gen_range(-0.006..0.006)
            }
            MarketScenario::Volatile => price * self.rng.gen_range(-0.03..0.03),
            MarketScenario::Crash => {
                let crash_start = count / 3;
                let crash_end = count / 2;
                let noise = price * self.rng.gen_range(-0.003..0.003);

                if (crash_start..crash_end).contains(&i) {
                    let steps = (crash_end - crash_start).max(1) as f64;
                    price * (-0.30 / steps) + noise
                } else if i >= crash_end {
                    price * 0.0005 + noise
                } else {
                    noise
                }
            }
        }
    }
}
