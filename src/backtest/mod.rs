pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use metrics::BacktestMetrics;
pub use runner::{build_timeline, BacktestRunner, PriceFrame, ReplayFeed};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
