// Risk management module
pub mod volatility;

pub use volatility::RiskModel;
