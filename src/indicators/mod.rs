// Price-move indicators used by the entry rules and the advisor prompt
pub mod price_moves;

pub use price_moves::{drawdown_pct, gain_pct, last_change_pct, percent_change};
