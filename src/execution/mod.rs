// Price collection, rolling history and the position book
pub mod history;
pub mod position_manager;
pub mod price_feed;

pub use history::HistoryStore;
pub use position_manager::{Position, PositionManager, PositionStatus};
pub use price_feed::{PriceFeed, PriceMap, PriceSource};
