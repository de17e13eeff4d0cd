use std::collections::HashMap;

use crate::execution::{HistoryStore, PositionManager, PriceMap};
use crate::models::AdvisorySignal;

/// All mutable trading state, owned by the engine
///
/// Balance and positions live in the book, rolling prices in the history store,
/// and the latest advisory signal per symbol is mirrored for status output.
#[derive(Debug, Clone)]
pub struct TradingSession {
    pub book: PositionManager,
    pub history: HistoryStore,
    pub advice: HashMap<String, AdvisorySignal>,
    pub last_prices: PriceMap,
    pub pass_count: u64,
    pub running: bool,
}

impl TradingSession {
    pub fn new(symbols: &[String], initial_balance: f64, history_capacity: usize) -> Self {
        Self {
            book: PositionManager::new(symbols, initial_balance),
            history: HistoryStore::new(history_capacity),
            advice: HashMap::new(),
            last_prices: PriceMap::new(),
            pass_count: 0,
            running: true,
        }
    }

    /// Reinitialize balance, positions, history and advice in one step
    ///
    /// The pass counter and run state are left alone.
    pub fn reset(&mut self) {
        self.book.reset();
        self.history.clear();
        self.advice.clear();
        self.last_prices.clear();
    }

    pub fn symbols(&self) -> &[String] {
        self.book.symbols()
    }
}
