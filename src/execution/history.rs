use crate::models::is_valid_price;
use std::collections::{HashMap, VecDeque};

/// In-memory rolling price history per symbol
///
/// Maintains a bounded FIFO window for each symbol; insertion order is temporal order.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    data: HashMap<String, VecDeque<f64>>,
    capacity: usize,
}

impl HistoryStore {
    /// Create a new history store
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of prices to keep per symbol
    pub fn new(capacity: usize) -> Self {
        Self {
            data: HashMap::new(),
            capacity,
        }
    }

    /// Append a price for a symbol
    ///
    /// Non-positive or non-finite prices are discarded and `false` is returned.
    /// If the buffer is full, the oldest price is evicted.
    pub fn append(&mut self, symbol: &str, price: f64) -> bool {
        if !is_valid_price(price) {
            return false;
        }

        let prices = self
            .data
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity + 1));

        prices.push_back(price);

        while prices.len() > self.capacity {
            prices.pop_front();
        }

        true
    }

    /// Get the `n` most recent prices, oldest first
    pub fn window(&self, symbol: &str, n: usize) -> Vec<f64> {
        self.data
            .get(symbol)
            .map(|deque| {
                let skip = deque.len().saturating_sub(n);
                deque.iter().skip(skip).copied().collect()
            })
            .unwrap_or_default()
    }

    /// Get the whole retained history for a symbol
    pub fn all(&self, symbol: &str) -> Vec<f64> {
        self.window(symbol, self.capacity)
    }

    pub fn latest(&self, symbol: &str) -> Option<f64> {
        self.data.get(symbol).and_then(|d| d.back().copied())
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.data.get(symbol).map(|d| d.len()).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all data
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
