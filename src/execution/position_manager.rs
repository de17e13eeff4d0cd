use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::BookError;
use crate::models::{is_valid_price, ExecutionRecord, TradeSide};

/// Quantities at or below this are treated as fully liquidated
const DUST_QUANTITY: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Flat,
    Held,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,                    // meaningful only while held
    pub last_buy_at: Option<DateTime<Utc>>, // cooldown anchor, survives closing
}

impl Position {
    fn flat(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity: 0.0,
            entry_price: 0.0,
            last_buy_at: None,
        }
    }

    pub fn status(&self) -> PositionStatus {
        if self.quantity > 0.0 {
            PositionStatus::Held
        } else {
            PositionStatus::Flat
        }
    }

    pub fn is_held(&self) -> bool {
        self.status() == PositionStatus::Held
    }

    /// `(price - entry) / entry`, or `None` without a valid position
    pub fn profit_ratio(&self, price: f64) -> Option<f64> {
        if !self.is_held() || self.entry_price <= 0.0 {
            return None;
        }
        Some((price - self.entry_price) / self.entry_price)
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_buy_at
            .map(|bought| now - bought < cooldown)
            .unwrap_or(false)
    }
}

/// Virtual cash balance plus exactly one position per watched symbol
///
/// All balance mutation goes through `apply_buy`, `apply_sell` and `reset`.
#[derive(Debug, Clone)]
pub struct PositionManager {
    symbols: Vec<String>,
    positions: HashMap<String, Position>,
    balance: f64,
    initial_balance: f64,
}

impl PositionManager {
    pub fn new(symbols: &[String], initial_balance: f64) -> Self {
        let positions = symbols
            .iter()
            .map(|s| (s.clone(), Position::flat(s)))
            .collect();

        Self {
            symbols: symbols.to_vec(),
            positions,
            balance: initial_balance,
            initial_balance,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn is_watched(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Positions in configured symbol order
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.symbols.iter().filter_map(|s| self.positions.get(s))
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        self.positions().filter(|p| p.is_held()).collect()
    }

    /// Debit `notional` from the balance and open a position at `price`
    pub fn apply_buy(
        &mut self,
        symbol: &str,
        price: f64,
        notional: f64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ExecutionRecord, BookError> {
        if !is_valid_price(price) {
            return Err(BookError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }
        if !(notional.is_finite() && notional > 0.0) || notional > self.balance {
            return Err(BookError::InsufficientBalance {
                required: notional,
                available: self.balance,
            });
        }

        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| BookError::UnknownSymbol(symbol.to_string()))?;

        if position.is_held() {
            return Err(BookError::AlreadyHeld(symbol.to_string()));
        }

        let quantity = notional / price;

        position.quantity = quantity;
        position.entry_price = price;
        position.last_buy_at = Some(now);
        self.balance -= notional;

        Ok(ExecutionRecord {
            id: Uuid::new_v4(),
            timestamp: now,
            symbol: symbol.to_string(),
            side: TradeSide::Buy,
            price,
            quantity,
            balance: self.balance,
            profit_pct: None,
            reason: reason.to_string(),
        })
    }

    /// Sell up to `quantity` units at `price` and credit the proceeds
    ///
    /// Selling everything returns the symbol to flat. A partial sale keeps the
    /// per-unit entry price.
    pub fn apply_sell(
        &mut self,
        symbol: &str,
        price: f64,
        quantity: f64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ExecutionRecord, BookError> {
        if !is_valid_price(price) {
            return Err(BookError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }

        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| BookError::UnknownSymbol(symbol.to_string()))?;

        if !position.is_held() || !(quantity > 0.0) {
            return Err(BookError::NotHeld(symbol.to_string()));
        }

        let sold = quantity.min(position.quantity);
        let profit_pct = position
            .profit_ratio(price)
            .map(|ratio| ratio * 100.0);

        position.quantity -= sold;
        if position.quantity <= DUST_QUANTITY {
            position.quantity = 0.0;
            position.entry_price = 0.0;
        }
        self.balance += sold * price;

        Ok(ExecutionRecord {
            id: Uuid::new_v4(),
            timestamp: now,
            symbol: symbol.to_string(),
            side: TradeSide::Sell,
            price,
            quantity: sold,
            balance: self.balance,
            profit_pct,
            reason: reason.to_string(),
        })
    }

    /// Restore the initial balance and flatten every position, cooldowns included
    pub fn reset(&mut self) {
        self.balance = self.initial_balance;
        for symbol in &self.symbols {
            self.positions.insert(symbol.clone(), Position::flat(symbol));
        }
    }

    /// Mark-to-market value of open positions; symbols without a price count as zero
    pub fn holdings_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.open_positions()
            .iter()
            .filter_map(|p| prices.get(&p.symbol).map(|price| p.quantity * price))
            .sum()
    }

    /// Cash plus holdings
    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        self.balance + self.holdings_value(prices)
    }
}
