use serde::Serialize;

use super::session::TradingSession;
use crate::indicators::last_change_pct;

/// Width of the per-symbol price sparkline
pub const SPARKLINE_LEN: usize = 10;

const SPARK_CHARS: [char; 7] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇'];

/// Point-in-time valuation of the paper portfolio
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PortfolioSnapshot {
    pub balance: f64,
    pub holdings_value: f64,
    pub equity: f64,
    pub profit_pct: f64,
    pub open_positions: usize,
}

impl PortfolioSnapshot {
    /// Value open positions at the last observed price of each symbol
    pub fn capture(session: &TradingSession) -> Self {
        let balance = session.book.balance();
        let holdings_value = session.book.holdings_value(&session.last_prices);
        let equity = balance + holdings_value;
        let initial = session.book.initial_balance();
        let profit_pct = if initial > 0.0 {
            (equity - initial) / initial * 100.0
        } else {
            0.0
        };

        Self {
            balance,
            holdings_value,
            equity,
            profit_pct,
            open_positions: session.book.open_positions().len(),
        }
    }
}

/// Render the last `len` prices as block characters, padded to `len`
pub fn sparkline(prices: &[f64], len: usize) -> String {
    let recent = &prices[prices.len().saturating_sub(len)..];
    if recent.is_empty() {
        return " ".repeat(len);
    }

    let min = recent.iter().copied().fold(f64::INFINITY, f64::min);
    let max = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let line: String = if max == min {
        "▪".repeat(recent.len())
    } else {
        let top = (SPARK_CHARS.len() - 1) as f64;
        recent
            .iter()
            .map(|p| {
                let idx = ((p - min) / (max - min) * top) as usize;
                SPARK_CHARS[idx.min(SPARK_CHARS.len() - 1)]
            })
            .collect()
    };

    let pad = len.saturating_sub(line.chars().count());
    format!("{}{}", line, " ".repeat(pad))
}

/// Price with precision scaled to magnitude
pub fn format_price(price: f64) -> String {
    if price < 0.0001 {
        format!("{:.8}", price)
    } else if price < 1.0 {
        format!("{:.6}", price)
    } else {
        with_thousands(&format!("{:.2}", price))
    }
}

pub fn format_qty(quantity: f64) -> String {
    if quantity <= 1e6 {
        format!("{:.3}", quantity)
    } else {
        format!("{:.2e}", quantity)
    }
}

fn with_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Log a portfolio summary followed by one line per symbol
pub fn log_status(session: &TradingSession) {
    let snapshot = PortfolioSnapshot::capture(session);
    let state = if session.running { "RUNNING" } else { "STOPPED" };

    tracing::info!(
        status = state,
        pass = session.pass_count,
        "📊 Balance: ${} | Portfolio: ${} | Profit: {:+.2}% | Open: {}",
        with_thousands(&format!("{:.2}", snapshot.balance)),
        with_thousands(&format!("{:.2}", snapshot.equity)),
        snapshot.profit_pct,
        snapshot.open_positions
    );

    for symbol in session.symbols() {
        let history = session.history.all(symbol);
        let Some(&price) = history.last() else {
            continue;
        };
        let quantity = session.book.get(symbol).map(|p| p.quantity).unwrap_or(0.0);
        let reason = session
            .advice
            .get(symbol)
            .map(|a| a.reason.to_lowercase())
            .unwrap_or_default();

        tracing::info!(
            "  {:<10} ${:>14} {:+6.2}% {} qty {:<10} ai: {}",
            symbol,
            format_price(price),
            last_change_pct(&history),
            sparkline(&history, SPARKLINE_LEN),
            format_qty(quantity),
            reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_sparkline_shapes() {
        assert_eq!(sparkline(&[], 10), " ".repeat(10));
        assert_eq!(sparkline(&[5.0, 5.0, 5.0], 3), "▪▪▪");
        assert_eq!(sparkline(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 7), "▁▂▃▄▅▆▇");
    }

    #[test]
    fn test_sparkline_uses_recent_window_and_pads() {
        let prices: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(sparkline(&prices, 10).chars().count(), 10);

        let line = sparkline(&[1.0, 2.0], 10);
        assert_eq!(line.chars().count(), 10);
        assert!(line.starts_with("▁▇"));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0.00001234), "0.00001234");
        assert_eq!(format_price(0.5), "0.500000");
        assert_eq!(format_price(65432.1), "65,432.10");
        assert_eq!(format_price(1234567.891), "1,234,567.89");
        assert_eq!(format_price(12.0), "12.00");
    }

    #[test]
    fn test_format_qty() {
        assert_eq!(format_qty(1.23456), "1.235");
        assert_eq!(format_qty(2_500_000.0), "2.50e6");
    }

    #[test]
    fn test_snapshot_values_open_positions() {
        let symbols = vec!["BTC_USDT".to_string()];
        let mut session = TradingSession::new(&symbols, 1000.0, 100);
        session.book.apply_buy("BTC_USDT", 100.0, 100.0, "", Utc::now()).unwrap();
        session.last_prices.insert("BTC_USDT".to_string(), 110.0);

        let snapshot = PortfolioSnapshot::capture(&session);
        assert_eq!(snapshot.balance, 900.0);
        assert_eq!(snapshot.holdings_value, 110.0);
        assert_eq!(snapshot.equity, 1010.0);
        assert!((snapshot.profit_pct - 1.0).abs() < 1e-9);
        assert_eq!(snapshot.open_positions, 1);
    }
}
