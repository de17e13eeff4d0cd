/// Percent change of `current` relative to `reference`, 0 when the reference is 0
pub fn percent_change(current: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        return 0.0;
    }
    (current - reference) / reference * 100.0
}

/// Decline of the latest price from the highest earlier price, in percent
///
/// The latest element is the current price and is excluded from the reference
/// window. Returns `None` with fewer than two prices.
pub fn drawdown_pct(history: &[f64]) -> Option<f64> {
    let (current, earlier) = history.split_last()?;
    let peak = earlier.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return None;
    }
    Some(percent_change(*current, peak))
}

/// Rise of the latest price above the lowest earlier price, in percent
pub fn gain_pct(history: &[f64]) -> Option<f64> {
    let (current, earlier) = history.split_last()?;
    let trough = earlier.iter().copied().fold(f64::INFINITY, f64::min);
    if !trough.is_finite() {
        return None;
    }
    Some(percent_change(*current, trough))
}

/// Change between the last two prices, in percent
pub fn last_change_pct(history: &[f64]) -> f64 {
    match history {
        [.., prev, last] => percent_change(*last, *prev),
        _ => 0.0,
    }
}
