use chrono::{DateTime, Duration, Utc};

use crate::config::TradingConfig;
use crate::execution::Position;
use crate::indicators::drawdown_pct;
use crate::models::{AdvisorySignal, Signal};

/// History points needed before a drawdown entry is considered (current price included)
pub const MIN_ENTRY_HISTORY: usize = 3;

/// Thresholds for the flat/held transitions
#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub buy_drawdown_pct: f64,
    pub min_notional: f64,
    pub advisor_sell_fraction: f64,
    pub cooldown: Duration,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self::from_config(&TradingConfig::default())
    }
}

impl RuleConfig {
    pub fn from_config(config: &TradingConfig) -> Self {
        Self {
            stop_loss_pct: config.stop_loss_pct,
            take_profit_pct: config.take_profit_pct,
            buy_drawdown_pct: config.buy_drawdown_pct,
            min_notional: config.min_notional,
            advisor_sell_fraction: config.advisor_sell_fraction,
            cooldown: Duration::seconds(config.cooldown_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    AdvisorSell(String),
}

impl ExitReason {
    /// Reason written to the execution record
    pub fn label(&self) -> &str {
        match self {
            ExitReason::StopLoss => "Stop-Loss",
            ExitReason::TakeProfit => "Take-Profit",
            ExitReason::AdvisorSell(reason) => reason,
        }
    }

    /// Prefix used in trade notifications
    pub fn alert(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "STOP-LOSS",
            ExitReason::TakeProfit => "TAKE-PROFIT",
            ExitReason::AdvisorSell(_) => "AI SELL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    pub reason: ExitReason,
    pub quantity: f64,
    pub closes_position: bool,
}

/// Decide whether a held position should be sold at `price`
///
/// Precedence is stop-loss, then take-profit, then an advisor `sell`. Both
/// bounds are widened by `risk`, the current risk fraction. Stop-loss and
/// take-profit liquidate everything; an advisor sell liquidates
/// `advisor_sell_fraction` unless the remainder would be worth less than
/// `min_notional` ($10 by default), in which case the whole position goes.
pub fn evaluate_exit(
    position: &Position,
    price: f64,
    risk: f64,
    advice: Option<&AdvisorySignal>,
    rules: &RuleConfig,
) -> Option<ExitDecision> {
    let profit = position.profit_ratio(price)?;
    let full = |reason| ExitDecision {
        reason,
        quantity: position.quantity,
        closes_position: true,
    };

    if profit <= rules.stop_loss_pct - risk {
        return Some(full(ExitReason::StopLoss));
    }
    if profit >= rules.take_profit_pct + risk {
        return Some(full(ExitReason::TakeProfit));
    }

    let advice = advice.filter(|a| a.action == Signal::Sell)?;
    let reason = ExitReason::AdvisorSell(advice.reason.clone());
    let partial = position.quantity * rules.advisor_sell_fraction;
    let remainder = position.quantity - partial;

    if remainder * price < rules.min_notional {
        Some(full(reason))
    } else {
        Some(ExitDecision {
            reason,
            quantity: partial,
            closes_position: false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Holding,
    Cooldown,
    InsufficientHistory,
    DrawdownTooShallow,
    AdvisorDisagrees,
    BelowMinNotional,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    Buy { notional: f64 },
    Skip(SkipReason),
}

/// Decide whether a flat position should be opened
///
/// `history` ends with the current price. A buy needs no cooldown, a drawdown
/// from the earlier peak at or below `buy_drawdown_pct`, and either no consult
/// this pass or an advisor `buy`. The size is `balance * risk` and must reach
/// `min_notional`.
pub fn evaluate_entry(
    position: &Position,
    history: &[f64],
    balance: f64,
    risk: f64,
    advice: Option<&AdvisorySignal>,
    rules: &RuleConfig,
    now: DateTime<Utc>,
) -> EntryDecision {
    if position.is_held() {
        return EntryDecision::Skip(SkipReason::Holding);
    }
    if position.in_cooldown(now, rules.cooldown) {
        return EntryDecision::Skip(SkipReason::Cooldown);
    }
    if history.len() < MIN_ENTRY_HISTORY {
        return EntryDecision::Skip(SkipReason::InsufficientHistory);
    }

    match drawdown_pct(history) {
        Some(drop) if drop <= rules.buy_drawdown_pct => {}
        _ => return EntryDecision::Skip(SkipReason::DrawdownTooShallow),
    }

    if advice.is_some_and(|a| a.action != Signal::Buy) {
        return EntryDecision::Skip(SkipReason::AdvisorDisagrees);
    }

    let notional = balance * risk;
    if !(notional >= rules.min_notional) {
        return EntryDecision::Skip(SkipReason::BelowMinNotional);
    }

    EntryDecision::Buy { notional }
}
