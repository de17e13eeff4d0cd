// Decision loop and operator command handling
pub mod commands;
pub mod report;
pub mod session;

pub use commands::{forward_commands, normalize_symbol, Command};
pub use report::{format_price, format_qty, log_status, sparkline, PortfolioSnapshot};
pub use session::TradingSession;

use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::advisor::Advisor;
use crate::config::Settings;
use crate::execution::PriceSource;
use crate::indicators::{drawdown_pct, gain_pct};
use crate::models::{is_valid_price, AdvisorySignal, ExecutionRecord, PriceTick};
use crate::notify::Notifier;
use crate::persistence::TradeLog;
use crate::risk::RiskModel;
use crate::strategy::{evaluate_entry, evaluate_exit, EntryDecision, RuleConfig};

/// Smallest balance that still allows a forced buy
const MIN_FORCED_BUY_BALANCE: f64 = 10.0;

/// What one decision pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub pass: u64,
    pub reset: bool,
    pub consulted: Vec<String>,
    pub skipped: Vec<String>,
    pub records: Vec<ExecutionRecord>,
}

/// Result of applying one operator command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Started,
    Stopped,
    Reset,
    Executed(ExecutionRecord),
    Rejected(String),
}

/// Timing and sizing knobs the engine reads on every pass
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub update_interval: Duration,
    pub consult_interval: u64,
    pub consult_min_history: usize,
    pub forced_buy_pct: f64,
    pub forced_buy_cap: f64,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            update_interval: Duration::from_secs(settings.trading.update_interval_secs.max(1)),
            consult_interval: settings.advisor.consult_interval.max(1),
            consult_min_history: settings.advisor.min_history,
            forced_buy_pct: settings.trading.forced_buy_pct,
            forced_buy_cap: settings.trading.forced_buy_cap,
        }
    }
}

/// Single owner of trading state
///
/// Decision passes and operator commands both run on the engine's task, so at
/// most one mutation is in flight at any time. Collaborators sit behind trait
/// objects so backtests and tests can swap them out.
pub struct Engine {
    config: EngineConfig,
    rules: RuleConfig,
    risk: RiskModel,
    session: TradingSession,
    feed: Box<dyn PriceSource>,
    advisor: Box<dyn Advisor>,
    trade_log: Box<dyn TradeLog>,
    notifier: Box<dyn Notifier>,
}

impl Engine {
    pub fn new(
        settings: &Settings,
        feed: Box<dyn PriceSource>,
        advisor: Box<dyn Advisor>,
        trade_log: Box<dyn TradeLog>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let trading = &settings.trading;

        Self {
            config: EngineConfig::from_settings(settings),
            rules: RuleConfig::from_config(trading),
            risk: RiskModel::from_config(trading),
            session: TradingSession::new(
                &trading.symbols,
                trading.initial_balance,
                trading.history_capacity,
            ),
            feed,
            advisor,
            trade_log,
            notifier,
        }
    }

    /// Start paused or running
    pub fn with_running(mut self, running: bool) -> Self {
        self.session.running = running;
        self
    }

    pub fn session(&self) -> &TradingSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TradingSession {
        &mut self.session
    }

    pub fn is_running(&self) -> bool {
        self.session.running
    }

    /// Run one evaluation over every watched symbol
    ///
    /// A depleted balance resets the whole session before any symbol is
    /// evaluated. Symbols without a usable price this pass are skipped
    /// untouched.
    pub async fn run_pass(&mut self, now: DateTime<Utc>) -> PassReport {
        let prices = self.feed.fetch_all().await;
        let mut report = PassReport::default();

        if self.session.book.balance() <= 0.0 {
            tracing::warn!(
                balance = self.session.book.balance(),
                "Balance depleted, resetting session"
            );
            self.session.reset();
            self.notifier.notify("AUTO-RESET: Balance was $0");
            report.reset = true;
        }

        self.session.pass_count += 1;
        report.pass = self.session.pass_count;

        let consult_due = self.advisor.is_enabled()
            && self.session.pass_count % self.config.consult_interval == 0;

        if prices.is_empty() {
            tracing::warn!(pass = report.pass, "No prices this pass, skipping all symbols");
        }

        let symbols = self.session.symbols().to_vec();
        for symbol in &symbols {
            match prices
                .get(symbol)
                .and_then(|price| PriceTick::new(symbol.as_str(), *price, now))
            {
                Some(tick) => self.evaluate_symbol(&tick, consult_due, &mut report).await,
                None => report.skipped.push(symbol.clone()),
            }
        }

        tracing::debug!(
            pass = report.pass,
            trades = report.records.len(),
            consulted = report.consulted.len(),
            skipped = report.skipped.len(),
            "Pass complete"
        );

        report
    }

    async fn evaluate_symbol(&mut self, tick: &PriceTick, consult_due: bool, report: &mut PassReport) {
        let (symbol, price, now) = (tick.symbol.as_str(), tick.price, tick.timestamp);

        self.session.history.append(symbol, price);
        self.session.last_prices.insert(symbol.to_string(), price);
        let history = self.session.history.all(symbol);

        let advice = if consult_due && history.len() >= self.config.consult_min_history {
            let signal = self.consult(symbol, &history).await;
            report.consulted.push(symbol.to_string());
            Some(signal)
        } else {
            None
        };

        let risk = self.risk.risk_fraction(&history);

        let exit = self
            .session
            .book
            .get(symbol)
            .and_then(|p| evaluate_exit(p, price, risk, advice.as_ref(), &self.rules));

        if let Some(exit) = exit {
            match self
                .session
                .book
                .apply_sell(symbol, price, exit.quantity, exit.reason.label(), now)
            {
                Ok(record) => {
                    tracing::info!(
                        symbol = %symbol,
                        price = price,
                        quantity = record.quantity,
                        profit_pct = record.profit_pct.unwrap_or(0.0),
                        full = exit.closes_position,
                        "🔴 {} {}",
                        exit.reason.alert(),
                        symbol
                    );
                    self.notifier
                        .notify(&format!("{} {} @ ${:.2}", exit.reason.alert(), symbol, price));
                    self.record(record, report);
                }
                Err(e) => tracing::warn!(symbol = %symbol, "Sell rejected: {}", e),
            }
        }

        // re-read after any exit; a closed position may qualify for entry again
        let Some(position) = self.session.book.get(symbol) else {
            return;
        };
        let decision = evaluate_entry(
            position,
            &history,
            self.session.book.balance(),
            risk,
            advice.as_ref(),
            &self.rules,
            now,
        );

        match decision {
            EntryDecision::Buy { notional } => {
                let reason = match &advice {
                    Some(signal) => signal.reason.clone(),
                    None => format!("Drawdown {:.2}%", drawdown_pct(&history).unwrap_or(0.0)),
                };

                match self
                    .session
                    .book
                    .apply_buy(symbol, price, notional, &reason, now)
                {
                    Ok(record) => {
                        tracing::info!(
                            symbol = %symbol,
                            price = price,
                            notional = notional,
                            risk = risk,
                            "🟢 BUY {}",
                            symbol
                        );
                        self.notifier
                            .notify(&format!("BUY {} @ ${:.2}", symbol, price));
                        self.record(record, report);
                    }
                    Err(e) => tracing::warn!(symbol = %symbol, "Buy rejected: {}", e),
                }
            }
            EntryDecision::Skip(reason) => {
                tracing::trace!(symbol = %symbol, reason = ?reason, "No entry");
            }
        }
    }

    async fn consult(&mut self, symbol: &str, history: &[f64]) -> AdvisorySignal {
        let drop = drawdown_pct(history).unwrap_or(0.0);
        let gain = gain_pct(history).unwrap_or(0.0);

        let signal = self.advisor.consult(symbol, history, drop, gain).await;
        tracing::info!(
            symbol = %symbol,
            signal = %signal.action,
            reason = %signal.reason,
            "🤖 Advisor consulted"
        );

        self.session
            .advice
            .insert(symbol.to_string(), signal.clone());
        signal
    }

    fn record(&mut self, record: ExecutionRecord, report: &mut PassReport) {
        if let Err(e) = self.trade_log.append(&record) {
            tracing::error!(symbol = %record.symbol, "Failed to log trade: {}", e);
        }
        report.records.push(record);
    }

    /// Apply one operator command between passes
    pub async fn apply_command(&mut self, command: Command, now: DateTime<Utc>) -> CommandOutcome {
        match command {
            Command::Start => {
                self.session.running = true;
                self.notifier.notify("Bot STARTED");
                CommandOutcome::Started
            }
            Command::Stop => {
                self.session.running = false;
                self.notifier.notify("Bot STOPPED");
                CommandOutcome::Stopped
            }
            Command::Reset => {
                self.session.reset();
                self.notifier.notify("Reset complete");
                CommandOutcome::Reset
            }
            Command::ForceBuy(symbol) => self.force_buy(&symbol, now).await,
            Command::ForceSell(symbol) => self.force_sell(&symbol, now).await,
        }
    }

    /// Buy at a fixed share of the balance, ignoring cooldown and advice
    async fn force_buy(&mut self, symbol: &str, now: DateTime<Utc>) -> CommandOutcome {
        if !self.session.book.is_watched(symbol) {
            return self.reject(format!("{} not watched", symbol));
        }
        if self.session.book.get(symbol).is_some_and(|p| p.is_held()) {
            return self.reject(format!("{} already held", symbol));
        }

        let balance = self.session.book.balance();
        if balance <= MIN_FORCED_BUY_BALANCE {
            return self.reject(format!("Balance ${:.2} too low for a forced buy", balance));
        }

        let Some(price) = self.fresh_price(symbol).await else {
            return self.reject("Price fetch failed".to_string());
        };

        let notional = (balance * self.config.forced_buy_pct).min(self.config.forced_buy_cap);
        match self
            .session
            .book
            .apply_buy(symbol, price, notional, "Forced buy", now)
        {
            Ok(record) => {
                tracing::info!(symbol = %symbol, price = price, notional = notional, "🟢 FORCED BUY");
                self.notifier
                    .notify(&format!("FORCED BUY {:.6} {}", record.quantity, symbol));
                self.log_record(&record);
                CommandOutcome::Executed(record)
            }
            Err(e) => self.reject(e.to_string()),
        }
    }

    /// Liquidate the whole position; a flat symbol is left untouched
    async fn force_sell(&mut self, symbol: &str, now: DateTime<Utc>) -> CommandOutcome {
        if !self.session.book.is_watched(symbol) {
            return self.reject(format!("{} not watched", symbol));
        }

        let quantity = match self.session.book.get(symbol) {
            Some(position) if position.is_held() => position.quantity,
            _ => return self.reject(format!("No open position for {}", symbol)),
        };

        let Some(price) = self.fresh_price(symbol).await else {
            return self.reject("Price fetch failed".to_string());
        };

        match self
            .session
            .book
            .apply_sell(symbol, price, quantity, "Forced sell", now)
        {
            Ok(record) => {
                tracing::info!(symbol = %symbol, price = price, quantity = quantity, "🔴 FORCED SELL");
                self.notifier
                    .notify(&format!("FORCED SELL {:.6} {}", record.quantity, symbol));
                self.log_record(&record);
                CommandOutcome::Executed(record)
            }
            Err(e) => self.reject(e.to_string()),
        }
    }

    async fn fresh_price(&mut self, symbol: &str) -> Option<f64> {
        let prices = self.feed.fetch_all().await;
        let price = prices.get(symbol).copied().filter(|p| is_valid_price(*p))?;
        self.session.last_prices.insert(symbol.to_string(), price);
        Some(price)
    }

    fn log_record(&mut self, record: &ExecutionRecord) {
        if let Err(e) = self.trade_log.append(record) {
            tracing::error!(symbol = %record.symbol, "Failed to log trade: {}", e);
        }
    }

    fn reject(&self, message: String) -> CommandOutcome {
        tracing::warn!("Command rejected: {}", message);
        CommandOutcome::Rejected(message)
    }

    /// Drive passes on a fixed interval while applying queued commands
    ///
    /// Stops when `shutdown` resolves. A closed command channel only disables
    /// command handling; passes keep running.
    pub async fn run<S>(&mut self, mut commands: mpsc::Receiver<Command>, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = interval(self.config.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut commands_open = true;

        tracing::info!(
            interval_secs = self.config.update_interval.as_secs(),
            symbols = self.session.symbols().len(),
            running = self.session.running,
            "💹 Decision loop starting"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Decision loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if self.session.running {
                        self.run_pass(Utc::now()).await;
                        log_status(&self.session);
                    }
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(command) => {
                            tracing::info!(command = ?command, "Applying command");
                            self.apply_command(command, Utc::now()).await;
                            log_status(&self.session);
                        }
                        None => {
                            tracing::debug!("Command channel closed, continuing without input");
                            commands_open = false;
                        }
                    }
                }
            }
        }
    }
}
