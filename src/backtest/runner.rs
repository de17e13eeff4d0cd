use crate::advisor::AdvisorClient;
use crate::api::ClosePrice;
use crate::backtest::metrics::BacktestMetrics;
use crate::config::Settings;
use crate::engine::Engine;
use crate::error::BacktestError;
use crate::execution::{PriceMap, PriceSource};
use crate::notify::NullNotifier;
use crate::persistence::MemoryTradeLog;
use crate::strategy::MIN_ENTRY_HISTORY;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

/// Prices of every symbol observed at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFrame {
    pub timestamp: DateTime<Utc>,
    pub prices: PriceMap,
}

/// Merge per-symbol close series into time-ordered frames
///
/// A symbol missing at some timestamp is simply absent from that frame.
pub fn build_timeline(series: &HashMap<String, Vec<ClosePrice>>) -> Vec<PriceFrame> {
    let mut frames: BTreeMap<DateTime<Utc>, PriceMap> = BTreeMap::new();

    for (symbol, closes) in series {
        for close in closes {
            frames
                .entry(close.timestamp)
                .or_default()
                .insert(symbol.clone(), close.close);
        }
    }

    frames
        .into_iter()
        .map(|(timestamp, prices)| PriceFrame { timestamp, prices })
        .collect()
}

/// Price source that hands out one recorded frame per fetch
///
/// Once exhausted it returns empty snapshots, like a feed that is down.
pub struct ReplayFeed {
    frames: Mutex<VecDeque<PriceMap>>,
}

impl ReplayFeed {
    pub fn new(frames: impl IntoIterator<Item = PriceMap>) -> Self {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames
            .lock()
            .map(|f| f.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

#[async_trait]
impl PriceSource for ReplayFeed {
    async fn fetch_all(&self) -> PriceMap {
        let mut frames = self
            .frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        frames.pop_front().unwrap_or_default()
    }
}

/// Replays a price timeline through the live decision engine
///
/// The advisor is disabled so runs are offline and deterministic. Frame
/// timestamps drive the clock, so cooldowns behave as they would live.
pub struct BacktestRunner {
    settings: Settings,
}

impl BacktestRunner {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub async fn run(&self, timeline: Vec<PriceFrame>) -> Result<BacktestMetrics, BacktestError> {
        if timeline.len() < MIN_ENTRY_HISTORY {
            return Err(BacktestError::NotEnoughData {
                needed: MIN_ENTRY_HISTORY,
                got: timeline.len(),
            });
        }

        let symbols: BTreeSet<String> = timeline
            .iter()
            .flat_map(|frame| frame.prices.keys().cloned())
            .collect();

        let mut settings = self.settings.clone();
        settings.trading.symbols = symbols.into_iter().collect();
        let initial_balance = settings.trading.initial_balance;

        tracing::info!(
            frames = timeline.len(),
            symbols = settings.trading.symbols.len(),
            "Starting backtest"
        );

        let trade_log = MemoryTradeLog::new();
        let feed = ReplayFeed::new(timeline.iter().map(|frame| frame.prices.clone()));
        let mut engine = Engine::new(
            &settings,
            Box::new(feed),
            Box::new(AdvisorClient::disabled(&settings.advisor)),
            Box::new(trade_log.clone()),
            Box::new(NullNotifier),
        );

        let mut equity_curve = Vec::with_capacity(timeline.len());
        let mut resets = 0;

        for frame in &timeline {
            let report = engine.run_pass(frame.timestamp).await;
            if report.reset {
                resets += 1;
            }

            let session = engine.session();
            equity_curve.push(session.book.equity(&session.last_prices));
        }

        let metrics =
            BacktestMetrics::from_run(trade_log.records(), &equity_curve, initial_balance, resets);

        tracing::info!(
            "Backtest complete: {} trades, P&L: ${:.2} ({:.2}%)",
            metrics.total_trades,
            metrics.total_pnl,
            metrics.total_return_pct
        );

        Ok(metrics)
    }

    /// Run and print the report
    pub async fn run_and_report(
        &self,
        timeline: Vec<PriceFrame>,
        scenario_name: &str,
    ) -> Result<BacktestMetrics, BacktestError> {
        println!("\n🔬 Running backtest: {}", scenario_name);
        println!("   Frames: {}", timeline.len());
        println!(
            "   Initial Balance: ${:.2}",
            self.settings.trading.initial_balance
        );

        let metrics = self.run(timeline).await?;
        metrics.print_report();

        Ok(metrics)
    }
}
