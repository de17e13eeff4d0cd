use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use paperbot::advisor::Advisor;
use paperbot::engine::{Command, CommandOutcome, Engine};
use paperbot::execution::{PriceMap, PriceSource};
use paperbot::notify::Notifier;
use paperbot::persistence::{CsvTradeLog, MemoryTradeLog};
use paperbot::{AdvisorySignal, Settings, Signal, TradeSide};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const BTC: &str = "BTC_USDT";
const ETH: &str = "ETH_USDT";

/// Hands out one scripted frame per fetch and repeats the last one forever
#[derive(Clone, Default)]
struct ScriptedFeed {
    frames: Arc<Mutex<VecDeque<PriceMap>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedFeed {
    fn new(frames: &[&[(&str, f64)]]) -> Self {
        let frames = frames
            .iter()
            .map(|frame| frame.iter().map(|(s, p)| (s.to_string(), *p)).collect())
            .collect();

        Self {
            frames: Arc::new(Mutex::new(frames)),
            calls: Arc::default(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ScriptedFeed {
    async fn fetch_all(&self) -> PriceMap {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut frames = self.frames.lock().unwrap();
        if frames.len() > 1 {
            frames.pop_front().unwrap_or_default()
        } else {
            frames.front().cloned().unwrap_or_default()
        }
    }
}

/// Always answers with the same signal
#[derive(Clone)]
struct FixedAdvisor {
    signal: Option<AdvisorySignal>,
    calls: Arc<AtomicUsize>,
}

impl FixedAdvisor {
    fn answering(action: Signal, reason: &str) -> Self {
        Self {
            signal: Some(AdvisorySignal::new(action, reason, "")),
            calls: Arc::default(),
        }
    }

    fn disabled() -> Self {
        Self {
            signal: None,
            calls: Arc::default(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Advisor for FixedAdvisor {
    async fn consult(&self, _: &str, _: &[f64], _: f64, _: f64) -> AdvisorySignal {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.signal
            .clone()
            .unwrap_or_else(|| AdvisorySignal::hold("no key"))
    }

    fn is_enabled(&self) -> bool {
        self.signal.is_some()
    }
}

#[derive(Clone, Default)]
struct Alerts(Arc<Mutex<Vec<String>>>);

impl Alerts {
    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for Alerts {
    fn notify(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

struct Harness {
    engine: Engine,
    feed: ScriptedFeed,
    advisor: FixedAdvisor,
    log: MemoryTradeLog,
    alerts: Alerts,
}

fn settings(symbols: &[&str], balance: f64) -> Settings {
    let mut settings = Settings::default();
    settings.trading.symbols = symbols.iter().map(|s| s.to_string()).collect();
    settings.trading.initial_balance = balance;
    settings.advisor.consult_interval = 1;
    settings
}

fn harness(settings: &Settings, feed: ScriptedFeed, advisor: FixedAdvisor) -> Harness {
    let log = MemoryTradeLog::new();
    let alerts = Alerts::default();
    let engine = Engine::new(
        settings,
        Box::new(feed.clone()),
        Box::new(advisor.clone()),
        Box::new(log.clone()),
        Box::new(alerts.clone()),
    );

    Harness {
        engine,
        feed,
        advisor,
        log,
        alerts,
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Open a position and seed two flat history points directly on the session
fn seed_position(engine: &mut Engine, symbol: &str, entry: f64, notional: f64) {
    let session = engine.session_mut();
    session
        .book
        .apply_buy(symbol, entry, notional, "seed", t0())
        .unwrap();
    session.history.append(symbol, entry);
    session.history.append(symbol, entry);
}

#[tokio::test]
async fn test_stop_loss_wins_over_advisor_buy() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 90.0)]]),
        FixedAdvisor::answering(Signal::Buy, "bounce expected"),
    );
    seed_position(&mut h.engine, BTC, 100.0, 1000.0);

    let report = h.engine.run_pass(t0() + Duration::minutes(1)).await;

    assert_eq!(report.consulted, vec![BTC.to_string()]);
    assert_eq!(report.records.len(), 1, "cooldown still blocks the advisor buy");

    let sell = &report.records[0];
    assert_eq!(sell.side, TradeSide::Sell);
    assert_eq!(sell.reason, "Stop-Loss");
    assert!((sell.quantity - 10.0).abs() < 1e-9);
    assert!((sell.profit_pct.unwrap() + 10.0).abs() < 1e-9);

    let session = h.engine.session();
    assert!(!session.book.get(BTC).unwrap().is_held());
    assert!((session.book.balance() - 9_900.0).abs() < 1e-6);
    assert_eq!(session.advice[BTC].action, Signal::Buy);

    assert_eq!(h.log.len(), 1);
    assert!(h.alerts.all().contains(&"STOP-LOSS BTC_USDT @ $90.00".to_string()));
}

#[tokio::test]
async fn test_take_profit_closes_position() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 120.0)]]),
        FixedAdvisor::disabled(),
    );
    seed_position(&mut h.engine, BTC, 100.0, 1000.0);

    let report = h.engine.run_pass(t0() + Duration::minutes(1)).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].reason, "Take-Profit");
    assert!((report.records[0].profit_pct.unwrap() - 20.0).abs() < 1e-9);
    assert!((h.engine.session().book.balance() - 10_200.0).abs() < 1e-6);
    assert!(report.consulted.is_empty());
}

#[tokio::test]
async fn test_advisor_sell_liquidates_half() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 101.0)]]),
        FixedAdvisor::answering(Signal::Sell, "momentum fading"),
    );
    seed_position(&mut h.engine, BTC, 100.0, 1000.0);

    let report = h.engine.run_pass(t0() + Duration::minutes(1)).await;

    assert_eq!(report.records.len(), 1);
    let sell = &report.records[0];
    assert_eq!(sell.reason, "momentum fading");
    assert!((sell.quantity - 5.0).abs() < 1e-9);

    let position = h.engine.session().book.get(BTC).unwrap();
    assert!(position.is_held());
    assert!((position.quantity - 5.0).abs() < 1e-9);
    assert_eq!(position.entry_price, 100.0);
    assert!(h.alerts.all().contains(&"AI SELL BTC_USDT @ $101.00".to_string()));
}

#[tokio::test]
async fn test_shallow_drawdown_does_not_buy() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 99.7)], &[(BTC, 99.0)]]),
        FixedAdvisor::disabled(),
    );
    h.engine.session_mut().history.append(BTC, 100.0);
    h.engine.session_mut().history.append(BTC, 100.0);

    let first = h.engine.run_pass(t0()).await;
    assert!(first.records.is_empty(), "-0.3% is above the -0.5% gate");

    let second = h.engine.run_pass(t0() + Duration::seconds(10)).await;
    assert_eq!(second.records.len(), 1);

    let buy = &second.records[0];
    assert_eq!(buy.side, TradeSide::Buy);
    assert_eq!(buy.reason, "Drawdown -1.00%");
    // volatile enough for the 3% ceiling
    assert!((buy.notional() - 300.0).abs() < 1e-6);
    assert!((h.engine.session().book.balance() - 9_700.0).abs() < 1e-6);
    assert!(h.alerts.all().contains(&"BUY BTC_USDT @ $99.00".to_string()));
    assert_eq!(h.advisor.calls(), 0);
}

#[tokio::test]
async fn test_advisor_hold_vetoes_entry() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 98.0)]]),
        FixedAdvisor::answering(Signal::Hold, "wait for confirmation"),
    );
    h.engine.session_mut().history.append(BTC, 100.0);
    h.engine.session_mut().history.append(BTC, 100.0);

    let report = h.engine.run_pass(t0()).await;

    assert_eq!(report.consulted, vec![BTC.to_string()]);
    assert!(report.records.is_empty());
    assert_eq!(h.engine.session().advice[BTC].reason, "wait for confirmation");
}

#[tokio::test]
async fn test_advisor_buy_reason_is_recorded() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 98.0)]]),
        FixedAdvisor::answering(Signal::Buy, "oversold"),
    );
    h.engine.session_mut().history.append(BTC, 100.0);
    h.engine.session_mut().history.append(BTC, 100.0);

    let report = h.engine.run_pass(t0()).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].reason, "oversold");
}

#[tokio::test]
async fn test_cooldown_blocks_rebuy_after_exit() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 90.0)], &[(BTC, 89.0)], &[(BTC, 88.0)]]),
        FixedAdvisor::disabled(),
    );
    seed_position(&mut h.engine, BTC, 100.0, 1000.0);

    let exit = h.engine.run_pass(t0() + Duration::minutes(1)).await;
    assert_eq!(exit.records[0].reason, "Stop-Loss");

    let cooling = h.engine.run_pass(t0() + Duration::minutes(2)).await;
    assert!(cooling.records.is_empty(), "bought less than 300s ago");

    let rebuy = h.engine.run_pass(t0() + Duration::minutes(6)).await;
    assert_eq!(rebuy.records.len(), 1);
    assert_eq!(rebuy.records[0].side, TradeSide::Buy);
    assert!((rebuy.records[0].notional() - 9_900.0 * 0.03).abs() < 1e-6);
}

#[tokio::test]
async fn test_exit_after_cooldown_rebuys_in_same_pass() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 90.0)]]),
        FixedAdvisor::disabled(),
    );
    let session = h.engine.session_mut();
    session.book.apply_buy(BTC, 100.0, 1000.0, "seed", t0()).unwrap();
    session.history.append(BTC, 101.0);
    session.history.append(BTC, 100.0);

    let report = h.engine.run_pass(t0() + Duration::minutes(10)).await;

    let trades: Vec<(TradeSide, &str)> = report
        .records
        .iter()
        .map(|r| (r.side, r.reason.as_str()))
        .collect();
    assert_eq!(
        trades,
        vec![
            (TradeSide::Sell, "Stop-Loss"),
            (TradeSide::Buy, "Drawdown -10.89%"),
        ]
    );
    assert!((report.records[1].notional() - 9_900.0 * 0.03).abs() < 1e-6);

    let position = h.engine.session().book.get(BTC).unwrap();
    assert!(position.is_held());
    assert_eq!(position.entry_price, 90.0);
    assert_eq!(h.log.len(), 2);
}

#[tokio::test]
async fn test_depleted_balance_resets_before_evaluation() {
    let settings = settings(&[BTC], 1_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 100.0)]]),
        FixedAdvisor::disabled(),
    );
    seed_position(&mut h.engine, BTC, 100.0, 1_000.0);
    assert_eq!(h.engine.session().book.balance(), 0.0);

    let report = h.engine.run_pass(t0() + Duration::minutes(1)).await;

    assert!(report.reset);
    assert_eq!(report.pass, 1);
    assert!(report.records.is_empty());

    let session = h.engine.session();
    assert_eq!(session.book.balance(), 1_000.0);
    assert!(session.book.open_positions().is_empty());
    // only the price seen after the reset survives
    assert_eq!(session.history.all(BTC), vec![100.0]);
    assert!(h.alerts.all().contains(&"AUTO-RESET: Balance was $0".to_string()));
}

#[tokio::test]
async fn test_missing_and_invalid_prices_are_skipped() {
    let settings = settings(&[BTC, ETH, "SOL_USDT"], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 65_000.0), (ETH, 0.0)]]),
        FixedAdvisor::disabled(),
    );

    let report = h.engine.run_pass(t0()).await;

    assert_eq!(report.skipped, vec![ETH.to_string(), "SOL_USDT".to_string()]);
    let session = h.engine.session();
    assert_eq!(session.history.len(BTC), 1);
    assert_eq!(session.history.len(ETH), 0);
    assert!(!session.last_prices.contains_key(ETH));
}

#[tokio::test]
async fn test_empty_feed_changes_nothing() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(&settings, ScriptedFeed::new(&[]), FixedAdvisor::disabled());
    seed_position(&mut h.engine, BTC, 100.0, 1000.0);

    let report = h.engine.run_pass(t0()).await;

    assert_eq!(report.skipped, vec![BTC.to_string()]);
    assert!(report.records.is_empty());
    assert_eq!(h.engine.session().history.len(BTC), 2);
    assert_eq!(h.engine.session().book.balance(), 9_000.0);
}

#[tokio::test]
async fn test_advisor_consulted_every_nth_pass() {
    let mut settings = settings(&[BTC], 10_000.0);
    settings.advisor.consult_interval = 3;
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 100.0)]]),
        FixedAdvisor::answering(Signal::Hold, "flat market"),
    );
    h.engine.session_mut().history.append(BTC, 100.0);
    h.engine.session_mut().history.append(BTC, 100.0);

    let mut consulted_on = Vec::new();
    for i in 0..6 {
        let report = h.engine.run_pass(t0() + Duration::seconds(10 * i)).await;
        if !report.consulted.is_empty() {
            consulted_on.push(report.pass);
        }
    }

    assert_eq!(consulted_on, vec![3, 6]);
    assert_eq!(h.advisor.calls(), 2);
}

#[tokio::test]
async fn test_consult_waits_for_min_history() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 100.0)]]),
        FixedAdvisor::answering(Signal::Hold, "flat market"),
    );

    for i in 0..3 {
        h.engine.run_pass(t0() + Duration::seconds(10 * i)).await;
    }

    // passes one and two have fewer than three prices
    assert_eq!(h.advisor.calls(), 1);
}

#[tokio::test]
async fn test_force_buy_is_capped() {
    let settings = settings(&[BTC], 1_000_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 50_000.0)]]),
        FixedAdvisor::disabled(),
    );

    let outcome = h
        .engine
        .apply_command(Command::ForceBuy(BTC.to_string()), t0())
        .await;

    let CommandOutcome::Executed(record) = outcome else {
        panic!("expected a forced buy, got {:?}", outcome);
    };
    assert_eq!(record.side, TradeSide::Buy);
    assert_eq!(record.reason, "Forced buy");
    assert!((record.notional() - 1_000.0).abs() < 1e-6);
    assert!((record.quantity - 0.02).abs() < 1e-12);
    assert!(h.alerts.all().contains(&"FORCED BUY 0.020000 BTC_USDT".to_string()));
    assert_eq!(h.log.len(), 1);
}

#[tokio::test]
async fn test_force_buy_sizes_small_balances_by_percent() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 100.0)]]),
        FixedAdvisor::disabled(),
    );

    let outcome = h
        .engine
        .apply_command(Command::ForceBuy(BTC.to_string()), t0())
        .await;

    let CommandOutcome::Executed(record) = outcome else {
        panic!("expected a forced buy, got {:?}", outcome);
    };
    assert!((record.notional() - 300.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_force_buy_rejected_while_held() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 100.0)]]),
        FixedAdvisor::disabled(),
    );
    seed_position(&mut h.engine, BTC, 100.0, 1000.0);

    let outcome = h
        .engine
        .apply_command(Command::ForceBuy(BTC.to_string()), t0())
        .await;

    assert!(matches!(outcome, CommandOutcome::Rejected(_)));
    assert_eq!(h.engine.session().book.balance(), 9_000.0);
    assert!(h.log.is_empty());
}

#[tokio::test]
async fn test_force_buy_on_unwatched_symbol_is_rejected() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[("DOGE_USDT", 0.1)]]),
        FixedAdvisor::disabled(),
    );

    let outcome = h
        .engine
        .apply_command(Command::ForceBuy("DOGE_USDT".to_string()), t0())
        .await;

    assert!(matches!(outcome, CommandOutcome::Rejected(_)));
    assert_eq!(h.feed.calls(), 0);
}

#[tokio::test]
async fn test_force_sell_is_idempotent() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 110.0)]]),
        FixedAdvisor::disabled(),
    );
    seed_position(&mut h.engine, BTC, 100.0, 1000.0);

    let first = h
        .engine
        .apply_command(Command::ForceSell(BTC.to_string()), t0())
        .await;
    let CommandOutcome::Executed(record) = first else {
        panic!("expected a forced sell, got {:?}", first);
    };
    assert_eq!(record.reason, "Forced sell");
    assert!((record.quantity - 10.0).abs() < 1e-9);
    assert!((h.engine.session().book.balance() - 10_100.0).abs() < 1e-6);

    let calls = h.feed.calls();
    let second = h
        .engine
        .apply_command(Command::ForceSell(BTC.to_string()), t0())
        .await;

    assert!(matches!(second, CommandOutcome::Rejected(_)));
    assert_eq!(h.feed.calls(), calls, "a flat symbol needs no price");
    assert!((h.engine.session().book.balance() - 10_100.0).abs() < 1e-6);
    assert_eq!(h.log.len(), 1);
}

#[tokio::test]
async fn test_forced_trade_fails_without_price() {
    let settings = settings(&[BTC, ETH], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(ETH, 3_000.0)]]),
        FixedAdvisor::disabled(),
    );

    let outcome = h
        .engine
        .apply_command(Command::ForceBuy(BTC.to_string()), t0())
        .await;

    assert_eq!(
        outcome,
        CommandOutcome::Rejected("Price fetch failed".to_string())
    );
    assert_eq!(h.engine.session().book.balance(), 10_000.0);
}

#[tokio::test]
async fn test_reset_command_restores_initial_state() {
    let settings = settings(&[BTC], 10_000.0);
    let mut h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 100.0)]]),
        FixedAdvisor::disabled(),
    );
    seed_position(&mut h.engine, BTC, 100.0, 1000.0);
    h.engine.run_pass(t0()).await;

    let outcome = h.engine.apply_command(Command::Reset, t0()).await;

    assert_eq!(outcome, CommandOutcome::Reset);
    let session = h.engine.session();
    assert_eq!(session.book.balance(), 10_000.0);
    assert!(session.book.open_positions().is_empty());
    assert_eq!(session.history.len(BTC), 0);
    assert_eq!(session.pass_count, 1);
    assert!(h.alerts.all().contains(&"Reset complete".to_string()));
}

#[tokio::test]
async fn test_paused_loop_still_applies_commands() {
    let settings = settings(&[BTC], 10_000.0);
    let h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 100.0)]]),
        FixedAdvisor::disabled(),
    );
    let mut engine = h.engine.with_running(false);

    let (tx, rx) = mpsc::channel(4);
    tx.send(Command::parse("force buy btc").unwrap()).await.unwrap();
    drop(tx);

    engine
        .run(rx, tokio::time::sleep(std::time::Duration::from_millis(100)))
        .await;

    assert!(!engine.is_running());
    assert_eq!(engine.session().pass_count, 0);
    assert!(engine.session().book.get(BTC).unwrap().is_held());
    assert_eq!(h.log.len(), 1);
}

#[tokio::test]
async fn test_running_loop_passes_until_shutdown() {
    let settings = settings(&[BTC], 10_000.0);
    let h = harness(
        &settings,
        ScriptedFeed::new(&[&[(BTC, 100.0)]]),
        FixedAdvisor::disabled(),
    );
    let mut engine = h.engine;

    let (tx, rx) = mpsc::channel(4);
    drop(tx);

    engine
        .run(rx, tokio::time::sleep(std::time::Duration::from_millis(100)))
        .await;

    // the first tick fires immediately, the next one is 10s away
    assert_eq!(engine.session().pass_count, 1);
    assert_eq!(engine.session().history.len(BTC), 1);
}

#[tokio::test]
async fn test_trades_reach_csv_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("trades.csv");

    let settings = settings(&[BTC], 10_000.0);
    let feed = ScriptedFeed::new(&[&[(BTC, 90.0)]]);
    let mut engine = Engine::new(
        &settings,
        Box::new(feed),
        Box::new(FixedAdvisor::disabled()),
        Box::new(CsvTradeLog::new(&path)),
        Box::new(Alerts::default()),
    );
    seed_position(&mut engine, BTC, 100.0, 1000.0);

    engine.run_pass(t0() + Duration::minutes(1)).await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "Timestamp,Coin,Action,Price,Qty,Balance,Profit%,Reason"
    );
    assert_eq!(
        lines[1],
        "2024-03-01 12:01:00,BTC_USDT,SELL,90,10,9900.00,-10.00%,Stop-Loss"
    );
}
