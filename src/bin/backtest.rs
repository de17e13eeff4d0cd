use anyhow::{bail, Context, Result};
use clap::Parser;
use paperbot::api::CryptoComClient;
use paperbot::backtest::{
    build_timeline, BacktestMetrics, BacktestRunner, MarketScenario, SyntheticDataGenerator,
};
use paperbot::config::Settings;
use std::collections::HashMap;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay price history through the paper trading engine")]
struct Cli {
    /// Path to settings file (default: Settings.* detection)
    #[arg(long)]
    config: Option<String>,

    /// Run offline on a synthetic scenario (uptrend, downtrend, sideways, volatile, crash, all)
    #[arg(long)]
    synthetic: Option<String>,

    /// Symbols to fetch history for (default: configured symbols)
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Number of candles per symbol
    #[arg(long, default_value_t = 300)]
    count: usize,

    /// Candlestick timeframe for historical data
    #[arg(long, default_value = "1m")]
    timeframe: String,

    /// Seed for synthetic data
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value = "paperbot=info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter.as_str())
        .init();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let runner = BacktestRunner::new(settings.clone());

    println!("\n═══════════════════════════════════════════════════════");
    println!("           PAPERBOT BACKTESTING SUITE                  ");
    println!("═══════════════════════════════════════════════════════");

    match cli.synthetic.as_deref() {
        Some(name) => run_synthetic(&runner, name, cli.count, cli.seed).await,
        None => run_historical(&runner, &settings, &cli).await,
    }
}

async fn run_synthetic(runner: &BacktestRunner, name: &str, count: usize, seed: u64) -> Result<()> {
    let scenarios: Vec<MarketScenario> = if name.eq_ignore_ascii_case("all") {
        MarketScenario::ALL.to_vec()
    } else {
        vec![name.parse::<MarketScenario>().map_err(anyhow::Error::msg)?]
    };

    let mut all_metrics = Vec::new();

    for scenario in scenarios {
        let mut generator = SyntheticDataGenerator::new(seed);
        let closes = generator.generate(scenario, count, 10);

        let mut series = HashMap::new();
        series.insert("SYNTH_USDT".to_string(), closes);

        match runner
            .run_and_report(build_timeline(&series), scenario.name())
            .await
        {
            Ok(metrics) => all_metrics.push((scenario.name().to_string(), metrics)),
            Err(e) => eprintln!("❌ Backtest failed for {}: {}", scenario.name(), e),
        }
    }

    if all_metrics.len() > 1 {
        print_summary_comparison(&all_metrics);
    }

    Ok(())
}

async fn run_historical(runner: &BacktestRunner, settings: &Settings, cli: &Cli) -> Result<()> {
    let client = CryptoComClient::new(&settings.feed)?;
    let symbols = if cli.symbols.is_empty() {
        settings.trading.symbols.clone()
    } else {
        cli.symbols
            .iter()
            .map(|s| paperbot::engine::normalize_symbol(s))
            .collect()
    };

    let mut series = HashMap::new();
    for symbol in &symbols {
        match client
            .get_candlesticks(symbol, &cli.timeframe, cli.count)
            .await
        {
            Ok(closes) if !closes.is_empty() => {
                println!("   {}: {} candles", symbol, closes.len());
                series.insert(symbol.clone(), closes);
            }
            Ok(_) => eprintln!("⚠️  No candles for {}", symbol),
            Err(e) => eprintln!("⚠️  Failed to fetch {}: {}", symbol, e),
        }
    }

    if series.is_empty() {
        bail!("No historical data available for {:?}", symbols);
    }

    let label = format!("{} x {} ({})", series.len(), cli.count, cli.timeframe);
    runner.run_and_report(build_timeline(&series), &label).await?;

    Ok(())
}

fn print_summary_comparison(results: &[(String, BacktestMetrics)]) {
    println!("\n═══════════════════════════════════════════════════════");
    println!("              SCENARIO COMPARISON                      ");
    println!("═══════════════════════════════════════════════════════\n");

    println!(
        "{:<14} {:>12} {:>10} {:>8} {:>8} {:>8}",
        "Scenario", "P&L", "Return%", "Trades", "Win%", "MaxDD%"
    );
    println!("{}", "─".repeat(66));

    for (name, metrics) in results {
        println!(
            "{:<14} {:>12.2} {:>10.2} {:>8} {:>8.1} {:>8.2}",
            name,
            metrics.total_pnl,
            metrics.total_return_pct,
            metrics.total_trades,
            metrics.win_rate,
            metrics.max_drawdown_pct
        );
    }

    if let Some((best_name, best)) = results
        .iter()
        .max_by(|a, b| a.1.total_return_pct.total_cmp(&b.1.total_return_pct))
    {
        println!(
            "\n🏆 Best Scenario: {} ({:+.2}%)",
            best_name, best.total_return_pct
        );
    }

    if let Some((worst_name, worst)) = results
        .iter()
        .min_by(|a, b| a.1.total_return_pct.total_cmp(&b.1.total_return_pct))
    {
        println!(
            "⚠️  Worst Scenario: {} ({:+.2}%)",
            worst_name, worst.total_return_pct
        );
    }

    println!("\n═══════════════════════════════════════════════════════\n");
}
