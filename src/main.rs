use anyhow::{Context, Result};
use clap::Parser;
use paperbot::advisor::AdvisorClient;
use paperbot::api::CryptoComClient;
use paperbot::config::Settings;
use paperbot::engine::{forward_commands, Engine};
use paperbot::execution::PriceFeed;
use paperbot::notify::{FanoutNotifier, LogNotifier, Notifier, TelegramNotifier};
use paperbot::persistence::CsvTradeLog;
use tokio::io::BufReader;
use tokio::sync::mpsc;

const COMMAND_QUEUE_DEPTH: usize = 32;

#[derive(Parser, Debug)]
#[command(author, version, about = "Paper trading bot with AI-assisted signals")]
struct Cli {
    /// Path to settings file (default: Settings.* detection)
    #[arg(long)]
    config: Option<String>,

    /// Tracing filter, overridden by RUST_LOG
    #[arg(long, default_value = "paperbot=info")]
    log_filter: String,

    /// Run rule-only even when an API key is configured
    #[arg(long, default_value_t = false)]
    no_ai: bool,

    /// Start stopped; type `start` to begin trading
    #[arg(long, default_value_t = false)]
    paused: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(&cli.log_filter);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let result = runtime.block_on(run(cli));
    // a pending stdin read would otherwise keep the runtime alive
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    tracing::info!("🚀 Paper trading bot starting");

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    let feed = PriceFeed::new(CryptoComClient::new(&settings.feed)?);

    let api_key = if cli.no_ai {
        None
    } else {
        settings.advisor_api_key()
    };
    let advisor = AdvisorClient::new(&settings.advisor, api_key)?;

    let trade_log = CsvTradeLog::new(&settings.trade_log.path);
    let notifier = build_notifier(&settings)?;

    tracing::info!("📊 Configuration:");
    tracing::info!("  Balance: ${:.2}", settings.trading.initial_balance);
    tracing::info!("  Interval: {}s", settings.trading.update_interval_secs);
    tracing::info!("  Symbols: {}", settings.trading.symbols.join(", "));
    tracing::info!("  Trade log: {}", trade_log.path().display());
    tracing::info!("  Commands: start | stop | reset | force buy/sell <coin>");

    let mut engine = Engine::new(
        &settings,
        Box::new(feed),
        Box::new(advisor),
        Box::new(trade_log),
        Box::new(notifier),
    )
    .with_running(!cli.paused);

    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    tokio::spawn(forward_commands(BufReader::new(tokio::io::stdin()), tx));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("⚠️  Received Ctrl+C, shutting down...");
    };

    engine.run(rx, shutdown).await;

    paperbot::engine::log_status(engine.session());
    tracing::info!("👋 Paper trading bot stopped");

    Ok(())
}

fn setup_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_notifier(settings: &Settings) -> Result<FanoutNotifier> {
    let mut notifier = FanoutNotifier::new().with(LogNotifier);

    if let Some(telegram) = TelegramNotifier::from_config(&settings.notify)? {
        tracing::info!("Telegram alerts enabled");
        notifier = notifier.with(telegram);
    }

    notifier.notify("Paper Trading Bot STARTED");
    Ok(notifier)
}
