use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Operator command read from the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Reset,
    ForceBuy(String),
    ForceSell(String),
}

impl Command {
    /// Parse one input line; unrecognized input yields `None`
    ///
    /// Accepted forms are `start`, `stop`, `reset`, `force buy <coin>` and
    /// `force sell <coin>`, case-insensitive.
    pub fn parse(line: &str) -> Option<Self> {
        let lowered = line.trim().to_lowercase();
        let parts: Vec<&str> = lowered.split_whitespace().collect();

        match parts.as_slice() {
            ["start"] => Some(Command::Start),
            ["stop"] => Some(Command::Stop),
            ["reset"] => Some(Command::Reset),
            ["force", "buy", coin, ..] => Some(Command::ForceBuy(normalize_symbol(coin))),
            ["force", "sell", coin, ..] => Some(Command::ForceSell(normalize_symbol(coin))),
            _ => None,
        }
    }
}

/// `btc` and `btc_usdt` both become `BTC_USDT`
pub fn normalize_symbol(coin: &str) -> String {
    let upper = coin.trim().to_uppercase();
    if upper.contains('_') {
        upper
    } else {
        format!("{}_USDT", upper)
    }
}

/// Read lines from `reader` and queue every recognized command
///
/// Returns when input ends or the engine side of the channel is gone. The
/// reader never touches trading state.
pub async fn forward_commands<R>(reader: R, tx: mpsc::Sender<Command>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Some(command) => {
                        if tx.send(command).await.is_err() {
                            tracing::debug!("Command channel closed");
                            return;
                        }
                    }
                    None => tracing::warn!("Unknown command: {}", line.trim()),
                }
            }
            Ok(None) => {
                tracing::debug!("Command input closed");
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to read command: {}", e);
                return;
            }
        }
    }
}
