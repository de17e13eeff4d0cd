// Fire-and-forget trade and state alerts
use tokio::runtime::Handle;

use crate::api::TelegramClient;
use crate::config::NotifyConfig;
use crate::error::ApiError;

/// Alert sink; delivery failures never reach the caller
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Writes alerts to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(alert = %message, "🔔 {}", message);
    }
}

/// Discards every alert
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}

/// Telegram delivery on a detached task
#[derive(Clone)]
pub struct TelegramNotifier {
    client: TelegramClient,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }

    /// Build from config when both a bot token and chat id are present
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, ApiError> {
        let token = config.telegram_bot_token.as_deref().map(str::trim).unwrap_or("");
        let chat = config.telegram_chat_id.as_deref().map(str::trim).unwrap_or("");

        if token.is_empty() || chat.is_empty() {
            return Ok(None);
        }

        let client = TelegramClient::new(
            &config.telegram_base_url,
            token.to_string(),
            chat.to_string(),
        )?;
        Ok(Some(Self::new(client)))
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, message: &str) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("No runtime available, dropping Telegram alert");
            return;
        };

        let client = self.client.clone();
        let message = message.to_string();
        handle.spawn(async move {
            if let Err(e) = client.send_message(&message).await {
                tracing::warn!("Failed to send Telegram alert: {}", e);
            }
        });
    }
}

/// Forwards each alert to every inner notifier
#[derive(Default)]
pub struct FanoutNotifier {
    targets: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: impl Notifier + 'static) -> Self {
        self.targets.push(Box::new(target));
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, message: &str) {
        for target in &self.targets {
            target.notify(message);
        }
    }
}
