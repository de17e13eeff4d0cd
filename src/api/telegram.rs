use crate::error::ApiError;
use reqwest::Client;
use tokio::time::Duration;

const PROVIDER: &str = "telegram";

/// Minimal Telegram Bot API client for trade alerts
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(base_url: &str, bot_token: String, chat_id: String) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }

    pub async fn send_message(&self, text: &str) -> Result<(), ApiError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let params = [("chat_id", self.chat_id.as_str()), ("text", text)];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
