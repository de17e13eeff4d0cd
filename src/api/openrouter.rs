use crate::config::AdvisorConfig;
use crate::error::ApiError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

const PROVIDER: &str = "openrouter";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<MessageContent>,
    // some providers return plain completions
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion transport for the OpenRouter API
///
/// Performs exactly one request per call; retry policy belongs to the caller.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    referer: String,
    title: String,
}

impl OpenRouterClient {
    pub fn new(config: &AdvisorConfig, api_key: String) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            referer: config.referer.clone(),
            title: config.title.clone(),
        })
    }

    /// Send a single user prompt and return the trimmed completion text
    ///
    /// A well-formed response without choices yields an empty string.
    pub async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited { provider: PROVIDER });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let chat: ChatResponse = serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.and_then(|m| m.content).or(c.text))
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "deepseek/deepseek-chat",
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            max_tokens: 80,
            temperature: 0.0,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "deepseek/deepseek-chat");
        assert_eq!(json["max_tokens"], 80);
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_response_without_message_content() {
        let chat: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(chat.choices[0].message.as_ref().unwrap().content.is_none());

        let chat: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(chat.choices.is_empty());
    }
}
