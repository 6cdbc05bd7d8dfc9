//! Generation service client for the `/v1/chat/completions` API.
//!
//! One request per incoming message, no retry: a chat reply that arrives
//! half a minute late is worse than no reply, so failures surface
//! immediately and the pipeline substitutes its fallback. The [`ReplyGenerator`]
//! trait is the seam the pipeline tests mock through.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::embedding::{api_key, API_KEY_ENV};
use crate::models::ChatMessage;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Produces one reply for an assembled message list.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat completions request body.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: Option<String>,
}

/// Build a request body from the configuration and assembled messages.
pub fn build_request(config: &GenerationConfig, messages: &[ChatMessage]) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.effective_model().to_string(),
        messages: messages.to_vec(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}

/// Extract the reply text from a parsed response.
///
/// An empty or absent `choices[0].message.content` is an error, not an empty
/// reply; the caller decides what to substitute.
pub fn extract_reply(response: ChatCompletionResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .context("generation response had no choices")?;
    match choice.message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => bail!("generation response had empty content"),
    }
}

/// Live chat completions client.
pub struct OpenAiGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let Some(key) = api_key() else {
            bail!("{} not set", API_KEY_ENV);
        };

        let body = build_request(&self.config, messages);
        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&key)
            .json(&body)
            .send()
            .await
            .context("generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!(
                "generation service returned {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            );
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to decode generation response")?;
        extract_reply(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GenerationConfig {
        toml::from_str(r#"model = "gpt-4o-mini""#).unwrap()
    }

    #[test]
    fn test_build_request_uses_effective_model() {
        let mut cfg = config();
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];

        let request = build_request(&cfg, &messages);
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 2);

        cfg.fine_tuned_model = Some("ft:gpt-4o-mini:org::abc123".to_string());
        let request = build_request(&cfg, &messages);
        assert_eq!(request.model, "ft:gpt-4o-mini:org::abc123");
    }

    #[test]
    fn test_request_serializes_roles_lowercase() {
        let request = build_request(&config(), &[ChatMessage::assistant("yo")]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "assistant");
        assert_eq!(json["messages"][0]["content"], "yo");
        assert_eq!(json["max_tokens"], 300);
    }

    #[test]
    fn test_extract_reply_happy_path() {
        let response: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": "hey!"}}]
        }))
        .unwrap();
        assert_eq!(extract_reply(response).unwrap(), "hey!");
    }

    #[test]
    fn test_extract_reply_rejects_empty_content() {
        let response: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": "  "}}]
        }))
        .unwrap();
        assert!(extract_reply(response).is_err());

        let response: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {}}]
        }))
        .unwrap();
        assert!(extract_reply(response).is_err());
    }

    #[test]
    fn test_extract_reply_rejects_no_choices() {
        let response: ChatCompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(extract_reply(response).is_err());
    }
}
