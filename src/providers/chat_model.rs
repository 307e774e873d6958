use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::app::MistralConfig;
use crate::error::{DocFlowError, Result};

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Mistral chat-completions endpoint.
pub struct MistralChatModel {
    client: reqwest::Client,
    api_key: String,
    config: MistralConfig,
}

impl MistralChatModel {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, config: MistralConfig) -> Self {
        MistralChatModel {
            client,
            api_key: api_key.into(),
            config,
        }
    }
}

#[async_trait]
impl ChatModel for MistralChatModel {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![
                CompletionMessage {
                    role: "system",
                    content: system_prompt,
                },
                CompletionMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response: CompletionResponse = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content)
            .ok_or_else(|| DocFlowError::provider("mistral", "response contained no choices"))
    }
}

/// `None` when no language-model key is configured; callers use the canned responder.
pub fn build_chat_model(
    config: &MistralConfig,
    client: reqwest::Client,
) -> Option<Arc<dyn ChatModel>> {
    match &config.api_key {
        Some(key) => Some(Arc::new(MistralChatModel::new(
            client,
            key.clone(),
            config.clone(),
        ))),
        None => {
            info!("Language-model API key not found, chat will use canned responses");
            None
        }
    }
}
