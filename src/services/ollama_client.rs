use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::intent_parser::{CompletionProvider, IntentParseError};

/// Talks to a local Ollama server through its `/api/chat` endpoint.
pub struct OllamaClient {
    client: Client,
    url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    format: &'static str,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    pub fn new(url: &str, model: String) -> Self {
        // Local inference is slow on first load.
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        OllamaClient {
            client,
            url: url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, IntentParseError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            format: "json",
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&request)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| IntentParseError::Provider(format!("Ollama request failed: {}", e)))?;

        let body = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| IntentParseError::Parse(e.to_string()))?;

        match body.message.map(|m| m.content) {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(IntentParseError::Parse("empty response from Ollama".to_string())),
        }
    }
}
