use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat},
    Client,
};
use async_trait::async_trait;

use super::intent_parser::{CompletionProvider, IntentParseError};

/// Groq serves the OpenAI chat API under its own base URL.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Any OpenAI-compatible chat completion endpoint.
pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenaiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_config(OpenAIConfig::new().with_api_key(api_key), model)
    }

    pub fn groq(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(GROQ_API_BASE)
            .with_api_key(api_key);
        Self::with_config(config, model)
    }

    fn with_config(config: OpenAIConfig, model: String) -> Self {
        OpenaiClient {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenaiClient {
    async fn complete(&self, prompt: &str) -> Result<String, IntentParseError> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| IntentParseError::Provider(e.to_string()))?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages([message.into()])
            .response_format(ResponseFormat::JsonObject)
            .max_tokens(1000_u32)
            .build()
            .map_err(|e| IntentParseError::Provider(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| IntentParseError::Provider(e.to_string()))?;
        log::debug!("Response: {:?}", response);

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| IntentParseError::Parse("no content in completion response".to_string()))
    }
}
