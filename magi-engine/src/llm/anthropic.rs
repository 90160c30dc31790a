use async_trait::async_trait;
use magi_core::{GenerationRequest, ProviderConfig, ProviderError};
use serde::{Deserialize, Serialize};

use super::provider::{Provider, ResolvedOptions};
use super::transport::RetryingTransport;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API
pub struct AnthropicProvider {
    config: ProviderConfig,
    transport: RetryingTransport,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let transport = RetryingTransport::from_config(&config)?;
        Ok(Self { config, transport })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let options = ResolvedOptions::resolve(&self.config, request);
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: options.max_tokens,
            system: options.system_prompt,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: options.temperature,
        };

        let reply = self
            .transport
            .post_json(
                &self.config.endpoint,
                &[
                    ("x-api-key", self.config.credential.as_str()),
                    ("anthropic-version", ANTHROPIC_VERSION),
                ],
                &body,
            )
            .await?;

        let response: MessagesResponse = reply.decode(&self.config.name)?;
        Ok(response
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .unwrap_or_default())
    }
}
