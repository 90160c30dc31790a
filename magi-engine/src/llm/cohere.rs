use async_trait::async_trait;
use magi_core::{GenerationRequest, ProviderConfig, ProviderError};
use serde::{Deserialize, Serialize};

use super::provider::{Provider, ResolvedOptions};
use super::transport::RetryingTransport;

/// Cohere chat API
pub struct CohereProvider {
    config: ProviderConfig,
    transport: RetryingTransport,
}

#[derive(Serialize)]
struct CohereChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    preamble: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CohereChatResponse {
    #[serde(default)]
    text: Option<String>,
}

impl CohereProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let transport = RetryingTransport::from_config(&config)?;
        Ok(Self { config, transport })
    }
}

#[async_trait]
impl Provider for CohereProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let options = ResolvedOptions::resolve(&self.config, request);
        let body = CohereChatRequest {
            model: &self.config.model,
            message: &request.prompt,
            preamble: options.system_prompt,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let authorization = format!("Bearer {}", self.config.credential);
        let reply = self
            .transport
            .post_json(
                &self.config.endpoint,
                &[("Authorization", authorization.as_str())],
                &body,
            )
            .await?;

        let response: CohereChatResponse = reply.decode(&self.config.name)?;
        Ok(response.text.unwrap_or_default())
    }
}
