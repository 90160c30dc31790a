use async_trait::async_trait;
use magi_core::{GenerationRequest, ProviderConfig, ProviderError};
use serde::{Deserialize, Serialize};

use super::provider::{Provider, ResolvedOptions};
use super::transport::RetryingTransport;

/// Google generateContent API. The key travels as a query parameter and the
/// system prompt is folded into the user turn.
pub struct GeminiProvider {
    config: ProviderConfig,
    transport: RetryingTransport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let transport = RetryingTransport::from_config(&config)?;
        Ok(Self { config, transport })
    }

    fn url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model,
            self.config.credential
        )
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let options = ResolvedOptions::resolve(&self.config, request);
        let text = format!("{}\n\n{}", options.system_prompt, request.prompt);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: &text }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: options.max_tokens,
                temperature: options.temperature,
            },
        };

        let reply = self.transport.post_json(&self.url(), &[], &body).await?;

        let response: GenerateContentResponse = reply.decode(&self.config.name)?;
        Ok(response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .unwrap_or_default())
    }
}
