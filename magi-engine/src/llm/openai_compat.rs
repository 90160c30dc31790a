//! Chat-completions adapter shared by OpenAI, xAI, Mistral and Groq

use async_trait::async_trait;
use magi_core::{GenerationRequest, ProviderConfig, ProviderError};
use serde::{Deserialize, Serialize};

use super::provider::{Provider, ResolvedOptions};
use super::transport::RetryingTransport;

pub struct ChatCompletionsProvider {
    config: ProviderConfig,
    transport: RetryingTransport,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatContent>,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let transport = RetryingTransport::from_config(&config)?;
        Ok(Self { config, transport })
    }
}

#[async_trait]
impl Provider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let options = ResolvedOptions::resolve(&self.config, request);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: options.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
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

        let response: ChatResponse = reply.decode(&self.config.name)?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magi_core::ProviderKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer, kind: ProviderKind) -> ChatCompletionsProvider {
        let config = ProviderConfig::for_kind(kind, "test-key")
            .with_endpoint(format!("{}/v1/chat/completions", server.uri()))
            .with_model("test-model");
        ChatCompletionsProvider::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_generate_extracts_first_choice() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "max_tokens": 2048,
                "messages": [
                    { "role": "system" },
                    { "role": "user", "content": "What is MAGI?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "A supercomputer." } }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server, ProviderKind::OpenAi);
        let text = provider
            .generate(&GenerationRequest::new("What is MAGI?"))
            .await
            .unwrap();

        assert_eq!(text, "A supercomputer.");
        assert_eq!(provider.name(), "OpenAI");
        assert_eq!(provider.model(), "test-model");
    }

    #[tokio::test]
    async fn test_missing_choices_yields_empty_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server, ProviderKind::Groq);
        let text = provider.generate(&GenerationRequest::new("hi")).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified_without_retry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "Rate limit reached for requests", "type": "requests" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server, ProviderKind::Xai);
        let err = provider
            .generate(&GenerationRequest::new("hi"))
            .await
            .unwrap_err();

        assert_eq!(err.provider, "Grok");
        assert_eq!(err.status_code, Some(429));
        assert_eq!(err.message, "Rate limit reached for requests");
    }

    #[tokio::test]
    async fn test_request_temperature_is_forwarded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "temperature": 0.5 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "ok" } }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server, ProviderKind::Mistral);
        let text = provider
            .generate(&GenerationRequest::new("hi").with_temperature(0.5))
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }
}
