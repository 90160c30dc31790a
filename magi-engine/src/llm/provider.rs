use async_trait::async_trait;
use magi_core::{GenerationRequest, ProviderConfig, ProviderError};

/// Uniform generate capability over one backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-facing provider name, e.g. "Claude"
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Generate text for the request. Unset request options fall back to the
    /// provider's configured defaults.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

/// Request options after applying configured defaults
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResolvedOptions<'a> {
    pub system_prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl<'a> ResolvedOptions<'a> {
    pub fn resolve(config: &'a ProviderConfig, request: &'a GenerationRequest) -> Self {
        Self {
            system_prompt: request
                .system_prompt
                .as_deref()
                .unwrap_or(&config.system_prompt),
            temperature: request.temperature.unwrap_or(config.default_temperature),
            max_tokens: request.max_tokens.unwrap_or(config.max_tokens),
        }
    }
}
