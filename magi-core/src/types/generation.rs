use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A single generation call. Unset fields fall back to the provider defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Either the generated text or the classified failure, never both
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Text(String),
    Error(ProviderError),
}

/// Outcome of one provider call with its wall-clock latency
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub provider: String,
    pub outcome: GenerationOutcome,
    pub latency_ms: u64,
}

impl GenerationResult {
    pub fn success(provider: impl Into<String>, text: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            outcome: GenerationOutcome::Text(text.into()),
            latency_ms,
        }
    }

    pub fn failure(provider: impl Into<String>, error: ProviderError, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            outcome: GenerationOutcome::Error(error),
            latency_ms,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            GenerationOutcome::Text(text) => Some(text),
            GenerationOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match &self.outcome {
            GenerationOutcome::Text(_) => None,
            GenerationOutcome::Error(err) => Some(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, GenerationOutcome::Text(_))
    }
}
