use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported backend kinds. The set is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Xai,
    Mistral,
    Groq,
    Anthropic,
    Gemini,
    Cohere,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::OpenAi,
        ProviderKind::Xai,
        ProviderKind::Mistral,
        ProviderKind::Groq,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Cohere,
    ];

    /// Human-facing provider name used in logs and error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Xai => "Grok",
            ProviderKind::Mistral => "Mistral",
            ProviderKind::Groq => "Groq",
            ProviderKind::Anthropic => "Claude",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Cohere => "Cohere",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1/chat/completions",
            ProviderKind::Xai => "https://api.x.ai/v1/chat/completions",
            ProviderKind::Mistral => "https://api.mistral.ai/v1/chat/completions",
            ProviderKind::Groq => "https://api.groq.com/openai/v1/chat/completions",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/messages",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
            ProviderKind::Cohere => "https://api.cohere.ai/v1/chat",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Xai => "grok-2-latest",
            ProviderKind::Mistral => "mistral-large-latest",
            ProviderKind::Groq => "llama-3.1-70b-versatile",
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
            ProviderKind::Gemini => "gemini-2.0-flash-exp",
            ProviderKind::Cohere => "command-r-plus",
        }
    }

    pub fn default_timeout_ms(&self) -> u64 {
        match self {
            ProviderKind::Groq => 15_000,
            _ => 30_000,
        }
    }

    pub fn default_temperature(&self) -> f32 {
        match self {
            ProviderKind::Cohere => 0.3,
            _ => 0.7,
        }
    }

    /// System prompt applied when the caller supplies none
    pub fn default_system_prompt(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => {
                "You are MARY-4 of the MAGI system. You integrate the analyses of the other \
                 AIs and act as the arbiter who makes the final judgement."
            }
            ProviderKind::Xai => {
                "You are Unit-B2 (BALTHASAR-2) of the MAGI system. Analyse investments from a \
                 creative and innovative perspective."
            }
            ProviderKind::Mistral => {
                "You are Unit-R4 of the MAGI system. Make investment judgements from the \
                 perspective of practical risk analysis."
            }
            ProviderKind::Groq => {
                "You are a fast investment analysis AI. Provide quick and accurate judgements."
            }
            ProviderKind::Anthropic => {
                "You are Unit-C3 (CASPER-3) of the MAGI system. Analyse investments from a \
                 human and ethical perspective, including ESG and long-term social impact."
            }
            ProviderKind::Gemini => {
                "You are Unit-M1 (MELCHIOR-1) of the MAGI system. Analyse investments from a \
                 logical and scientific perspective."
            }
            ProviderKind::Cohere => {
                "You are ISABEL of the MAGI system, responsible for document analysis and \
                 retrieval."
            }
        }
    }

    /// Environment variable holding the credential
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Xai => "XAI_API_KEY",
            ProviderKind::Mistral => "MISTRAL_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Cohere => "COHERE_API_KEY",
        }
    }

    /// Environment variable overriding the model id
    pub fn model_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_MODEL",
            ProviderKind::Xai => "XAI_MODEL",
            ProviderKind::Mistral => "MISTRAL_MODEL",
            ProviderKind::Groq => "GROQ_MODEL",
            ProviderKind::Anthropic => "ANTHROPIC_MODEL",
            ProviderKind::Gemini => "GEMINI_MODEL",
            ProviderKind::Cohere => "COHERE_MODEL",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Xai => "xai",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Groq => "groq",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Cohere => "cohere",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "xai" | "grok" => Ok(ProviderKind::Xai),
            "mistral" => Ok(ProviderKind::Mistral),
            "groq" => Ok(ProviderKind::Groq),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "cohere" => Ok(ProviderKind::Cohere),
            other => Err(format!("unknown provider kind: {}", other)),
        }
    }
}

/// Configuration for one backend. Built once at startup, never mutated.
#[derive(Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    pub endpoint: String,
    pub credential: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub default_temperature: f32,
    pub system_prompt: String,
    /// Outbound pacing; `None` disables it
    pub requests_per_minute: Option<u32>,
    /// Attempts on transport failure, including the first
    pub max_attempts: u32,
}

impl ProviderConfig {
    pub const DEFAULT_MAX_TOKENS: u32 = 2048;
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Configuration with the backend's defaults
    pub fn for_kind(kind: ProviderKind, credential: impl Into<String>) -> Self {
        Self {
            name: kind.display_name().to_string(),
            kind,
            model: kind.default_model().to_string(),
            endpoint: kind.default_endpoint().to_string(),
            credential: credential.into(),
            timeout_ms: kind.default_timeout_ms(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            default_temperature: kind.default_temperature(),
            system_prompt: kind.default_system_prompt().to_string(),
            requests_per_minute: None,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Read the credential (and optional model override) from the environment.
    ///
    /// Returns `None` when the credential variable is unset or empty.
    pub fn from_env(kind: ProviderKind) -> Option<Self> {
        let credential = std::env::var(kind.api_key_env())
            .ok()
            .filter(|key| !key.trim().is_empty())?;

        let mut config = Self::for_kind(kind, credential);
        if let Ok(model) = std::env::var(kind.model_env()) {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        Some(config)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = Some(requests_per_minute);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

// Credential stays out of logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("max_tokens", &self.max_tokens)
            .field("default_temperature", &self.default_temperature)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}
