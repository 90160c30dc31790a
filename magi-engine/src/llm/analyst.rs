//! Decision, Q&A and health operations layered on [`Provider::generate`]

use magi_core::{GenerationRequest, ProviderError, StockAnalysis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decision_parser::{DecisionParser, RawOutput};
use super::prompt_formatter::PromptFormatter;
use super::provider::Provider;

const HEALTH_PROMPT: &str = "Hello";
const HEALTH_MAX_TOKENS: u32 = 10;

/// Inputs of one stock analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub symbol: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub constitution: Option<String>,
}

impl AnalysisInput {
    pub fn new(symbol: impl Into<String>, data: Value) -> Self {
        Self {
            symbol: symbol.into(),
            data,
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_constitution(mut self, constitution: impl Into<String>) -> Self {
        self.constitution = Some(constitution.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// The unit has no credential and therefore no provider
    Unconfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub provider: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn unconfigured(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status: HealthStatus::Unconfigured,
            error: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Ask the provider for a decision on one symbol
pub async fn analyze_stock(
    provider: &dyn Provider,
    parser: &DecisionParser,
    input: &AnalysisInput,
) -> Result<StockAnalysis, ProviderError> {
    let prompt = PromptFormatter::format_stock_analysis(
        &input.symbol,
        &input.data,
        input.context.as_deref(),
        input.constitution.as_deref(),
    );
    let text = provider.generate(&GenerationRequest::new(prompt)).await?;
    let decision = parser.parse(RawOutput::Text(&text));

    tracing::debug!(
        "{} analysed {}: {} ({}%)",
        provider.name(),
        input.symbol,
        decision.action,
        decision.confidence
    );

    Ok(StockAnalysis {
        provider: provider.name().to_string(),
        decision,
    })
}

/// Plain question, optionally under a custom system prompt
pub async fn ask_question(
    provider: &dyn Provider,
    question: &str,
    system_prompt: Option<&str>,
) -> Result<String, ProviderError> {
    let mut request = GenerationRequest::new(question);
    if let Some(system_prompt) = system_prompt.filter(|s| !s.is_empty()) {
        request = request.with_system_prompt(system_prompt);
    }
    provider.generate(&request).await
}

/// Minimal round trip; never fails
pub async fn health_check(provider: &dyn Provider) -> HealthReport {
    let request = GenerationRequest::new(HEALTH_PROMPT).with_max_tokens(HEALTH_MAX_TOKENS);
    match provider.generate(&request).await {
        Ok(_) => HealthReport {
            provider: provider.name().to_string(),
            status: HealthStatus::Healthy,
            error: None,
        },
        Err(err) => {
            tracing::warn!("Health check failed for {}: {}", provider.name(), err);
            HealthReport {
                provider: provider.name().to_string(),
                status: HealthStatus::Unhealthy,
                error: Some(err.message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use magi_core::Action;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Scripted {
        reply: Result<String, ProviderError>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl Scripted {
        fn new(reply: Result<&str, ProviderError>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
            self.seen.lock().push(request.clone());
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn test_analyze_stock_parses_reply() {
        let provider = Scripted::new(Ok(r#"{"action":"buy","confidence":150,"reason":"x"}"#));
        let input = AnalysisInput::new("AAPL", json!({"price": 1})).with_context("ctx");

        let analysis = analyze_stock(&provider, &DecisionParser::default(), &input)
            .await
            .unwrap();

        assert_eq!(analysis.provider, "Scripted");
        assert_eq!(analysis.decision.action, Action::Buy);
        assert_eq!(analysis.decision.confidence, 100);
        assert_eq!(analysis.decision.reason, "x");

        let seen = provider.seen.lock();
        assert!(seen[0].prompt.contains("## Stock Analysis: AAPL"));
        assert!(seen[0].prompt.contains("### Additional Context\nctx"));
    }

    #[tokio::test]
    async fn test_analyze_stock_propagates_provider_error() {
        let provider = Scripted::new(Err(ProviderError::with_status("Scripted", 500, "down")));
        let input = AnalysisInput::new("AAPL", json!({}));

        let err = analyze_stock(&provider, &DecisionParser::default(), &input)
            .await
            .unwrap_err();
        assert_eq!(err.status_code, Some(500));
    }

    #[tokio::test]
    async fn test_ask_question_passes_system_prompt() {
        let provider = Scripted::new(Ok("42"));
        let answer = ask_question(&provider, "meaning?", Some("be terse")).await.unwrap();

        assert_eq!(answer, "42");
        let seen = provider.seen.lock();
        assert_eq!(seen[0].system_prompt.as_deref(), Some("be terse"));
    }

    #[tokio::test]
    async fn test_ask_question_empty_system_prompt_uses_default() {
        let provider = Scripted::new(Ok("ok"));
        ask_question(&provider, "q", Some("")).await.unwrap();
        assert!(provider.seen.lock()[0].system_prompt.is_none());
    }

    #[tokio::test]
    async fn test_health_check_reports() {
        let healthy = Scripted::new(Ok("Hi"));
        let report = health_check(&healthy).await;
        assert!(report.is_healthy());
        assert!(report.error.is_none());
        {
            let seen = healthy.seen.lock();
            assert_eq!(seen[0].prompt, "Hello");
            assert_eq!(seen[0].max_tokens, Some(10));
        }

        let broken = Scripted::new(Err(ProviderError::with_status("Scripted", 401, "bad key")));
        let report = health_check(&broken).await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.error.as_deref(), Some("bad key"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "unhealthy");
    }
}
