use serde_json::Value;

/// Builds every prompt the engine sends to a backend
pub struct PromptFormatter;

impl PromptFormatter {
    /// Format the per-unit stock analysis prompt
    ///
    /// Empty constitution or context strings are treated as absent
    pub fn format_stock_analysis(
        symbol: &str,
        stock_data: &Value,
        context: Option<&str>,
        constitution: Option<&str>,
    ) -> String {
        let mut prompt = String::new();

        if let Some(constitution) = constitution.filter(|c| !c.is_empty()) {
            prompt.push_str(constitution);
            prompt.push_str("\n\n");
        }

        prompt.push_str(&format!("## Stock Analysis: {}\n\n", symbol));
        prompt.push_str(&format!("### Market Data\n{}\n\n", pretty_json(stock_data)));

        if let Some(context) = context.filter(|c| !c.is_empty()) {
            prompt.push_str(&format!("### Additional Context\n{}\n\n", context));
        }

        prompt.push_str("### Instructions\n");
        prompt.push_str("Analyse the data above and answer in the following format:\n");
        prompt.push_str("- action: BUY / HOLD / SELL\n");
        prompt.push_str("- confidence: a number from 0 to 100\n");
        prompt.push_str("- reason: the rationale for the decision\n");

        prompt
    }

    /// Judge prompt for integration mode
    pub fn format_integration(unit_count: usize, responses: &Value) -> String {
        format!(
            "Integrate these {} AI responses into a unified answer: {}",
            unit_count, responses
        )
    }

    /// Judge prompt for synthesis mode
    pub fn format_synthesis(responses: &Value) -> String {
        format!(
            "Create emergent insight from these diverse perspectives: {}",
            responses
        )
    }

    /// Prefix a user prompt with a reference document
    pub fn with_reference_context(document: &str, prompt: &str) -> String {
        format!(
            "# System Context (Reference Only)\n{}\n\n---\n# User Question:\n{}",
            document, prompt
        )
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
