pub mod analyst;
pub mod anthropic;
pub mod cohere;
pub mod decision_parser;
pub mod error_classifier;
pub mod gemini;
pub mod metrics;
pub mod openai_compat;
pub mod prompt_formatter;
pub mod provider;
pub mod registry;
pub mod transport;

// Re-export commonly used items
pub use analyst::{AnalysisInput, HealthReport, HealthStatus};
pub use decision_parser::{DecisionParser, RawOutput};
pub use metrics::MetricsTimer;
pub use prompt_formatter::PromptFormatter;
pub use provider::Provider;
pub use registry::{build_provider, slots_from_env, slots_with};
pub use transport::{RetryPolicy, RetryingTransport};
