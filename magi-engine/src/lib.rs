pub mod consensus;
pub mod llm;

// Re-export commonly used items from llm module
pub use llm::{
    analyst, build_provider, slots_from_env, slots_with, AnalysisInput, DecisionParser, HealthReport, HealthStatus,
    MetricsTimer, PromptFormatter, Provider, RawOutput, RetryPolicy, RetryingTransport,
};

// Re-export commonly used items from consensus module
pub use consensus::{
    ConsensusMetrics, ConsensusResponse, MergeMode, Orchestrator, PanelAnalysis, UnitSlot,
};
