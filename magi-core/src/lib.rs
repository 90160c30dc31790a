pub mod error;
pub mod types;

// Re-export common types
pub use error::ProviderError;
pub use types::{
    Action, Decision, GenerationOutcome, GenerationRequest, GenerationResult, ProviderConfig,
    ProviderKind, StockAnalysis, TimestampMS, UnitId, UnitRoster, UnitSpec, WeightSet,
};
