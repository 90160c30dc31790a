pub mod decision;
pub mod generation;
pub mod provider_config;
pub mod roster;
pub mod weights;

// Re-export common types
pub use decision::{Action, Decision, StockAnalysis};
pub use generation::{GenerationOutcome, GenerationRequest, GenerationResult};
pub use provider_config::{ProviderConfig, ProviderKind};
pub use roster::{UnitRoster, UnitSpec};
pub use weights::WeightSet;

/// Timestamp in milliseconds since Unix epoch
pub type TimestampMS = u64;

/// Logical unit identifier (e.g., "balthasar", "melchior")
pub type UnitId = String;
