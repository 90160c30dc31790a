/// Fan-out orchestration and merge strategies
pub mod merge;
pub mod orchestrator;
pub mod panel;

pub use crate::llm::metrics::ConsensusMetrics;
pub use merge::{longest_response, select_consensus, MergeMode, NO_VALID_RESPONSES};
pub use orchestrator::{ConsensusResponse, JudgeInfo, Orchestrator, UnitSlot};
pub use panel::PanelAnalysis;
