use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading action recommended by a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Hold,
    Sell,
}

impl Action {
    /// Parse an already-uppercased action keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "BUY" => Some(Action::Buy),
            "HOLD" => Some(Action::Hold),
            "SELL" => Some(Action::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Hold => "HOLD",
            Action::Sell => "SELL",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured decision extracted from generated text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Always within 0..=100
    pub confidence: u8,
    pub reason: String,
}

impl Decision {
    /// Confidence used when none can be recovered from the model output
    pub const DEFAULT_CONFIDENCE: u8 = 50;

    pub fn new(action: Action, confidence: i64, reason: impl Into<String>) -> Self {
        Self {
            action,
            confidence: confidence.clamp(0, 100) as u8,
            reason: reason.into(),
        }
    }
}

/// Decision attributed to the provider that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAnalysis {
    pub provider: String,
    #[serde(flatten)]
    pub decision: Decision,
}
