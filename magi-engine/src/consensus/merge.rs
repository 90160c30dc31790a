use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Final answer when no unit produced text in consensus mode
pub const NO_VALID_RESPONSES: &str = "No valid responses";

/// How unit outputs are merged into the final answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Longest valid text wins
    #[default]
    Consensus,
    /// Judge merges the outputs into one answer
    Integration,
    /// Judge derives new insight from the outputs
    Synthesis,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Consensus => "consensus",
            MergeMode::Integration => "integration",
            MergeMode::Synthesis => "synthesis",
        }
    }

    pub fn requires_judge(&self) -> bool {
        !matches!(self, MergeMode::Consensus)
    }

    /// Sampling temperature for the judge call
    pub fn judge_temperature(&self) -> Option<f32> {
        match self {
            MergeMode::Consensus => None,
            MergeMode::Integration => Some(0.3),
            MergeMode::Synthesis => Some(0.7),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consensus" => Ok(MergeMode::Consensus),
            "integration" => Ok(MergeMode::Integration),
            "synthesis" => Ok(MergeMode::Synthesis),
            other => Err(format!(
                "unknown mode '{}', expected consensus, integration or synthesis",
                other
            )),
        }
    }
}

/// Longest text by character count. The earliest wins a tie.
pub fn longest_response<'a, I>(texts: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    texts
        .into_iter()
        .flatten()
        .fold(None, |best: Option<(&str, usize)>, text| {
            let len = text.chars().count();
            match best {
                Some((_, best_len)) if best_len >= len => best,
                _ => Some((text, len)),
            }
        })
        .map(|(text, _)| text)
}

/// Consensus-mode final answer
pub fn select_consensus<'a, I>(texts: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    longest_response(texts)
        .unwrap_or(NO_VALID_RESPONSES)
        .to_string()
}
