use chrono::{DateTime, Utc};
use magi_core::UnitId;
use magi_engine::{AnalysisInput, MergeMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ApiError;

/// `POST /api/consensus` body
#[derive(Debug, Deserialize)]
pub struct ConsensusRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub meta: Option<ConsensusMeta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsensusMeta {
    #[serde(default)]
    pub mode: Option<String>,
}

impl ConsensusRequest {
    /// The non-blank prompt and the merge mode, `consensus` when absent
    pub fn validate(self) -> Result<(String, MergeMode), ApiError> {
        let prompt = self
            .prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidRequest("prompt is required".to_string()))?;

        let mode = match self.meta.and_then(|m| m.mode) {
            Some(mode) => mode.parse::<MergeMode>().map_err(ApiError::InvalidRequest)?,
            None => MergeMode::default(),
        };

        Ok((prompt, mode))
    }
}

/// `PUT /admin/weights` body
#[derive(Debug, Deserialize)]
pub struct WeightsRequest {
    pub weights: BTreeMap<UnitId, f64>,
}

/// `POST /api/analyze` body
pub fn validate_analysis(input: AnalysisInput) -> Result<AnalysisInput, ApiError> {
    if input.symbol.trim().is_empty() {
        return Err(ApiError::InvalidRequest("symbol is required".to_string()));
    }
    Ok(input)
}

/// `GET /health` response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub context_loaded: bool,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ConsensusRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_mode_defaults_to_consensus() {
        let (prompt, mode) = parse(json!({"prompt": "Is AAPL a buy?"})).validate().unwrap();
        assert_eq!(prompt, "Is AAPL a buy?");
        assert_eq!(mode, MergeMode::Consensus);

        let (_, mode) = parse(json!({"prompt": "x", "meta": {}})).validate().unwrap();
        assert_eq!(mode, MergeMode::Consensus);
    }

    #[test]
    fn test_explicit_mode() {
        let (_, mode) = parse(json!({"prompt": "x", "meta": {"mode": "synthesis"}}))
            .validate()
            .unwrap();
        assert_eq!(mode, MergeMode::Synthesis);
    }

    #[test]
    fn test_blank_or_missing_prompt_rejected() {
        for body in [json!({}), json!({"prompt": ""}), json!({"prompt": "   "})] {
            let err = parse(body).validate().unwrap_err();
            assert!(matches!(err, ApiError::InvalidRequest(ref m) if m == "prompt is required"));
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err = parse(json!({"prompt": "x", "meta": {"mode": "vote"}}))
            .validate()
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_analysis_defaults() {
        let input: AnalysisInput = serde_json::from_value(json!({"symbol": "7203"})).unwrap();
        let input = validate_analysis(input).unwrap();
        assert!(input.data.is_null());
        assert!(input.context.is_none());

        let blank: AnalysisInput = serde_json::from_value(json!({"symbol": " "})).unwrap();
        assert!(validate_analysis(blank).is_err());
    }
}
