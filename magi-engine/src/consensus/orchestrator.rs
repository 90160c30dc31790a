use futures::future::join_all;
use magi_core::{GenerationRequest, GenerationResult, ProviderError, UnitId};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::merge::{select_consensus, MergeMode};
use crate::llm::metrics::{ConsensusMetrics, MetricsTimer};
use crate::llm::prompt_formatter::PromptFormatter;
use crate::llm::provider::Provider;

/// Name reported on errors raised by a missing judge
const JUDGE: &str = "judge";

/// A roster unit and its provider, if one could be configured
#[derive(Clone)]
pub struct UnitSlot {
    pub unit: UnitId,
    pub provider: Option<Arc<dyn Provider>>,
}

impl UnitSlot {
    pub fn new(unit: impl Into<UnitId>, provider: Option<Arc<dyn Provider>>) -> Self {
        Self {
            unit: unit.into(),
            provider,
        }
    }

    pub fn configured(unit: impl Into<UnitId>, provider: Arc<dyn Provider>) -> Self {
        Self::new(unit, Some(provider))
    }

    pub fn unconfigured(unit: impl Into<UnitId>) -> Self {
        Self::new(unit, None)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }
}

impl fmt::Debug for UnitSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitSlot")
            .field("unit", &self.unit)
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct JudgeInfo {
    /// Model of the judge, `None` when no judge is configured
    pub model: Option<String>,
    pub method: MergeMode,
}

/// Outcome of one consensus run.
///
/// `per_unit` holds exactly one entry per configured unit, in roster order.
/// Entries are `None` for units that failed or have no provider.
#[derive(Debug, Clone)]
pub struct ConsensusResponse {
    pub final_answer: String,
    pub per_unit: Vec<(UnitId, Option<GenerationResult>)>,
    pub metrics: ConsensusMetrics,
    pub judge: JudgeInfo,
}

impl ConsensusResponse {
    pub fn mode(&self) -> MergeMode {
        self.judge.method
    }

    pub fn unit(&self, unit: &str) -> Option<&GenerationResult> {
        self.per_unit
            .iter()
            .find(|(id, _)| id == unit)
            .and_then(|(_, result)| result.as_ref())
    }

    pub fn unit_text(&self, unit: &str) -> Option<&str> {
        self.unit(unit).and_then(GenerationResult::text)
    }

    /// Unit id to text or null, in roster order
    pub fn unit_texts(&self) -> Map<String, Value> {
        unit_text_map(&self.per_unit)
    }
}

// Flat wire shape: {"final", "<unit>": text|null ..., "metrics", "judge"}
impl Serialize for ConsensusResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.per_unit.len() + 3))?;
        map.serialize_entry("final", &self.final_answer)?;
        for (unit, result) in &self.per_unit {
            map.serialize_entry(unit, &result.as_ref().and_then(GenerationResult::text))?;
        }
        map.serialize_entry("metrics", &self.metrics)?;
        map.serialize_entry("judge", &self.judge)?;
        map.end()
    }
}

fn unit_text_map(per_unit: &[(UnitId, Option<GenerationResult>)]) -> Map<String, Value> {
    per_unit
        .iter()
        .map(|(unit, result)| {
            let text = result
                .as_ref()
                .and_then(GenerationResult::text)
                .map_or(Value::Null, |t| Value::String(t.to_string()));
            (unit.clone(), text)
        })
        .collect()
}

/// Fans a prompt out to every unit and merges the results
pub struct Orchestrator {
    slots: Vec<UnitSlot>,
    judge: Option<Arc<dyn Provider>>,
    judge_unit: Option<UnitId>,
    reference_context: Option<String>,
}

impl Orchestrator {
    pub fn new(slots: Vec<UnitSlot>) -> Self {
        Self {
            slots,
            judge: None,
            judge_unit: None,
            reference_context: None,
        }
    }

    /// Use the provider of the named unit as judge. The unit keeps answering
    /// in the fan-out.
    pub fn with_judge_unit(mut self, unit: Option<&str>) -> Self {
        self.judge_unit = unit.map(str::to_string);
        self.judge = unit.and_then(|unit| {
            self.slots
                .iter()
                .find(|slot| slot.unit == unit)
                .and_then(|slot| slot.provider.clone())
        });
        self
    }

    /// Use a provider outside the roster as judge
    pub fn with_judge(mut self, judge: Arc<dyn Provider>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Wrap every consensus prompt with this document. Empty documents are ignored.
    pub fn with_reference_context(mut self, document: Option<String>) -> Self {
        self.reference_context = document.filter(|doc| !doc.trim().is_empty());
        self
    }

    pub fn slots(&self) -> &[UnitSlot] {
        &self.slots
    }

    pub fn judge(&self) -> Option<&Arc<dyn Provider>> {
        self.judge.as_ref()
    }

    pub fn judge_unit(&self) -> Option<&str> {
        self.judge_unit.as_deref()
    }

    pub fn has_reference_context(&self) -> bool {
        self.reference_context.is_some()
    }

    /// Slots that analyse on their own, i.e. all but the judge unit
    pub fn analyst_slots(&self) -> impl Iterator<Item = &UnitSlot> {
        self.slots
            .iter()
            .filter(move |slot| Some(slot.unit.as_str()) != self.judge_unit.as_deref())
    }

    pub fn slot(&self, unit: &str) -> Option<&UnitSlot> {
        self.slots.iter().find(|slot| slot.unit == unit)
    }

    /// The prompt actually sent to the units
    pub fn build_prompt(&self, prompt: &str) -> String {
        match &self.reference_context {
            Some(document) => PromptFormatter::with_reference_context(document, prompt),
            None => prompt.to_string(),
        }
    }

    /// Call every configured unit concurrently and wait for all of them.
    ///
    /// One entry per slot in roster order; `None` when the slot has no provider.
    /// A failing call never affects its siblings.
    pub async fn fan_out(
        &self,
        request: &GenerationRequest,
    ) -> Vec<(UnitId, Option<GenerationResult>)> {
        let calls = self.slots.iter().map(|slot| async move {
            let Some(provider) = slot.provider.as_ref() else {
                return None;
            };

            let timer = MetricsTimer::start();
            let result = match provider.generate(request).await {
                Ok(text) => GenerationResult::success(provider.name(), text, timer.elapsed_ms()),
                Err(err) => {
                    warn!(
                        unit = %slot.unit,
                        provider = %err.provider,
                        status = ?err.status_code,
                        "Unit call failed: {}",
                        err.message
                    );
                    GenerationResult::failure(provider.name(), err, timer.elapsed_ms())
                }
            };
            Some(result)
        });

        let results = join_all(calls).await;

        self.slots
            .iter()
            .map(|slot| slot.unit.clone())
            .zip(results)
            .collect()
    }

    /// Run one consensus round.
    ///
    /// Only a judge failure in integration or synthesis mode is an error; unit
    /// failures just leave their entry null.
    pub async fn run_consensus(
        &self,
        prompt: &str,
        mode: MergeMode,
    ) -> Result<ConsensusResponse, ProviderError> {
        info!(
            "Running {} across {} units (context={})",
            mode,
            self.slots.len(),
            self.has_reference_context()
        );

        let request = GenerationRequest::new(self.build_prompt(prompt));
        debug!("Backend prompt: {} chars", request.prompt.chars().count());

        let timer = MetricsTimer::start();
        let per_unit: Vec<(UnitId, Option<GenerationResult>)> = self
            .fan_out(&request)
            .await
            .into_iter()
            .map(|(unit, result)| (unit, result.filter(GenerationResult::is_success)))
            .collect();
        let fan_out_time = timer.stop();

        let valid = per_unit.iter().filter(|(_, result)| result.is_some()).count();

        let final_answer = match mode {
            MergeMode::Consensus => select_consensus(
                per_unit
                    .iter()
                    .map(|(_, result)| result.as_ref().and_then(GenerationResult::text)),
            ),
            MergeMode::Integration | MergeMode::Synthesis => {
                self.judge_merge(&per_unit, mode).await?
            }
        };

        let mut metrics = ConsensusMetrics::new();
        metrics.set_response_time(fan_out_time);
        metrics.set_agreement(valid, per_unit.len());
        metrics.set_context_used(self.has_reference_context());
        metrics.report(mode.as_str());

        Ok(ConsensusResponse {
            final_answer,
            per_unit,
            metrics,
            judge: JudgeInfo {
                model: self.judge.as_ref().map(|judge| judge.model().to_string()),
                method: mode,
            },
        })
    }

    async fn judge_merge(
        &self,
        per_unit: &[(UnitId, Option<GenerationResult>)],
        mode: MergeMode,
    ) -> Result<String, ProviderError> {
        let Some(judge) = self.judge.as_ref() else {
            error!("{} requested but no judge is configured", mode);
            return Err(ProviderError::new(JUDGE, "judge provider is not configured"));
        };

        let responses = Value::Object(unit_text_map(per_unit));
        let prompt = match mode {
            MergeMode::Synthesis => PromptFormatter::format_synthesis(&responses),
            _ => PromptFormatter::format_integration(per_unit.len(), &responses),
        };

        let mut request = GenerationRequest::new(prompt);
        if let Some(temperature) = mode.judge_temperature() {
            request = request.with_temperature(temperature);
        }

        judge.generate(&request).await.map_err(|err| {
            error!(
                provider = %err.provider,
                status = ?err.status_code,
                "Judge failed during {}: {}",
                mode,
                err.message
            );
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(&'static str, Result<&'static str, u16>);

    #[async_trait]
    impl Provider for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn model(&self) -> &str {
            "fixed-1"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
            self.1
                .map(str::to_string)
                .map_err(|status| ProviderError::with_status(self.0, status, "failed"))
        }
    }

    fn slot(unit: &str, reply: Result<&'static str, u16>) -> UnitSlot {
        UnitSlot::configured(unit, Arc::new(Fixed("Fixed", reply)))
    }

    #[tokio::test]
    async fn test_consensus_picks_longest() {
        let orchestrator = Orchestrator::new(vec![
            slot("a", Ok("ab")),
            slot("b", Ok("abc")),
            slot("c", Ok("a")),
        ]);

        let response = orchestrator
            .run_consensus("q", MergeMode::Consensus)
            .await
            .unwrap();

        assert_eq!(response.final_answer, "abc");
        assert_eq!(response.metrics.valid_responses, 3);
        assert_eq!(response.metrics.agreement_ratio, 1.0);
        assert_eq!(response.judge.model, None);
    }

    #[tokio::test]
    async fn test_failures_become_null() {
        let orchestrator = Orchestrator::new(vec![
            slot("a", Err(500)),
            UnitSlot::unconfigured("b"),
            slot("c", Ok("only")),
            slot("d", Err(429)),
        ]);

        let response = orchestrator
            .run_consensus("q", MergeMode::Consensus)
            .await
            .unwrap();

        assert_eq!(response.per_unit.len(), 4);
        assert_eq!(response.final_answer, "only");
        assert_eq!(response.metrics.valid_responses, 1);
        assert_eq!(response.metrics.agreement_ratio, 0.25);
        assert!(response.unit("a").is_none());
        assert!(response.unit("b").is_none());
        assert_eq!(response.unit_text("c"), Some("only"));
    }

    #[tokio::test]
    async fn test_fan_out_keeps_failures() {
        let orchestrator = Orchestrator::new(vec![slot("a", Err(503)), UnitSlot::unconfigured("b")]);
        let outcomes = orchestrator.fan_out(&GenerationRequest::new("q")).await;

        assert_eq!(outcomes.len(), 2);
        let failed = outcomes[0].1.as_ref().unwrap();
        assert_eq!(failed.error().and_then(|e| e.status_code), Some(503));
        assert!(outcomes[1].1.is_none());
    }

    #[tokio::test]
    async fn test_integration_without_judge_fails() {
        let orchestrator = Orchestrator::new(vec![slot("a", Ok("x"))]);
        let err = orchestrator
            .run_consensus("q", MergeMode::Integration)
            .await
            .unwrap_err();
        assert_eq!(err.provider, "judge");
    }

    #[tokio::test]
    async fn test_judge_unit_is_resolved_from_slots() {
        let orchestrator = Orchestrator::new(vec![slot("a", Ok("x")), slot("mary", Ok("merged"))])
            .with_judge_unit(Some("mary"));

        assert!(orchestrator.judge().is_some());
        let analysts: Vec<&str> = orchestrator.analyst_slots().map(|s| s.unit.as_str()).collect();
        assert_eq!(analysts, vec!["a"]);

        let response = orchestrator
            .run_consensus("q", MergeMode::Synthesis)
            .await
            .unwrap();
        assert_eq!(response.final_answer, "merged");
        assert_eq!(response.judge.model.as_deref(), Some("fixed-1"));
        assert_eq!(response.mode(), MergeMode::Synthesis);
    }

    #[test]
    fn test_reference_context_prompt() {
        let orchestrator =
            Orchestrator::new(Vec::new()).with_reference_context(Some("DOC".to_string()));
        assert!(orchestrator.has_reference_context());
        assert!(orchestrator.build_prompt("Q").ends_with("# User Question:\nQ"));

        let blank = Orchestrator::new(Vec::new()).with_reference_context(Some("  ".to_string()));
        assert!(!blank.has_reference_context());
        assert_eq!(blank.build_prompt("Q"), "Q");
    }

    #[tokio::test]
    async fn test_serializes_flat_shape() {
        let orchestrator = Orchestrator::new(vec![slot("balthasar", Ok("yes")), slot("casper", Err(500))]);
        let response = orchestrator
            .run_consensus("q", MergeMode::Consensus)
            .await
            .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["final"], "yes");
        assert_eq!(json["balthasar"], "yes");
        assert!(json["casper"].is_null());
        assert_eq!(json["metrics"]["valid_responses"], 1);
        assert_eq!(json["judge"]["method"], "consensus");
        assert!(json["judge"]["model"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 5);
    }
}
