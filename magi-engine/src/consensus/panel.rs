use futures::future::join_all;
use magi_core::{StockAnalysis, UnitId};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{info, warn};

use super::orchestrator::Orchestrator;
use crate::llm::analyst::{self, AnalysisInput, HealthReport};
use crate::llm::decision_parser::DecisionParser;

/// Per-unit decisions for one symbol
#[derive(Debug, Clone)]
pub struct PanelAnalysis {
    pub symbol: String,
    /// One entry per analyst unit, `None` when the unit failed or is unconfigured
    pub results: Vec<(UnitId, Option<StockAnalysis>)>,
}

impl PanelAnalysis {
    pub fn valid_count(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_some()).count()
    }

    pub fn get(&self, unit: &str) -> Option<&StockAnalysis> {
        self.results
            .iter()
            .find(|(id, _)| id == unit)
            .and_then(|(_, analysis)| analysis.as_ref())
    }
}

struct UnitMap<'a>(&'a [(UnitId, Option<StockAnalysis>)]);

impl Serialize for UnitMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (unit, analysis) in self.0 {
            map.serialize_entry(unit, analysis)?;
        }
        map.end()
    }
}

impl Serialize for PanelAnalysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("symbol", &self.symbol)?;
        map.serialize_entry("units", &UnitMap(&self.results))?;
        map.serialize_entry("valid_responses", &self.valid_count())?;
        map.end()
    }
}

impl Orchestrator {
    /// Ask every analyst unit for a decision on one symbol, concurrently.
    /// Failed units are logged and left `None`.
    pub async fn run_panel_analysis(
        &self,
        parser: &DecisionParser,
        input: &AnalysisInput,
    ) -> PanelAnalysis {
        let slots: Vec<_> = self.analyst_slots().collect();
        info!("Panel analysis of {} across {} units", input.symbol, slots.len());

        let calls = slots.iter().map(|slot| async move {
            let Some(provider) = slot.provider.as_ref() else {
                return None;
            };
            match analyst::analyze_stock(provider.as_ref(), parser, input).await {
                Ok(analysis) => Some(analysis),
                Err(err) => {
                    warn!(
                        unit = %slot.unit,
                        provider = %err.provider,
                        status = ?err.status_code,
                        "Analysis failed: {}",
                        err.message
                    );
                    None
                }
            }
        });
        let results = join_all(calls).await;

        PanelAnalysis {
            symbol: input.symbol.clone(),
            results: slots
                .iter()
                .map(|slot| slot.unit.clone())
                .zip(results)
                .collect(),
        }
    }

    /// Health of every unit, including the judge, in roster order
    pub async fn health_check_all(&self) -> Vec<(UnitId, HealthReport)> {
        let checks = self.slots().iter().map(|slot| async move {
            let report = match slot.provider.as_ref() {
                Some(provider) => analyst::health_check(provider.as_ref()).await,
                None => HealthReport::unconfigured(slot.unit.clone()),
            };
            (slot.unit.clone(), report)
        });
        join_all(checks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::UnitSlot;
    use crate::llm::analyst::HealthStatus;
    use crate::llm::provider::Provider;
    use async_trait::async_trait;
    use magi_core::{Action, GenerationRequest, ProviderError};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixed(Result<&'static str, u16>);

    #[async_trait]
    impl Provider for Fixed {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn model(&self) -> &str {
            "fixed-1"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
            self.0
                .map(str::to_string)
                .map_err(|status| ProviderError::with_status("Fixed", status, "failed"))
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(vec![
            UnitSlot::configured("balthasar", Arc::new(Fixed(Ok("BUY, 80%")))),
            UnitSlot::configured("casper", Arc::new(Fixed(Err(500)))),
            UnitSlot::unconfigured("melchior"),
            UnitSlot::configured("mary", Arc::new(Fixed(Ok("judge")))),
        ])
        .with_judge_unit(Some("mary"))
    }

    #[tokio::test]
    async fn test_panel_excludes_judge_and_nulls_failures() {
        let panel = orchestrator()
            .run_panel_analysis(
                &DecisionParser::default(),
                &AnalysisInput::new("AAPL", json!({"price": 1})),
            )
            .await;

        let units: Vec<&str> = panel.results.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(units, vec!["balthasar", "casper", "melchior"]);
        assert_eq!(panel.valid_count(), 1);

        let balthasar = panel.get("balthasar").unwrap();
        assert_eq!(balthasar.decision.action, Action::Buy);
        assert_eq!(balthasar.decision.confidence, 80);
        assert!(panel.get("casper").is_none());

        let json = serde_json::to_value(&panel).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["units"]["balthasar"]["action"], "BUY");
        assert!(json["units"]["melchior"].is_null());
        assert_eq!(json["valid_responses"], 1);
    }

    #[tokio::test]
    async fn test_health_check_all() {
        let reports = orchestrator().health_check_all().await;

        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].1.status, HealthStatus::Healthy);
        assert_eq!(reports[1].1.status, HealthStatus::Unhealthy);
        assert_eq!(reports[2].1.status, HealthStatus::Unconfigured);
        assert_eq!(reports[3].0, "mary");
    }
}
