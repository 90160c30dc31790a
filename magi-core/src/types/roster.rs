use serde::{Deserialize, Serialize};

use super::provider_config::{ProviderConfig, ProviderKind};
use super::UnitId;

/// One logical slot in the roster and the backend it maps to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub id: UnitId,
    pub kind: ProviderKind,
    /// Overrides the backend's default sampling temperature
    pub temperature: Option<f32>,
    /// Overrides the backend's default token budget
    pub max_tokens: Option<u32>,
}

impl UnitSpec {
    pub fn new(id: impl Into<UnitId>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Apply this unit's overrides on top of a backend configuration
    pub fn apply(&self, mut config: ProviderConfig) -> ProviderConfig {
        if let Some(temperature) = self.temperature {
            config.default_temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        config
    }

    /// Backend configuration from the environment, `None` if no credential is set
    pub fn config_from_env(&self) -> Option<ProviderConfig> {
        ProviderConfig::from_env(self.kind).map(|config| self.apply(config))
    }
}

/// Ordered set of units. Order is the configuration order used for tie-breaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRoster {
    units: Vec<UnitSpec>,
    judge: Option<UnitId>,
}

impl UnitRoster {
    pub fn new(units: Vec<UnitSpec>, judge: Option<UnitId>) -> Self {
        Self { units, judge }
    }

    /// The five-unit MAGI roster with MARY as judge
    pub fn magi_default() -> Self {
        Self::new(
            vec![
                UnitSpec::new("balthasar", ProviderKind::Xai).with_temperature(0.5),
                UnitSpec::new("melchior", ProviderKind::Gemini).with_temperature(0.2),
                UnitSpec::new("casper", ProviderKind::Anthropic)
                    .with_temperature(0.4)
                    .with_max_tokens(1024),
                UnitSpec::new("mary", ProviderKind::OpenAi).with_temperature(0.3),
                UnitSpec::new("sophia", ProviderKind::Mistral).with_temperature(0.3),
            ],
            Some("mary".to_string()),
        )
    }

    pub fn units(&self) -> &[UnitSpec] {
        &self.units
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|u| u.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&UnitSpec> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn judge(&self) -> Option<&str> {
        self.judge.as_deref()
    }

    pub fn with_judge(mut self, judge: Option<UnitId>) -> Self {
        self.judge = judge;
        self
    }

    /// Units that analyse on their own, i.e. everything except the judge
    pub fn analysts(&self) -> impl Iterator<Item = &UnitSpec> {
        self.units
            .iter()
            .filter(move |u| Some(u.id.as_str()) != self.judge.as_deref())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Default for UnitRoster {
    fn default() -> Self {
        Self::magi_default()
    }
}
