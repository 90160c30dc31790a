// Provider construction from configuration and roster wiring

use magi_core::{ProviderConfig, ProviderError, ProviderKind, UnitRoster, UnitSpec};
use std::sync::Arc;
use tracing::{info, warn};

use super::anthropic::AnthropicProvider;
use super::cohere::CohereProvider;
use super::gemini::GeminiProvider;
use super::openai_compat::ChatCompletionsProvider;
use super::provider::Provider;
use crate::consensus::UnitSlot;

/// Create the adapter matching the configured backend kind
pub fn build_provider(config: ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::OpenAi | ProviderKind::Xai | ProviderKind::Mistral | ProviderKind::Groq => {
            Arc::new(ChatCompletionsProvider::new(config)?)
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config)?),
        ProviderKind::Cohere => Arc::new(CohereProvider::new(config)?),
    };

    Ok(provider)
}

/// Build one slot per roster unit, resolving each unit's configuration with `resolve`.
///
/// Units without a configuration, or whose adapter fails to build, stay in
/// the roster with no provider.
pub fn slots_with<F>(roster: &UnitRoster, mut resolve: F) -> Vec<UnitSlot>
where
    F: FnMut(&UnitSpec) -> Option<ProviderConfig>,
{
    info!("Initializing {} MAGI units", roster.len());

    let slots: Vec<UnitSlot> = roster
        .units()
        .iter()
        .map(|unit| {
            let Some(config) = resolve(unit) else {
                warn!(
                    "Unit '{}' has no credential ({} unset), it will always be null",
                    unit.id,
                    unit.kind.api_key_env()
                );
                return UnitSlot::unconfigured(unit.id.clone());
            };

            let model = config.model.clone();
            match build_provider(config) {
                Ok(provider) => {
                    info!("Unit '{}' -> {} ({})", unit.id, provider.name(), model);
                    UnitSlot::configured(unit.id.clone(), provider)
                }
                Err(e) => {
                    warn!("Failed to initialize unit '{}': {}", unit.id, e);
                    UnitSlot::unconfigured(unit.id.clone())
                }
            }
        })
        .collect();

    let configured = slots.iter().filter(|s| s.is_configured()).count();
    if configured == 0 {
        warn!("No MAGI unit has a credential - every consensus will be empty");
    } else {
        info!("{}/{} MAGI units configured", configured, slots.len());
    }

    slots
}

/// Build slots from the credential and model environment variables
pub fn slots_from_env(roster: &UnitRoster) -> Vec<UnitSlot> {
    slots_with(roster, UnitSpec::config_from_env)
}
