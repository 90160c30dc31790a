use anyhow::{Context, Result};
use magi_services::SecurityConfig;
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reported by `/health`
    pub service_name: String,
    /// Sources listed in `/admin/security/status`
    pub status_top_n: usize,
    pub security: SecurityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            service_name: "magi-consensus".to_string(),
            status_top_n: 10,
            security: SecurityConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read the reference context document. A blank file counts as no context.
pub fn load_reference_context(path: Option<&Path>) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;

    if document.trim().is_empty() {
        tracing::warn!("Context file {} is empty, ignoring it", path.display());
        return Ok(None);
    }

    tracing::info!(
        "Loaded reference context from {} ({} chars)",
        path.display(),
        document.chars().count()
    );
    Ok(Some(document))
}
