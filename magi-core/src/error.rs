use thiserror::Error;

/// Normalized failure of a single backend call.
///
/// Produced for non-2xx responses, malformed bodies, exhausted transport
/// retries and an unavailable judge. `status_code` is only set when a
/// response was actually received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{provider}] {message}")]
pub struct ProviderError {
    pub provider: String,
    pub status_code: Option<u16>,
    pub message: String,
}

impl ProviderError {
    /// Error without an HTTP status (transport failure, configuration, judge)
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status_code: None,
            message: message.into(),
        }
    }

    /// Error for a response that was received with the given status
    pub fn with_status(
        provider: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            status_code: Some(status_code),
            message: message.into(),
        }
    }
}
