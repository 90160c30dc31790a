use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::gate::SecurityAlert;

const TELEGRAM_API: &str = "https://api.telegram.org";
const ALERT_PREFIX: &str = "🚨 SECURITY ALERT\n";

/// Delivers gate alerts. Delivery failures are logged, never surfaced.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &SecurityAlert);
}

/// Writes alerts to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, alert: &SecurityAlert) {
        tracing::warn!(
            kind = ?alert.kind,
            source = %alert.source,
            "Security alert: {}",
            alert.message.replace('\n', " | ")
        );
    }
}

/// Posts alerts to a Telegram chat through the Bot API
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: TELEGRAM_API.to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Configured from `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`; `None` if either is unset
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|v| !v.is_empty())?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok().filter(|v| !v.is_empty())?;
        Some(Self::new(token, chat_id))
    }

    fn url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    /// Post one alert. Errors never contain the request URL, which holds the token.
    async fn deliver(&self, alert: &SecurityAlert) -> Result<(), String> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: format!("{}{}", ALERT_PREFIX, alert.message),
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(self.url())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Telegram alert failed: {}", e.without_url()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("Telegram alert rejected: HTTP {}", response.status()))
        }
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn send(&self, alert: &SecurityAlert) {
        match self.deliver(alert).await {
            Ok(()) => tracing::debug!("Telegram alert delivered for {}", alert.source),
            Err(e) => tracing::warn!("{}", e),
        }
    }
}

/// Telegram when configured, otherwise the log
pub fn alert_sink_from_env() -> Arc<dyn AlertSink> {
    match TelegramNotifier::from_env() {
        Some(notifier) => {
            tracing::info!("Security alerts will be sent to Telegram");
            Arc::new(notifier)
        }
        None => {
            tracing::info!("Telegram not configured, security alerts go to the log");
            Arc::new(LogAlertSink)
        }
    }
}
