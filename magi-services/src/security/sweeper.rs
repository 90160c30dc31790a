use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::gate::SecurityGate;

/// Background task running [`SecurityGate::sweep`] on a fixed interval
pub struct SweepTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Must be called inside a tokio runtime
    pub fn spawn(gate: Arc<SecurityGate>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let stats = gate.sweep(Utc::now());
                        tracing::debug!(
                            "Security sweep: removed {} sources, {} alert cooldowns, {} blocks",
                            stats.sources_removed,
                            stats.alerts_removed,
                            stats.unblocked
                        );
                    }
                }
            }
            tracing::debug!("Security sweep stopped");
        });

        tracing::info!("Security sweep running every {}s", period.as_secs());
        Self { token, handle }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("Security sweep task ended abnormally: {}", e);
        }
    }
}
