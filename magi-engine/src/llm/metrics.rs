//! Consensus run metrics
//!
//! Tracks the fan-out latency, how many units answered and whether a
//! reference document was injected. Reported through `tracing` only.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Metrics attached to every consensus response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsensusMetrics {
    /// Wall-clock time of the fan-out (milliseconds)
    pub response_time_ms: u64,

    /// Units that returned text
    pub valid_responses: usize,

    /// `valid_responses / total units`, within 0..=1
    pub agreement_ratio: f64,

    /// Whether the prompt was wrapped with a reference document
    pub context_used: bool,
}

impl ConsensusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response_time(&mut self, duration: Duration) {
        self.response_time_ms = duration.as_millis() as u64;
    }

    /// Record valid responses out of the total unit count
    pub fn set_agreement(&mut self, valid: usize, total: usize) {
        self.valid_responses = valid;
        self.agreement_ratio = if total == 0 {
            0.0
        } else {
            (valid as f64 / total as f64).clamp(0.0, 1.0)
        };
    }

    pub fn set_context_used(&mut self, context_used: bool) {
        self.context_used = context_used;
    }

    /// Report metrics to tracing logs
    pub fn report(&self, mode: &str) {
        tracing::info!(
            "Consensus Metrics: mode={}, fan_out={}ms, valid={}, agreement={:.2}, context={}",
            mode,
            self.response_time_ms,
            self.valid_responses,
            self.agreement_ratio,
            self.context_used,
        );
    }
}

/// Timer helper for measuring operation latency
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ConsensusMetrics::new();
        assert_eq!(metrics.response_time_ms, 0);
        assert_eq!(metrics.valid_responses, 0);
        assert_eq!(metrics.agreement_ratio, 0.0);
        assert!(!metrics.context_used);
    }

    #[test]
    fn test_agreement_ratio() {
        let mut metrics = ConsensusMetrics::new();
        metrics.set_agreement(3, 4);
        assert_eq!(metrics.valid_responses, 3);
        assert_eq!(metrics.agreement_ratio, 0.75);

        metrics.set_agreement(0, 0);
        assert_eq!(metrics.agreement_ratio, 0.0);
    }

    #[test]
    fn test_response_time_setter() {
        let mut metrics = ConsensusMetrics::new();
        metrics.set_response_time(Duration::from_millis(1250));
        assert_eq!(metrics.response_time_ms, 1250);
    }

    #[test]
    fn test_timer() {
        let timer = MetricsTimer::start();
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10);
        assert!(timer.stop().as_millis() >= 10);
    }

    #[test]
    fn test_serializes_wire_names() {
        let mut metrics = ConsensusMetrics::new();
        metrics.set_agreement(1, 2);
        metrics.set_context_used(true);

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["valid_responses"], 1);
        assert_eq!(json["agreement_ratio"], 0.5);
        assert_eq!(json["context_used"], true);
        assert!(json.get("response_time_ms").is_some());
    }
}
