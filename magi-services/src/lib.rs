pub mod security;
pub mod weights;

// Re-export commonly used items
pub use security::{
    alert_sink_from_env, source_key, AlertKind, AlertSink, GateOutcome, LogAlertSink, Rejection,
    SecurityAlert, SecurityConfig, SecurityGate, SecurityStatus, SweepStats, SweepTask,
    TelegramNotifier, Verdict,
};
pub use weights::{WeightError, WeightStore};
