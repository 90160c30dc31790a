pub mod alert;
pub mod gate;
pub mod sweeper;

// Re-export commonly used items
pub use alert::{alert_sink_from_env, AlertSink, LogAlertSink, TelegramNotifier};
pub use gate::{
    source_key, AlertKind, BlockedSource, GateOutcome, Rejection, SecurityAlert, SecurityConfig,
    SecurityGate, SecurityStatus, SourceActivity, SweepStats, Verdict,
};
pub use sweeper::SweepTask;
