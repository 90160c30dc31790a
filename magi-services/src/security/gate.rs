//! Request admission: per-source fixed-window rate limiting, suspicious path
//! detection, temporary auto-blocking and alert cooldowns.
//!
//! All state lives behind one mutex so a request's bookkeeping is atomic.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Gate thresholds and timings
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityConfig {
    /// Fixed counting window
    pub window: Duration,
    /// Requests allowed per window
    pub max_requests: u32,
    /// Requests allowed per window on admin paths
    pub admin_max_requests: u32,
    pub admin_prefix: String,
    /// Count above which a source is blocked
    pub block_threshold: u32,
    pub block_duration: Duration,
    /// Minimum gap between two alerts for the same source
    pub alert_cooldown: Duration,
    pub sweep_interval: std::time::Duration,
    /// Lowercase fragments rejected wherever they appear in a path
    pub suspicious_paths: Vec<String>,
    /// Distinct paths remembered per source and window
    pub max_recent_paths: usize,
    /// Service label included in alerts
    pub service_name: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            window: Duration::seconds(60),
            max_requests: 60,
            admin_max_requests: 10,
            admin_prefix: "/admin".to_string(),
            block_threshold: 200,
            block_duration: Duration::minutes(30),
            alert_cooldown: Duration::minutes(5),
            sweep_interval: std::time::Duration::from_secs(5 * 60),
            suspicious_paths: [
                "/wp-admin",
                "/wp-login",
                "/.env",
                "/phpinfo",
                "/admin.php",
                "/.git",
                "/config",
                "/backup",
                "/shell",
                "/cmd",
                "/exec",
                "/eval",
                "/../",
                "/etc/passwd",
                "/proc/self",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            max_recent_paths: 50,
            service_name: "magi".to_string(),
        }
    }
}

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Source is on the block list
    Blocked,
    /// Path matched a suspicious fragment
    NotFound,
    /// This request pushed the source over the block threshold
    AutoBlocked,
    RateLimited,
}

impl Rejection {
    pub fn status_code(&self) -> u16 {
        match self {
            Rejection::NotFound => 404,
            _ => 429,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rejection::Blocked => "Too many requests. Try again later.",
            Rejection::NotFound => "Not found",
            Rejection::AutoBlocked => "Blocked due to excessive requests.",
            Rejection::RateLimited => "Rate limit exceeded. Try again later.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// `count` requests seen in the current window against `limit`
    Admit { count: u32, limit: u32 },
    Reject(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SuspiciousPath,
    Blocked,
    RateLimited,
}

/// Alert raised by the gate, to be delivered out of band
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityAlert {
    pub kind: AlertKind,
    pub source: String,
    /// Telegram-flavoured HTML body
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub verdict: Verdict,
    pub alert: Option<SecurityAlert>,
}

impl GateOutcome {
    fn admit(count: u32, limit: u32) -> Self {
        Self {
            verdict: Verdict::Admit { count, limit },
            alert: None,
        }
    }

    fn reject(rejection: Rejection, alert: Option<SecurityAlert>) -> Self {
        Self {
            verdict: Verdict::Reject(rejection),
            alert,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self.verdict, Verdict::Admit { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub sources_removed: usize,
    pub alerts_removed: usize,
    pub unblocked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedSource {
    pub source: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceActivity {
    pub source: String,
    pub count: u32,
    /// Distinct paths seen in the current window
    pub paths: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityStatus {
    pub active_sources: usize,
    pub blocked: Vec<BlockedSource>,
    pub recent_requests: Vec<SourceActivity>,
}

#[derive(Debug, Clone)]
struct RateState {
    count: u32,
    window_start: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    recent_paths: Vec<String>,
    blocked_at: Option<DateTime<Utc>>,
}

impl RateState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
            last_seen: now,
            recent_paths: Vec::new(),
            blocked_at: None,
        }
    }

    fn record_path(&mut self, path: &str, cap: usize) {
        if self.recent_paths.len() < cap && !self.recent_paths.iter().any(|p| p == path) {
            self.recent_paths.push(path.to_string());
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    rates: HashMap<String, RateState>,
    /// source -> block expiry
    blocklist: HashMap<String, DateTime<Utc>>,
    /// source -> last alert time
    alerts: HashMap<String, DateTime<Utc>>,
}

impl GateState {
    fn should_alert(&mut self, source: &str, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.alerts.get(source) {
            Some(last) if now - *last <= cooldown => false,
            _ => {
                self.alerts.insert(source.to_string(), now);
                true
            }
        }
    }
}

pub struct SecurityGate {
    config: SecurityConfig,
    state: Mutex<GateState>,
}

impl SecurityGate {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config,
            state: Mutex::new(GateState::default()),
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Decide whether a request from `source` for `path` may proceed
    pub fn check(&self, source: &str, method: &str, path: &str, now: DateTime<Utc>) -> GateOutcome {
        let config = &self.config;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        // 1. Block list, expiring lazily
        if let Some(expires_at) = state.blocklist.get(source).copied() {
            if expires_at > now {
                warn!("BLOCKED request from {}: {} {}", source, method, path);
                return GateOutcome::reject(Rejection::Blocked, None);
            }
            state.blocklist.remove(source);
            if let Some(rate) = state.rates.get_mut(source) {
                rate.blocked_at = None;
            }
            info!("Source unblocked: {}", source);
        }

        // 2. Suspicious paths are rejected before counting
        let lowered = path.to_lowercase();
        if config.suspicious_paths.iter().any(|p| lowered.contains(p.as_str())) {
            warn!("SUSPICIOUS PATH from {}: {} {}", source, method, path);
            let alert = state
                .should_alert(source, now, config.alert_cooldown)
                .then(|| SecurityAlert {
                    kind: AlertKind::SuspiciousPath,
                    source: source.to_string(),
                    message: format!(
                        "<b>Suspicious Request</b>\nIP: <code>{}</code>\nPath: <code>{} {}</code>\nService: {}",
                        escape_html(source),
                        escape_html(method),
                        escape_html(path),
                        config.service_name
                    ),
                });
            return GateOutcome::reject(Rejection::NotFound, alert);
        }

        // 3. Fixed window count
        let rate = state
            .rates
            .entry(source.to_string())
            .or_insert_with(|| RateState::new(now));
        if now - rate.window_start > config.window {
            rate.count = 0;
            rate.window_start = now;
            rate.recent_paths.clear();
        }
        rate.count = rate.count.saturating_add(1);
        rate.last_seen = now;
        rate.record_path(path, config.max_recent_paths);

        let count = rate.count;
        let is_admin = path.starts_with(config.admin_prefix.as_str());
        let limit = if is_admin {
            config.admin_max_requests
        } else {
            config.max_requests
        };

        // 4. Hard threshold blocks the source
        if count > config.block_threshold {
            rate.blocked_at = Some(now);
            let paths = rate
                .recent_paths
                .iter()
                .take(5)
                .map(|p| escape_html(p))
                .collect::<Vec<_>>()
                .join(", ");
            state
                .blocklist
                .insert(source.to_string(), now + config.block_duration);

            error!(
                "SOURCE BLOCKED: {} ({} requests in window, blocked for {} min)",
                source,
                count,
                config.block_duration.num_minutes()
            );
            let alert = state
                .should_alert(source, now, config.alert_cooldown)
                .then(|| SecurityAlert {
                    kind: AlertKind::Blocked,
                    source: source.to_string(),
                    message: format!(
                        "<b>🔴 IP BLOCKED</b>\nIP: <code>{}</code>\nRequests: {}/min\nPaths: {}\nService: {}\nDuration: {} minutes",
                        escape_html(source),
                        count,
                        paths,
                        config.service_name,
                        config.block_duration.num_minutes()
                    ),
                });
            return GateOutcome::reject(Rejection::AutoBlocked, alert);
        }

        // 5. Soft limit; alert only on the first excess request of the window
        if count > limit {
            warn!(
                "RATE LIMITED: {} ({}/{} per window) {} {}",
                source, count, limit, method, path
            );
            let alert = (count == limit + 1
                && state.should_alert(source, now, config.alert_cooldown))
            .then(|| SecurityAlert {
                kind: AlertKind::RateLimited,
                source: source.to_string(),
                message: format!(
                    "<b>⚠️ Rate Limit Hit</b>\nIP: <code>{}</code>\nRequests: {}/{}/min\n{}\nService: {}",
                    escape_html(source),
                    count,
                    limit,
                    if is_admin { "(Admin endpoint)" } else { "" },
                    config.service_name
                ),
            });
            return GateOutcome::reject(Rejection::RateLimited, alert);
        }

        GateOutcome::admit(count, limit)
    }

    /// Drop idle sources, stale alert cooldowns and expired blocks
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepStats {
        let idle_after = self.config.window * 2;
        let cooldown = self.config.alert_cooldown;
        let mut state = self.state.lock();

        let sources_before = state.rates.len();
        state.rates.retain(|_, rate| now - rate.last_seen <= idle_after);

        let alerts_before = state.alerts.len();
        state.alerts.retain(|_, last| now - *last <= cooldown);

        let blocked_before = state.blocklist.len();
        state.blocklist.retain(|source, expires_at| {
            let keep = *expires_at > now;
            if !keep {
                info!("Source unblocked: {}", source);
            }
            keep
        });

        SweepStats {
            sources_removed: sources_before - state.rates.len(),
            alerts_removed: alerts_before - state.alerts.len(),
            unblocked: blocked_before - state.blocklist.len(),
        }
    }

    /// Monitoring snapshot: active blocks and the `top_n` busiest sources
    pub fn status(&self, top_n: usize, now: DateTime<Utc>) -> SecurityStatus {
        let state = self.state.lock();

        let mut blocked: Vec<BlockedSource> = state
            .blocklist
            .iter()
            .filter(|(_, expires_at)| **expires_at > now)
            .map(|(source, expires_at)| BlockedSource {
                source: source.clone(),
                expires_at: *expires_at,
            })
            .collect();
        blocked.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.source.cmp(&b.source)));

        let mut recent_requests: Vec<SourceActivity> = state
            .rates
            .iter()
            .map(|(source, rate)| SourceActivity {
                source: source.clone(),
                count: rate.count,
                paths: rate.recent_paths.len(),
                blocked_at: rate.blocked_at,
            })
            .collect();
        recent_requests.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
        recent_requests.truncate(top_n);

        SecurityStatus {
            active_sources: state.rates.len(),
            blocked,
            recent_requests,
        }
    }

    pub fn is_blocked(&self, source: &str, now: DateTime<Utc>) -> bool {
        self.state
            .lock()
            .blocklist
            .get(source)
            .is_some_and(|expires_at| *expires_at > now)
    }
}

/// Client identity: first `x-forwarded-for` entry, else the peer address
pub fn source_key(forwarded_for: Option<&str>, peer: Option<&str>) -> String {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .or(peer)
        .unwrap_or("unknown")
        .to_string()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
