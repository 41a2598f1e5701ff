use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection quality as judged from message recency
///
/// `Unknown` holds until the first message arrives; `Offline` is terminal
/// (explicit disconnect or reconnection exhaustion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Unknown,
    Good,
    Degraded,
    Poor,
    Dead,
    Reconnecting,
    Offline,
}

/// Liveness thresholds and reconnection tuning
///
/// Every field is runtime-tunable; a replaced config takes effect on the
/// monitor's next tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Quality drops to `Degraded` once this much time passes without a message
    #[serde(default = "default_degraded_threshold_ms")]
    pub degraded_threshold_ms: u64,

    /// Quality drops to `Poor` past this
    #[serde(default = "default_poor_threshold_ms")]
    pub poor_threshold_ms: u64,

    /// Dead-connection threshold while the participant is (recently) speaking
    #[serde(default = "default_zombie_timeout_speaking_ms")]
    pub zombie_timeout_speaking_ms: u64,

    /// Dead-connection threshold during silence
    #[serde(default = "default_zombie_timeout_silent_ms")]
    pub zombie_timeout_silent_ms: u64,

    /// How long after speech ends the stricter speaking threshold still applies
    #[serde(default = "default_speech_grace_period_ms")]
    pub speech_grace_period_ms: u64,

    /// Total reconnection attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// First backoff wait; doubles per failed attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_degraded_threshold_ms() -> u64 {
    3_000
}

fn default_poor_threshold_ms() -> u64 {
    5_000
}

fn default_zombie_timeout_speaking_ms() -> u64 {
    10_000
}

fn default_zombie_timeout_silent_ms() -> u64 {
    60_000
}

fn default_speech_grace_period_ms() -> u64 {
    5_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_threshold_ms: default_degraded_threshold_ms(),
            poor_threshold_ms: default_poor_threshold_ms(),
            zombie_timeout_speaking_ms: default_zombie_timeout_speaking_ms(),
            zombie_timeout_silent_ms: default_zombie_timeout_silent_ms(),
            speech_grace_period_ms: default_speech_grace_period_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// One quality classification, appended on every tick
///
/// Timestamps are milliseconds on the engine's monotonic timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub timestamp_ms: u64,
    pub quality: ConnectionQuality,
}

/// Outcome of one reconnection episode
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconnectionRecord {
    pub timestamp_ms: u64,
    /// Attempts consumed by this episode
    pub attempts: u32,
    pub success: bool,
    /// Wall time from the episode's connection start to its outcome
    pub duration_ms: u64,
}

/// Running connection counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub total_messages: u64,
    pub total_errors: u64,
    /// When the session's monitoring first started (monotonic ms)
    pub connection_started_at_ms: u64,
    /// When the current connection episode started (refreshed on reconnect)
    pub last_connection_started_at_ms: u64,
}

/// Point-in-time read model for dashboards
///
/// Copy-out semantics: no live references into the monitor, safe to ship
/// across a serialization boundary.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub captured_at: DateTime<Utc>,
    pub quality: ConnectionQuality,
    /// Milliseconds since the last received message, if any arrived yet
    pub since_last_message_ms: Option<u64>,
    pub is_reconnecting: bool,
    pub reconnect_attempts: u32,
    pub stats: ConnectionStats,
    pub quality_history: Vec<QualitySnapshot>,
    pub reconnection_ledger: Vec<ReconnectionRecord>,
    pub config: HealthConfig,
}
