use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::quality::{
    ConnectionQuality, ConnectionStats, HealthConfig, HealthSnapshot, QualitySnapshot,
    ReconnectionRecord,
};
use crate::participant::Participant;

/// Quality history is pruned to this trailing window
const QUALITY_HISTORY_WINDOW_MS: u64 = 60_000;

/// Only the most recent reconnection outcomes are kept
const RECONNECTION_LEDGER_CAP: usize = 5;

/// What a tick observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No action needed from the owner
    Quiet,
    /// The connection just went dead and nobody is reconnecting yet;
    /// emitted exactly once per dead episode
    ReconnectNeeded,
}

/// Whether the owner should keep retrying after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    GiveUp,
}

/// Per-participant connection liveness state machine
///
/// Judges quality purely from elapsed time since the last received message,
/// with the dead-connection threshold adapted to whether the participant is
/// (recently) speaking. The monitor never performs network work itself: it
/// classifies, computes backoff timing, and records outcomes reported back
/// by the owning client.
///
/// All timing-sensitive methods take an explicit `now_ms` on the engine's
/// monotonic timeline, which keeps threshold arithmetic deterministic under
/// test.
pub struct HealthMonitor {
    participant: Participant,
    config: HealthConfig,
    quality: ConnectionQuality,
    last_message_at_ms: Option<u64>,
    last_speech_at_ms: Option<u64>,
    reconnect_attempts: u32,
    is_reconnecting: bool,
    /// Set when the current dead episode has already requested a reconnect;
    /// cleared on re-entering `Good`
    dead_signaled: bool,
    quality_history: VecDeque<QualitySnapshot>,
    reconnection_ledger: VecDeque<ReconnectionRecord>,
    stats: ConnectionStats,
}

impl HealthMonitor {
    pub fn new(participant: Participant, config: HealthConfig) -> Self {
        Self {
            participant,
            config,
            quality: ConnectionQuality::Unknown,
            last_message_at_ms: None,
            last_speech_at_ms: None,
            reconnect_attempts: 0,
            is_reconnecting: false,
            dead_signaled: false,
            quality_history: VecDeque::new(),
            reconnection_ledger: VecDeque::new(),
            stats: ConnectionStats {
                total_messages: 0,
                total_errors: 0,
                connection_started_at_ms: 0,
                last_connection_started_at_ms: 0,
            },
        }
    }

    /// Begin monitoring a fresh session
    ///
    /// Clears counters and histories; reconnections preserve them instead
    /// (see [`reconnect_succeeded_at`](Self::reconnect_succeeded_at)).
    pub fn start_at(&mut self, now_ms: u64) {
        info!("[{}] health monitor started", self.participant);

        self.quality = ConnectionQuality::Unknown;
        self.last_message_at_ms = None;
        self.last_speech_at_ms = None;
        self.reconnect_attempts = 0;
        self.is_reconnecting = false;
        self.dead_signaled = false;
        self.quality_history.clear();
        self.reconnection_ledger.clear();
        self.stats = ConnectionStats {
            total_messages: 0,
            total_errors: 0,
            connection_started_at_ms: now_ms,
            last_connection_started_at_ms: now_ms,
        };
    }

    /// A message arrived; recovery is observed by the next tick, not here
    pub fn record_message_at(&mut self, now_ms: u64) {
        self.last_message_at_ms = Some(now_ms);
        self.stats.total_messages += 1;
    }

    /// A transport error was reported; observability only
    pub fn record_error(&mut self) {
        self.stats.total_errors += 1;
    }

    /// The VAD reported active speech right now
    pub fn record_speech_at(&mut self, now_ms: u64) {
        self.last_speech_at_ms = Some(now_ms);
    }

    /// One-second liveness evaluation
    pub fn tick_at(&mut self, now_ms: u64) -> TickOutcome {
        let mut outcome = TickOutcome::Quiet;

        if self.is_reconnecting {
            self.quality = ConnectionQuality::Reconnecting;
        } else if self.quality != ConnectionQuality::Offline {
            let classified = self.classify(now_ms);

            if classified != self.quality {
                debug!(
                    "[{}] quality {:?} -> {:?}",
                    self.participant, self.quality, classified
                );
            }

            match classified {
                ConnectionQuality::Dead => {
                    if !self.dead_signaled {
                        warn!(
                            "[{}] connection went dead ({}ms since last message)",
                            self.participant,
                            self.last_message_at_ms
                                .map(|t| now_ms.saturating_sub(t))
                                .unwrap_or(0)
                        );
                        self.dead_signaled = true;
                        outcome = TickOutcome::ReconnectNeeded;
                    }
                }
                ConnectionQuality::Good => {
                    self.dead_signaled = false;
                }
                _ => {}
            }

            self.quality = classified;
        }

        self.quality_history.push_back(QualitySnapshot {
            timestamp_ms: now_ms,
            quality: self.quality,
        });
        self.prune_history(now_ms);

        outcome
    }

    /// Classify from message recency; `Unknown` until the first message
    fn classify(&self, now_ms: u64) -> ConnectionQuality {
        let last_message = match self.last_message_at_ms {
            Some(t) => t,
            None => return ConnectionQuality::Unknown,
        };

        let delta = now_ms.saturating_sub(last_message);

        // While speech is recent we expect the service to be answering, so
        // the dead threshold tightens from 60s to 10s (defaults).
        let expecting = self
            .last_speech_at_ms
            .map(|t| now_ms.saturating_sub(t) < self.config.speech_grace_period_ms)
            .unwrap_or(false);

        let zombie_threshold = if expecting {
            self.config.zombie_timeout_speaking_ms
        } else {
            self.config.zombie_timeout_silent_ms
        };

        if delta >= zombie_threshold {
            ConnectionQuality::Dead
        } else if delta >= self.config.poor_threshold_ms {
            ConnectionQuality::Poor
        } else if delta >= self.config.degraded_threshold_ms {
            ConnectionQuality::Degraded
        } else {
            ConnectionQuality::Good
        }
    }

    fn prune_history(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(QUALITY_HISTORY_WINDOW_MS);
        while let Some(front) = self.quality_history.front() {
            if front.timestamp_ms < cutoff {
                self.quality_history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Claim the single reconnection slot
    ///
    /// Returns `false` when a reconnection is already in flight or the
    /// monitor is offline; concurrent triggers (a zombie tick racing a
    /// transport error) collapse into one attempt sequence through this
    /// guard.
    pub fn begin_reconnect_at(&mut self, _now_ms: u64) -> bool {
        if self.is_reconnecting || self.quality == ConnectionQuality::Offline {
            return false;
        }

        info!("[{}] starting reconnection", self.participant);
        self.is_reconnecting = true;
        self.quality = ConnectionQuality::Reconnecting;
        true
    }

    /// Wait before the next attempt: `initial * 2^attempts`, capped
    pub fn next_backoff(&self) -> Duration {
        let factor = 1u64 << self.reconnect_attempts.min(30);
        let backoff = self
            .config
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.config.max_backoff_ms);
        Duration::from_millis(backoff)
    }

    /// The owning client reconnected; restart monitoring, keep histories
    ///
    /// A completion arriving after the reconnection was cancelled (explicit
    /// disconnect during an in-flight attempt) is a no-op: it must not
    /// resurrect a terminal offline state.
    pub fn reconnect_succeeded_at(&mut self, now_ms: u64) {
        if !self.is_reconnecting {
            debug!(
                "[{}] stale reconnect success ignored, no reconnection in flight",
                self.participant
            );
            return;
        }

        let duration_ms = now_ms.saturating_sub(self.stats.last_connection_started_at_ms);

        info!(
            "[{}] reconnected after {} attempt(s), {}ms",
            self.participant, self.reconnect_attempts, duration_ms
        );

        self.push_ledger(ReconnectionRecord {
            timestamp_ms: now_ms,
            attempts: self.reconnect_attempts,
            success: true,
            duration_ms,
        });

        self.reconnect_attempts = 0;
        self.is_reconnecting = false;
        self.dead_signaled = false;
        self.quality = ConnectionQuality::Good;
        self.last_message_at_ms = Some(now_ms);
        self.stats.last_connection_started_at_ms = now_ms;
    }

    /// One attempt failed; decide whether the owner should keep retrying
    ///
    /// Like [`Self::reconnect_succeeded_at`], a failure landing after the
    /// reconnection was cancelled leaves the monitor untouched and tells the
    /// owner to stop.
    pub fn reconnect_failed_at(&mut self, now_ms: u64) -> RetryDecision {
        if !self.is_reconnecting {
            debug!(
                "[{}] stale reconnect failure ignored, no reconnection in flight",
                self.participant
            );
            return RetryDecision::GiveUp;
        }

        self.reconnect_attempts += 1;

        if self.reconnect_attempts >= self.config.max_reconnect_attempts {
            let duration_ms = now_ms.saturating_sub(self.stats.last_connection_started_at_ms);

            warn!(
                "[{}] giving up after {} reconnect attempts",
                self.participant, self.reconnect_attempts
            );

            self.push_ledger(ReconnectionRecord {
                timestamp_ms: now_ms,
                attempts: self.reconnect_attempts,
                success: false,
                duration_ms,
            });

            self.is_reconnecting = false;
            self.quality = ConnectionQuality::Offline;
            return RetryDecision::GiveUp;
        }

        debug!(
            "[{}] reconnect attempt {} failed, will retry",
            self.participant, self.reconnect_attempts
        );
        RetryDecision::Retry
    }

    /// Explicit teardown: terminal offline, pending backoff waits become no-ops
    pub fn disconnect_at(&mut self, _now_ms: u64) {
        info!("[{}] disconnected", self.participant);
        self.quality = ConnectionQuality::Offline;
        self.is_reconnecting = false;
    }

    /// Transport closed; terminal unless a reconnection is already in flight
    pub fn transport_closed_at(&mut self, _now_ms: u64) {
        if !self.is_reconnecting {
            info!("[{}] transport closed, going offline", self.participant);
            self.quality = ConnectionQuality::Offline;
        }
    }

    fn push_ledger(&mut self, record: ReconnectionRecord) {
        self.reconnection_ledger.push_back(record);
        while self.reconnection_ledger.len() > RECONNECTION_LEDGER_CAP {
            self.reconnection_ledger.pop_front();
        }
    }

    /// Replace thresholds; takes effect on the next tick
    pub fn set_config(&mut self, config: HealthConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn quality(&self) -> ConnectionQuality {
        self.quality
    }

    pub fn is_reconnecting(&self) -> bool {
        self.is_reconnecting
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Copy-out read model for dashboards
    pub fn snapshot_at(&self, now_ms: u64) -> HealthSnapshot {
        HealthSnapshot {
            captured_at: Utc::now(),
            quality: self.quality,
            since_last_message_ms: self.last_message_at_ms.map(|t| now_ms.saturating_sub(t)),
            is_reconnecting: self.is_reconnecting,
            reconnect_attempts: self.reconnect_attempts,
            stats: self.stats,
            quality_history: self.quality_history.iter().copied().collect(),
            reconnection_ledger: self.reconnection_ledger.iter().copied().collect(),
            config: self.config.clone(),
        }
    }
}
