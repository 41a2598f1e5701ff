//! Connection liveness classification and recovery orchestration
//!
//! One `HealthMonitor` per participant judges whether a live-looking
//! transport is still delivering data, adapts the dead-connection threshold
//! to voice activity, and keeps the reconnection backoff ledger.

mod monitor;
mod quality;

pub use monitor::{HealthMonitor, RetryDecision, TickOutcome};
pub use quality::{
    ConnectionQuality, ConnectionStats, HealthConfig, HealthSnapshot, QualitySnapshot,
    ReconnectionRecord,
};
