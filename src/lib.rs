pub mod config;
pub mod engine;
pub mod health;
pub mod latency;
pub mod participant;
pub mod vad;

pub use config::{Config, SessionConfig, VadConfig};
pub use engine::{ReconnectHandler, TelemetryEngine};
pub use health::{
    ConnectionQuality, ConnectionStats, HealthConfig, HealthMonitor, HealthSnapshot,
    QualitySnapshot, ReconnectionRecord, RetryDecision, TickOutcome,
};
pub use latency::{
    AudioChunkRecord, IngestionQueue, LatencySnapshot, LatencyStage, LatencyStats, LatencyTracker,
    LatencyWindow, TelemetryEvent,
};
pub use participant::Participant;
pub use vad::VoiceActivityDetector;
