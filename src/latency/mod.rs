//! Pipeline latency telemetry
//!
//! Converts raw event timing into per-stage latencies: outbound audio
//! chunks build a continuous timeline, server events are correlated back
//! onto it by audio offset, and each stage keeps a bounded sliding window
//! of samples. All mutation goes through the single-consumer ingestion
//! queue so concurrent producers cannot interleave mid-update.

mod queue;
mod tracker;
mod window;

pub use queue::{IngestionQueue, TelemetryEvent};
pub use tracker::{AudioChunkRecord, LatencySnapshot, LatencyStage, LatencyTracker};
pub use window::{LatencyStats, LatencyWindow};
