use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::tracker::LatencyTracker;
use crate::participant::Participant;

/// One telemetry-affecting event, applied to the tracker in enqueue order
#[derive(Debug)]
pub enum TelemetryEvent {
    /// An outbound audio chunk left this side
    AudioChunk {
        participant: Participant,
        sample_count: usize,
        sent_at_ms: u64,
    },
    /// A transcript arrived from the service
    Transcription {
        participant: Participant,
        received_at_ms: u64,
        audio_end_offset_ms: f64,
    },
    /// A translation arrived from the service
    Translation {
        participant: Participant,
        received_at_ms: u64,
        audio_end_offset_ms: f64,
    },
    /// Synthesized audio for this side was produced
    Synthesis {
        participant: Participant,
        received_at_ms: u64,
    },
    /// The VAD saw this participant speaking
    Voice { participant: Participant, at_ms: u64 },
    /// Clear one participant's latency state
    Reset { participant: Participant },
    /// Ordering barrier: resolves once everything enqueued before it has
    /// been applied
    Flush(oneshot::Sender<()>),
}

/// Single-consumer FIFO serializing all tracker mutation
///
/// Producers (the audio capture loop, the WebSocket message handler) run as
/// independent tasks that interleave arbitrarily; routing every mutation
/// through one unbounded channel with one consumer task guarantees events
/// are applied one at a time, in exact enqueue order. Without this, a chunk
/// insertion and a translation correlation could race and read a
/// half-updated chunk list.
pub struct IngestionQueue {
    tx: mpsc::UnboundedSender<TelemetryEvent>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl IngestionQueue {
    /// Spawn the consumer task draining into `tracker`
    pub fn spawn(tracker: Arc<Mutex<LatencyTracker>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<TelemetryEvent>();

        let consumer = tokio::spawn(async move {
            debug!("ingestion queue consumer started");

            while let Some(event) = rx.recv().await {
                match event {
                    TelemetryEvent::Flush(done) => {
                        // Receiver may have given up waiting; that's fine
                        let _ = done.send(());
                    }
                    event => {
                        let mut tracker = tracker.lock().await;
                        Self::apply(&mut tracker, event);
                    }
                }
            }

            debug!("ingestion queue consumer stopped");
        });

        Self {
            tx,
            consumer: Mutex::new(Some(consumer)),
        }
    }

    /// Applies one event; never propagates a failure into the drain loop
    fn apply(tracker: &mut LatencyTracker, event: TelemetryEvent) {
        match event {
            TelemetryEvent::AudioChunk {
                participant,
                sample_count,
                sent_at_ms,
            } => tracker.record_chunk(participant, sample_count, sent_at_ms),
            TelemetryEvent::Transcription {
                participant,
                received_at_ms,
                audio_end_offset_ms,
            } => tracker.record_transcription(participant, received_at_ms, audio_end_offset_ms),
            TelemetryEvent::Translation {
                participant,
                received_at_ms,
                audio_end_offset_ms,
            } => tracker.record_translation(participant, received_at_ms, audio_end_offset_ms),
            TelemetryEvent::Synthesis {
                participant,
                received_at_ms,
            } => tracker.record_synthesis(participant, received_at_ms),
            TelemetryEvent::Voice { participant, at_ms } => {
                tracker.record_voice(participant, at_ms)
            }
            TelemetryEvent::Reset { participant } => tracker.reset(participant),
            TelemetryEvent::Flush(_) => unreachable!("flush handled by the consumer loop"),
        }
    }

    /// Append an event; it will be applied after everything enqueued earlier
    pub fn enqueue(&self, event: TelemetryEvent) {
        if self.tx.send(event).is_err() {
            error!("ingestion queue consumer is gone, event dropped");
        }
    }

    /// Wait until every event enqueued before this call has been applied
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(TelemetryEvent::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Stop accepting events and wait for the consumer to drain out
    pub async fn shutdown(&self) {
        self.flush().await;
        if let Some(handle) = self.consumer.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}
