use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::health::{
    ConnectionQuality, HealthConfig, HealthMonitor, HealthSnapshot, RetryDecision, TickOutcome,
};
use crate::latency::{
    IngestionQueue, LatencySnapshot, LatencyStage, LatencyStats, LatencyTracker, TelemetryEvent,
};
use crate::participant::Participant;
use crate::vad::VoiceActivityDetector;

/// Health monitors evaluate liveness once per second
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Performed by the owning WebSocket client when the engine decides a
/// connection is dead: re-request a session and reconnect the transport.
///
/// The engine owns the backoff timing and the attempt ledger; the handler
/// only does the network work and reports the result.
#[async_trait]
pub trait ReconnectHandler: Send + Sync {
    async fn reconnect(&self, participant: Participant, attempt: u32) -> Result<()>;
}

struct EngineInner {
    epoch: Instant,
    monitors: [Mutex<HealthMonitor>; 2],
    tracker: Arc<Mutex<LatencyTracker>>,
    queue: IngestionQueue,
    vad: RwLock<VoiceActivityDetector>,
    handler: Arc<dyn ReconnectHandler>,
    running: AtomicBool,
    tick_tasks: Mutex<[Option<JoinHandle<()>>; 2]>,
}

impl EngineInner {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Connection liveness and pipeline latency telemetry for one bridged call
///
/// Runs two independent health monitors (agent, customer) on 1-second tick
/// timers, routes every latency-affecting event through the single-consumer
/// ingestion queue, and drives the exponential-backoff reconnection loop
/// when a monitor declares its connection dead.
///
/// Cheap to clone; all clones share the same engine state.
#[derive(Clone)]
pub struct TelemetryEngine {
    inner: Arc<EngineInner>,
}

impl TelemetryEngine {
    pub fn new(config: &Config, handler: Arc<dyn ReconnectHandler>) -> Self {
        let tracker = Arc::new(Mutex::new(LatencyTracker::new(config.session.sample_rate)));
        let queue = IngestionQueue::spawn(Arc::clone(&tracker));

        let inner = Arc::new(EngineInner {
            epoch: Instant::now(),
            monitors: [
                Mutex::new(HealthMonitor::new(
                    Participant::Agent,
                    config.health.clone(),
                )),
                Mutex::new(HealthMonitor::new(
                    Participant::Customer,
                    config.health.clone(),
                )),
            ],
            tracker,
            queue,
            vad: RwLock::new(VoiceActivityDetector::new(config.vad.threshold)),
            handler,
            running: AtomicBool::new(false),
            tick_tasks: Mutex::new([None, None]),
        });

        Self { inner }
    }

    /// Milliseconds since the engine was created (the timeline every
    /// `received_at_ms` argument is expected on)
    pub fn now_ms(&self) -> u64 {
        self.inner.now_ms()
    }

    /// Start both participants' monitors and tick timers
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("telemetry engine already started");
            return;
        }

        info!("telemetry engine starting");

        let now = self.inner.now_ms();
        for participant in Participant::both() {
            self.inner.monitors[participant.index()]
                .lock()
                .await
                .start_at(now);
        }

        let mut tasks = self.inner.tick_tasks.lock().await;
        for participant in Participant::both() {
            let inner = Arc::clone(&self.inner);
            tasks[participant.index()] = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(TICK_INTERVAL);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                loop {
                    ticker.tick().await;

                    if !inner.running.load(Ordering::SeqCst) {
                        break;
                    }

                    let now = inner.now_ms();
                    let outcome = inner.monitors[participant.index()]
                        .lock()
                        .await
                        .tick_at(now);

                    if outcome == TickOutcome::ReconnectNeeded {
                        trigger_reconnect(Arc::clone(&inner), participant).await;
                    }
                }

                debug!("[{}] tick task stopped", participant);
            }));
        }
    }

    /// Stop tick timers and drain the ingestion queue
    pub async fn shutdown(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("telemetry engine shutting down");

        let mut tasks = self.inner.tick_tasks.lock().await;
        for slot in tasks.iter_mut() {
            if let Some(task) = slot.take() {
                task.abort();
                let _ = task.await;
            }
        }
        drop(tasks);

        self.inner.queue.shutdown().await;
    }

    // ------------------------------------------------------------------
    // Inbound transport signals
    // ------------------------------------------------------------------

    /// A message arrived on this participant's transport
    pub async fn on_message_received(&self, participant: Participant) {
        let now = self.inner.now_ms();
        self.inner.monitors[participant.index()]
            .lock()
            .await
            .record_message_at(now);
    }

    /// The transport reported a protocol-level error: counted, and treated
    /// as an immediate liveness failure (no waiting for the zombie tick)
    pub async fn on_transport_error(&self, participant: Participant) {
        self.inner.monitors[participant.index()]
            .lock()
            .await
            .record_error();

        warn!("[{}] transport error, triggering reconnection", participant);
        trigger_reconnect(Arc::clone(&self.inner), participant).await;
    }

    /// The transport closed; terminal unless a reconnection is in flight
    pub async fn on_transport_closed(&self, participant: Participant) {
        let now = self.inner.now_ms();
        self.inner.monitors[participant.index()]
            .lock()
            .await
            .transport_closed_at(now);
    }

    /// Caller-initiated teardown: offline immediately, this side's tick timer
    /// stops, and any pending backoff continuation becomes a no-op
    pub async fn on_explicit_disconnect(&self, participant: Participant) {
        let now = self.inner.now_ms();
        self.inner.monitors[participant.index()]
            .lock()
            .await
            .disconnect_at(now);

        if let Some(task) = self.inner.tick_tasks.lock().await[participant.index()].take() {
            task.abort();
            let _ = task.await;
        }
    }

    // ------------------------------------------------------------------
    // Content-bearing ingestion
    // ------------------------------------------------------------------

    /// An outbound audio chunk (16-bit little-endian PCM) left this side
    pub fn enqueue_audio_chunk(&self, participant: Participant, pcm: &[u8]) {
        self.inner.queue.enqueue(TelemetryEvent::AudioChunk {
            participant,
            sample_count: pcm.len() / 2,
            sent_at_ms: self.inner.now_ms(),
        });
    }

    pub fn enqueue_transcription(
        &self,
        participant: Participant,
        received_at_ms: u64,
        audio_end_offset_ms: f64,
    ) {
        self.inner.queue.enqueue(TelemetryEvent::Transcription {
            participant,
            received_at_ms,
            audio_end_offset_ms,
        });
    }

    pub fn enqueue_translation(
        &self,
        participant: Participant,
        received_at_ms: u64,
        audio_end_offset_ms: f64,
    ) {
        self.inner.queue.enqueue(TelemetryEvent::Translation {
            participant,
            received_at_ms,
            audio_end_offset_ms,
        });
    }

    pub fn enqueue_synthesis(&self, participant: Participant, received_at_ms: u64) {
        self.inner.queue.enqueue(TelemetryEvent::Synthesis {
            participant,
            received_at_ms,
        });
    }

    /// Clear one participant's latency state (session teardown/restart);
    /// ordered through the queue so it cannot interleave with in-flight
    /// correlations
    pub fn reset_latency(&self, participant: Participant) {
        self.inner
            .queue
            .enqueue(TelemetryEvent::Reset { participant });
    }

    // ------------------------------------------------------------------
    // Voice activity
    // ------------------------------------------------------------------

    /// The VAD collaborator's speaking signal
    pub async fn report_speaking(&self, participant: Participant, is_speaking: bool) {
        if !is_speaking {
            return;
        }

        let now = self.inner.now_ms();
        self.inner.monitors[participant.index()]
            .lock()
            .await
            .record_speech_at(now);
        self.inner.queue.enqueue(TelemetryEvent::Voice {
            participant,
            at_ms: now,
        });
    }

    /// Run the built-in RMS VAD over a PCM frame and report the result
    pub async fn process_frame(&self, participant: Participant, samples: &[i16]) -> bool {
        let speaking = self.inner.vad.read().await.is_speech(samples);

        self.report_speaking(participant, speaking).await;
        speaking
    }

    // ------------------------------------------------------------------
    // Read model & runtime tuning
    // ------------------------------------------------------------------

    /// Copy-out health read model for dashboards
    pub async fn health_snapshot(&self, participant: Participant) -> HealthSnapshot {
        let now = self.inner.now_ms();
        self.inner.monitors[participant.index()]
            .lock()
            .await
            .snapshot_at(now)
    }

    pub async fn quality(&self, participant: Participant) -> ConnectionQuality {
        self.inner.monitors[participant.index()]
            .lock()
            .await
            .quality()
    }

    /// Latency read model; drains pending events first so the snapshot
    /// reflects everything enqueued before this call
    pub async fn latency_snapshot(&self, participant: Participant) -> LatencySnapshot {
        self.inner.queue.flush().await;
        self.inner.tracker.lock().await.snapshot(participant)
    }

    pub async fn latency_stats(
        &self,
        participant: Participant,
        stage: LatencyStage,
    ) -> Option<LatencyStats> {
        self.inner.queue.flush().await;
        self.inner.tracker.lock().await.stats(participant, stage)
    }

    /// Replace liveness thresholds for both monitors; effective next tick
    pub async fn set_health_config(&self, config: HealthConfig) {
        for participant in Participant::both() {
            self.inner.monitors[participant.index()]
                .lock()
                .await
                .set_config(config.clone());
        }
    }

    pub async fn set_vad_threshold(&self, threshold: f32) {
        self.inner.vad.write().await.set_threshold(threshold);
    }
}

/// Funnel for both reconnection triggers (zombie tick, transport error)
///
/// The monitor's `begin_reconnect_at` is the single-flight guard: only the
/// trigger that wins it spawns the retry loop, so near-simultaneous
/// triggers collapse into one attempt sequence.
async fn trigger_reconnect(inner: Arc<EngineInner>, participant: Participant) {
    let now = inner.now_ms();
    let claimed = inner.monitors[participant.index()]
        .lock()
        .await
        .begin_reconnect_at(now);

    if !claimed {
        debug!(
            "[{}] reconnection already in flight, trigger ignored",
            participant
        );
        return;
    }

    tokio::spawn(reconnect_loop(inner, participant));
}

/// Backoff-paced retry loop for one reconnection episode
///
/// Checks "should I still reconnect?" immediately after every wait, so an
/// explicit disconnect or an externally reported success makes the pending
/// continuation a no-op.
async fn reconnect_loop(inner: Arc<EngineInner>, participant: Participant) {
    loop {
        let (backoff, attempt) = {
            let monitor = inner.monitors[participant.index()].lock().await;
            if !monitor.is_reconnecting() {
                debug!("[{}] reconnection no longer wanted, stopping", participant);
                return;
            }
            (monitor.next_backoff(), monitor.reconnect_attempts())
        };

        info!(
            "[{}] reconnect attempt {} in {}ms",
            participant,
            attempt + 1,
            backoff.as_millis()
        );
        tokio::time::sleep(backoff).await;

        {
            let monitor = inner.monitors[participant.index()].lock().await;
            if !monitor.is_reconnecting() {
                debug!(
                    "[{}] reconnection cancelled during backoff wait",
                    participant
                );
                return;
            }
        }

        match inner.handler.reconnect(participant, attempt).await {
            Ok(()) => {
                let now = inner.now_ms();
                inner.monitors[participant.index()]
                    .lock()
                    .await
                    .reconnect_succeeded_at(now);
                return;
            }
            Err(e) => {
                error!("[{}] reconnect attempt {} failed: {}", participant, attempt + 1, e);

                let now = inner.now_ms();
                let decision = inner.monitors[participant.index()]
                    .lock()
                    .await
                    .reconnect_failed_at(now);

                if decision == RetryDecision::GiveUp {
                    return;
                }
            }
        }
    }
}
