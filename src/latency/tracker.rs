use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::window::{LatencyStats, LatencyWindow};
use crate::participant::Participant;

/// Outbound chunk records kept per participant
const CHUNK_HISTORY_CAP: usize = 100;

/// One pipeline stage whose latency is independently tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyStage {
    /// Audio sent -> transcript received
    Transcription,
    /// Audio sent -> translation received
    Translation,
    /// Translation received -> synthesized audio received (same side)
    SynthesisDelta,
    /// Other side's voice -> this side's synthesized reply (turn-taking)
    VoiceToSynthesis,
    /// Other side's synthesis -> this side's synthesized reply (turn-taking)
    SynthesisToSynthesis,
}

/// Maps a server-reported audio offset back to when that audio was sent
///
/// Offsets are cumulative milliseconds on the sender's own audio timeline;
/// intervals are contiguous and non-overlapping by construction.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AudioChunkRecord {
    pub sent_at_ms: u64,
    pub audio_start_offset_ms: f64,
    pub audio_end_offset_ms: f64,
}

/// Point-in-time latency read model for one participant
#[derive(Debug, Clone, Serialize)]
pub struct LatencySnapshot {
    pub captured_at: DateTime<Utc>,
    pub participant: Participant,
    pub chunks_tracked: usize,
    pub audio_sent_ms: f64,
    pub transcription: Option<LatencyStats>,
    pub translation: Option<LatencyStats>,
    pub synthesis_delta: Option<LatencyStats>,
    pub voice_to_synthesis: Option<LatencyStats>,
    pub synthesis_to_synthesis: Option<LatencyStats>,
}

/// One participant's audio timeline and stage windows
#[derive(Default)]
struct SideState {
    chunks: VecDeque<AudioChunkRecord>,
    cumulative_offset_ms: f64,
    last_translation_at_ms: Option<u64>,
    last_synthesis_at_ms: Option<u64>,
    last_voice_at_ms: Option<u64>,
    transcription: LatencyWindow,
    translation: LatencyWindow,
    synthesis_delta: LatencyWindow,
    voice_to_synthesis: LatencyWindow,
    synthesis_to_synthesis: LatencyWindow,
}

impl SideState {
    fn window(&self, stage: LatencyStage) -> &LatencyWindow {
        match stage {
            LatencyStage::Transcription => &self.transcription,
            LatencyStage::Translation => &self.translation,
            LatencyStage::SynthesisDelta => &self.synthesis_delta,
            LatencyStage::VoiceToSynthesis => &self.voice_to_synthesis,
            LatencyStage::SynthesisToSynthesis => &self.synthesis_to_synthesis,
        }
    }

    fn clear(&mut self) {
        self.chunks.clear();
        self.cumulative_offset_ms = 0.0;
        self.last_translation_at_ms = None;
        self.last_synthesis_at_ms = None;
        self.last_voice_at_ms = None;
        self.transcription.clear();
        self.translation.clear();
        self.synthesis_delta.clear();
        self.voice_to_synthesis.clear();
        self.synthesis_to_synthesis.clear();
    }
}

/// Multi-stage pipeline latency tracker for both participants
///
/// Owns a continuous per-participant audio timeline built from outbound
/// chunk durations, correlates asynchronous server events back onto it by
/// audio offset, and maintains the bounded per-stage sample windows.
/// Cross-participant turn-taking metrics are the reason both sides live in
/// one tracker.
pub struct LatencyTracker {
    sample_rate: u32,
    sides: [SideState; 2],
}

impl LatencyTracker {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            sides: [SideState::default(), SideState::default()],
        }
    }

    /// Record an outbound audio chunk of `sample_count` PCM samples
    pub fn record_chunk(&mut self, participant: Participant, sample_count: usize, sent_at_ms: u64) {
        let duration_ms = sample_count as f64 / self.sample_rate as f64 * 1000.0;
        let side = &mut self.sides[participant.index()];

        let start = side.cumulative_offset_ms;
        let end = start + duration_ms;

        side.chunks.push_back(AudioChunkRecord {
            sent_at_ms,
            audio_start_offset_ms: start,
            audio_end_offset_ms: end,
        });
        side.cumulative_offset_ms = end;

        while side.chunks.len() > CHUNK_HISTORY_CAP {
            side.chunks.pop_front();
        }
    }

    /// A transcript arrived for audio ending at `audio_end_offset_ms`
    pub fn record_transcription(
        &mut self,
        participant: Participant,
        received_at_ms: u64,
        audio_end_offset_ms: f64,
    ) {
        if let Some(sent_at) = self.correlate(participant, audio_end_offset_ms) {
            let latency = received_at_ms.saturating_sub(sent_at) as f64;
            self.sides[participant.index()].transcription.push(latency);
        } else {
            warn!(
                "[{}] transcription event at offset {:.1}ms matched no known chunk, dropped",
                participant, audio_end_offset_ms
            );
        }
    }

    /// A translation arrived for audio ending at `audio_end_offset_ms`
    pub fn record_translation(
        &mut self,
        participant: Participant,
        received_at_ms: u64,
        audio_end_offset_ms: f64,
    ) {
        if let Some(sent_at) = self.correlate(participant, audio_end_offset_ms) {
            let latency = received_at_ms.saturating_sub(sent_at) as f64;
            self.sides[participant.index()].translation.push(latency);
        } else {
            warn!(
                "[{}] translation event at offset {:.1}ms matched no known chunk, dropped",
                participant, audio_end_offset_ms
            );
        }

        self.sides[participant.index()].last_translation_at_ms = Some(received_at_ms);
    }

    /// Synthesized audio for this participant was produced
    ///
    /// Feeds the same-side synthesis delta plus the two cross-participant
    /// turn-taking windows. A turn-taking sample is only counted when the
    /// other side's timestamp is newer than this side's own last synthesis,
    /// so the same pair is not re-counted on rapid repeats.
    pub fn record_synthesis(&mut self, participant: Participant, received_at_ms: u64) {
        let my_last_synthesis = self.sides[participant.index()].last_synthesis_at_ms;

        if let Some(translated_at) = self.sides[participant.index()].last_translation_at_ms {
            let delta = received_at_ms.saturating_sub(translated_at) as f64;
            self.sides[participant.index()].synthesis_delta.push(delta);
        }

        let other = participant.other();
        let other_voice_at = self.sides[other.index()].last_voice_at_ms;
        let other_synthesis_at = self.sides[other.index()].last_synthesis_at_ms;

        if let Some(voice_at) = other_voice_at {
            if my_last_synthesis.map(|mine| voice_at > mine).unwrap_or(true) {
                let latency = received_at_ms.saturating_sub(voice_at) as f64;
                self.sides[participant.index()]
                    .voice_to_synthesis
                    .push(latency);
            }
        }

        if let Some(synth_at) = other_synthesis_at {
            if my_last_synthesis.map(|mine| synth_at > mine).unwrap_or(true) {
                let latency = received_at_ms.saturating_sub(synth_at) as f64;
                self.sides[participant.index()]
                    .synthesis_to_synthesis
                    .push(latency);
            }
        }

        self.sides[participant.index()].last_synthesis_at_ms = Some(received_at_ms);
    }

    /// The VAD saw this participant speaking
    pub fn record_voice(&mut self, participant: Participant, at_ms: u64) {
        self.sides[participant.index()].last_voice_at_ms = Some(at_ms);
    }

    /// Find when the audio containing `offset_ms` was sent
    ///
    /// Exact interval match first; otherwise the most recent chunk whose end
    /// offset is at or before the reported time (boundary/rounding events);
    /// otherwise the event is unmatched.
    fn correlate(&self, participant: Participant, offset_ms: f64) -> Option<u64> {
        let chunks = &self.sides[participant.index()].chunks;

        if let Some(chunk) = chunks
            .iter()
            .find(|c| c.audio_start_offset_ms <= offset_ms && offset_ms < c.audio_end_offset_ms)
        {
            return Some(chunk.sent_at_ms);
        }

        let fallback = chunks
            .iter()
            .rev()
            .find(|c| c.audio_end_offset_ms <= offset_ms);

        if let Some(chunk) = fallback {
            debug!(
                "[{}] offset {:.1}ms fell on a chunk boundary, using chunk ending at {:.1}ms",
                participant, offset_ms, chunk.audio_end_offset_ms
            );
            return Some(chunk.sent_at_ms);
        }

        None
    }

    pub fn stats(&self, participant: Participant, stage: LatencyStage) -> Option<LatencyStats> {
        self.sides[participant.index()].window(stage).stats()
    }

    pub fn snapshot(&self, participant: Participant) -> LatencySnapshot {
        let side = &self.sides[participant.index()];

        LatencySnapshot {
            captured_at: Utc::now(),
            participant,
            chunks_tracked: side.chunks.len(),
            audio_sent_ms: side.cumulative_offset_ms,
            transcription: side.transcription.stats(),
            translation: side.translation.stats(),
            synthesis_delta: side.synthesis_delta.stats(),
            voice_to_synthesis: side.voice_to_synthesis.stats(),
            synthesis_to_synthesis: side.synthesis_to_synthesis.stats(),
        }
    }

    /// Clear one participant's timeline without touching the other side
    pub fn reset(&mut self, participant: Participant) {
        debug!("[{}] latency state reset", participant);
        self.sides[participant.index()].clear();
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
