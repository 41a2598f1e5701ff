// Integration tests for the pipeline latency tracker
//
// These tests verify the audio timeline construction, offset-to-send-time
// correlation, per-stage windows, cross-participant turn-taking metrics,
// and per-participant reset isolation.

use callbridge::{LatencyStage, LatencyTracker, Participant};

const SAMPLE_RATE: u32 = 16_000;

/// 100ms of audio at 16kHz
const CHUNK_SAMPLES: usize = 1_600;

fn tracker() -> LatencyTracker {
    LatencyTracker::new(SAMPLE_RATE)
}

#[test]
fn test_chunk_offsets_are_contiguous() {
    let mut t = tracker();
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 0);
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 100);
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 200);

    let snapshot = t.snapshot(Participant::Agent);
    assert_eq!(snapshot.chunks_tracked, 3);
    assert_eq!(snapshot.audio_sent_ms, 300.0);
}

#[test]
fn test_offset_correlation_round_trip() {
    // Chunks [0,100), [100,200), [200,300) sent at t=0,100,200; a
    // translation reporting offset 150 at t=500 matches the second chunk
    // and yields 500 - 100 = 400ms.
    let mut t = tracker();
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 0);
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 100);
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 200);

    t.record_translation(Participant::Agent, 500, 150.0);

    let stats = t.stats(Participant::Agent, LatencyStage::Translation).unwrap();
    assert_eq!(stats.samples, 1);
    assert_eq!(stats.average_ms, 400.0);
}

#[test]
fn test_transcription_latency_matches_chunk() {
    let mut t = tracker();
    t.record_chunk(Participant::Customer, CHUNK_SAMPLES, 1_000);
    t.record_transcription(Participant::Customer, 1_650, 50.0);

    let stats = t
        .stats(Participant::Customer, LatencyStage::Transcription)
        .unwrap();
    assert_eq!(stats.average_ms, 650.0);
}

#[test]
fn test_boundary_offset_falls_back_to_preceding_chunk() {
    // An offset equal to the last chunk's end is not contained by any
    // interval; the most recent chunk ending at or before it is used.
    let mut t = tracker();
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 0);
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 100);

    t.record_translation(Participant::Agent, 600, 200.0);

    let stats = t.stats(Participant::Agent, LatencyStage::Translation).unwrap();
    // Matched to the chunk sent at t=100
    assert_eq!(stats.average_ms, 500.0);
}

#[test]
fn test_unmatched_offset_is_dropped() {
    let mut t = tracker();
    // No chunks at all: nothing to correlate against
    t.record_transcription(Participant::Agent, 500, 150.0);
    assert!(t.stats(Participant::Agent, LatencyStage::Transcription).is_none());

    // The translation still updates the last-translation timestamp even
    // when its correlation sample is dropped
    t.record_translation(Participant::Agent, 700, 150.0);
    t.record_synthesis(Participant::Agent, 900);
    let delta = t
        .stats(Participant::Agent, LatencyStage::SynthesisDelta)
        .unwrap();
    assert_eq!(delta.average_ms, 200.0);
}

#[test]
fn test_chunk_eviction_drops_old_correlations() {
    let mut t = tracker();
    for i in 0..150u64 {
        t.record_chunk(Participant::Agent, CHUNK_SAMPLES, i * 100);
    }

    let snapshot = t.snapshot(Participant::Agent);
    assert_eq!(snapshot.chunks_tracked, 100);

    // Offset 10ms lived in an evicted chunk and no surviving chunk ends
    // at or before it: the sample is dropped
    t.record_transcription(Participant::Agent, 20_000, 10.0);
    assert!(t.stats(Participant::Agent, LatencyStage::Transcription).is_none());
}

#[test]
fn test_synthesis_delta_from_last_translation() {
    let mut t = tracker();
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 0);
    t.record_translation(Participant::Agent, 1_000, 50.0);
    t.record_synthesis(Participant::Agent, 1_400);

    let stats = t
        .stats(Participant::Agent, LatencyStage::SynthesisDelta)
        .unwrap();
    assert_eq!(stats.average_ms, 400.0);
}

#[test]
fn test_voice_to_synthesis_across_participants() {
    let mut t = tracker();
    // Agent speaks at t=1000; the customer's synthesized reply lands at
    // t=1600: a 600ms turn-taking latency on the customer side
    t.record_voice(Participant::Agent, 1_000);
    t.record_synthesis(Participant::Customer, 1_600);

    let stats = t
        .stats(Participant::Customer, LatencyStage::VoiceToSynthesis)
        .unwrap();
    assert_eq!(stats.average_ms, 600.0);
}

#[test]
fn test_synthesis_to_synthesis_across_participants() {
    let mut t = tracker();
    t.record_synthesis(Participant::Customer, 1_600);
    t.record_synthesis(Participant::Agent, 1_700);

    let stats = t
        .stats(Participant::Agent, LatencyStage::SynthesisToSynthesis)
        .unwrap();
    assert_eq!(stats.average_ms, 100.0);
}

#[test]
fn test_turn_taking_pair_not_recounted() {
    let mut t = tracker();
    t.record_voice(Participant::Agent, 1_000);
    t.record_synthesis(Participant::Customer, 1_600);

    // A second customer synthesis without fresh agent activity: the agent's
    // voice timestamp is older than the customer's own last synthesis, so
    // no new turn-taking sample is counted
    t.record_synthesis(Participant::Customer, 1_900);

    let stats = t
        .stats(Participant::Customer, LatencyStage::VoiceToSynthesis)
        .unwrap();
    assert_eq!(stats.samples, 1);
    assert_eq!(stats.average_ms, 600.0);
}

#[test]
fn test_rapid_turn_taking_counts_fresh_pairs() {
    let mut t = tracker();
    t.record_voice(Participant::Agent, 1_000);
    t.record_synthesis(Participant::Customer, 1_500);

    // Agent speaks again after the customer's synthesis: a fresh pair
    t.record_voice(Participant::Agent, 2_000);
    t.record_synthesis(Participant::Customer, 2_400);

    let stats = t
        .stats(Participant::Customer, LatencyStage::VoiceToSynthesis)
        .unwrap();
    assert_eq!(stats.samples, 2);
    assert_eq!(stats.min_ms, 400.0);
    assert_eq!(stats.max_ms, 500.0);
}

#[test]
fn test_reset_clears_one_side_only() {
    let mut t = tracker();
    for p in Participant::both() {
        t.record_chunk(p, CHUNK_SAMPLES, 0);
        t.record_translation(p, 400, 50.0);
    }

    t.reset(Participant::Agent);

    let agent = t.snapshot(Participant::Agent);
    assert_eq!(agent.chunks_tracked, 0);
    assert_eq!(agent.audio_sent_ms, 0.0);
    assert!(agent.translation.is_none());

    let customer = t.snapshot(Participant::Customer);
    assert_eq!(customer.chunks_tracked, 1);
    assert!(customer.translation.is_some());
}

#[test]
fn test_reset_restarts_offset_timeline() {
    let mut t = tracker();
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 0);
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 100);
    t.reset(Participant::Agent);

    // A fresh session starts its offsets from zero again
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 5_000);
    t.record_translation(Participant::Agent, 5_400, 50.0);

    let stats = t.stats(Participant::Agent, LatencyStage::Translation).unwrap();
    assert_eq!(stats.average_ms, 400.0);
}

#[test]
fn test_snapshot_serializes() {
    let mut t = tracker();
    t.record_chunk(Participant::Agent, CHUNK_SAMPLES, 0);
    t.record_translation(Participant::Agent, 400, 50.0);

    let snapshot = t.snapshot(Participant::Agent);
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"participant\":\"agent\""));
    assert!(json.contains("\"translation\""));
}
