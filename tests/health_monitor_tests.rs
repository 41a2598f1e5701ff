// Integration tests for the connection health monitor
//
// These tests verify quality classification thresholds, the VAD-adaptive
// zombie timeout, backoff timing, give-up behavior, and the bounded
// quality/reconnection histories.

use callbridge::{ConnectionQuality, HealthConfig, HealthMonitor, Participant, RetryDecision, TickOutcome};

fn monitor() -> HealthMonitor {
    let mut m = HealthMonitor::new(Participant::Agent, HealthConfig::default());
    m.start_at(0);
    m
}

#[test]
fn test_quality_unknown_before_first_message() {
    let mut m = monitor();
    assert_eq!(m.quality(), ConnectionQuality::Unknown);

    m.tick_at(1_000);
    assert_eq!(m.quality(), ConnectionQuality::Unknown);
}

#[test]
fn test_threshold_ordering_while_silent() {
    // With no recent speech the dead threshold is 60s
    let cases = [
        (0, ConnectionQuality::Good),
        (2_999, ConnectionQuality::Good),
        (3_000, ConnectionQuality::Degraded),
        (4_999, ConnectionQuality::Degraded),
        (5_000, ConnectionQuality::Poor),
        (59_999, ConnectionQuality::Poor),
        (60_000, ConnectionQuality::Dead),
    ];

    for (delta, expected) in cases {
        let mut m = monitor();
        m.record_message_at(0);
        m.tick_at(delta);
        assert_eq!(m.quality(), expected, "delta={}ms", delta);
    }
}

#[test]
fn test_threshold_ordering_while_speaking() {
    // Recent speech tightens the dead threshold to 10s
    let cases = [
        (2_999u64, ConnectionQuality::Good),
        (3_000, ConnectionQuality::Degraded),
        (5_000, ConnectionQuality::Poor),
        (9_999, ConnectionQuality::Poor),
        (10_000, ConnectionQuality::Dead),
    ];

    for (delta, expected) in cases {
        let mut m = monitor();
        m.record_message_at(0);
        // Speech just before the tick keeps the grace window open
        m.record_speech_at(delta.saturating_sub(1));
        m.tick_at(delta);
        assert_eq!(m.quality(), expected, "delta={}ms", delta);
    }
}

#[test]
fn test_grace_period_switches_thresholds() {
    // Speech ends at t=0; the 10s threshold applies until t=5000, the 60s
    // threshold after. At t=12_000 the gap is 12s: dead under the speaking
    // threshold, merely poor under the silent one.
    let mut m = monitor();
    m.record_message_at(0);
    m.record_speech_at(0);

    // Still inside the grace window at t=4_999 -> speaking threshold, but
    // the gap (4_999ms) is below 10s, so only degraded territory applies
    m.tick_at(4_999);
    assert_eq!(m.quality(), ConnectionQuality::Degraded);

    // Past the grace window: 12s of silence is Poor against the 60s threshold
    m.tick_at(12_000);
    assert_eq!(m.quality(), ConnectionQuality::Poor);
}

#[test]
fn test_grace_period_keeps_speaking_threshold_open() {
    let mut m = monitor();
    m.record_message_at(0);
    // Speech at t=6_000; tick at t=10_999 is within the 5s grace window
    // and the 10_999ms gap crosses the 10s speaking threshold
    m.record_speech_at(6_000);
    let outcome = m.tick_at(10_999);

    assert_eq!(m.quality(), ConnectionQuality::Dead);
    assert_eq!(outcome, TickOutcome::ReconnectNeeded);
}

#[test]
fn test_message_recording_does_not_transition() {
    let mut m = monitor();
    m.record_message_at(0);
    m.tick_at(6_000);
    assert_eq!(m.quality(), ConnectionQuality::Poor);

    // Recovery is observed by the next tick, not asserted by the producer
    m.record_message_at(6_100);
    assert_eq!(m.quality(), ConnectionQuality::Poor);

    m.tick_at(7_000);
    assert_eq!(m.quality(), ConnectionQuality::Good);
}

#[test]
fn test_reconnect_needed_once_per_dead_episode() {
    let mut m = monitor();
    m.record_message_at(0);
    m.record_speech_at(9_999);

    assert_eq!(m.tick_at(10_000), TickOutcome::ReconnectNeeded);
    // Still dead on the next tick, but the episode already signaled
    assert_eq!(m.tick_at(11_000), TickOutcome::Quiet);

    // Recover, then die again: a fresh episode signals again
    m.record_message_at(12_000);
    assert_eq!(m.tick_at(13_000), TickOutcome::Quiet);
    assert_eq!(m.quality(), ConnectionQuality::Good);

    m.record_speech_at(23_000);
    assert_eq!(m.tick_at(23_500), TickOutcome::ReconnectNeeded);
}

#[test]
fn test_backoff_sequence() {
    let mut m = monitor();
    assert!(m.begin_reconnect_at(0));

    let expected = [1_000u64, 2_000, 4_000, 8_000, 16_000];
    for (i, want) in expected.iter().enumerate() {
        assert_eq!(
            m.next_backoff().as_millis() as u64,
            *want,
            "attempt {}",
            i
        );
        // Raise the attempt count without hitting the cap
        if i < expected.len() - 1 {
            assert_eq!(m.reconnect_failed_at(1_000 * i as u64), RetryDecision::Retry);
        }
    }
}

#[test]
fn test_backoff_is_capped() {
    let mut config = HealthConfig::default();
    config.max_reconnect_attempts = 10;
    let mut m = HealthMonitor::new(Participant::Customer, config);
    m.start_at(0);
    assert!(m.begin_reconnect_at(0));

    for _ in 0..5 {
        m.reconnect_failed_at(0);
    }
    // 1000 * 2^5 = 32_000, capped at 30_000
    assert_eq!(m.next_backoff().as_millis() as u64, 30_000);
}

#[test]
fn test_give_up_after_max_attempts() {
    let mut m = monitor();
    assert!(m.begin_reconnect_at(1_000));

    for i in 0..4 {
        assert_eq!(
            m.reconnect_failed_at(2_000 + i),
            RetryDecision::Retry,
            "attempt {}",
            i + 1
        );
    }
    assert_eq!(m.reconnect_failed_at(31_000), RetryDecision::GiveUp);

    assert_eq!(m.quality(), ConnectionQuality::Offline);
    assert!(!m.is_reconnecting());

    let snapshot = m.snapshot_at(31_000);
    let last = snapshot.reconnection_ledger.last().unwrap();
    assert!(!last.success);
    assert_eq!(last.attempts, 5);

    // Terminal: further reconnection attempts are refused
    assert!(!m.begin_reconnect_at(32_000));
}

#[test]
fn test_successful_reconnection_resets_attempts() {
    let mut m = monitor();
    m.record_message_at(0);
    assert!(m.begin_reconnect_at(10_000));
    assert_eq!(m.quality(), ConnectionQuality::Reconnecting);

    m.reconnect_failed_at(11_000);
    m.reconnect_failed_at(13_000);
    assert_eq!(m.reconnect_attempts(), 2);

    m.reconnect_succeeded_at(17_000);
    assert_eq!(m.reconnect_attempts(), 0);
    assert_eq!(m.quality(), ConnectionQuality::Good);
    assert!(!m.is_reconnecting());

    let snapshot = m.snapshot_at(17_000);
    let last = snapshot.reconnection_ledger.last().unwrap();
    assert!(last.success);
    assert_eq!(last.attempts, 2);
    // Outage duration measured from the episode's connection start
    assert_eq!(last.duration_ms, 17_000);
}

#[test]
fn test_single_flight_guard() {
    let mut m = monitor();
    assert!(m.begin_reconnect_at(0));
    // A concurrent trigger must not start a second sequence
    assert!(!m.begin_reconnect_at(1));
}

#[test]
fn test_quality_history_bounded_to_sixty_seconds() {
    let mut m = monitor();
    m.record_message_at(0);

    for i in 1..=70u64 {
        m.record_message_at(i * 1_000 - 500);
        m.tick_at(i * 1_000);
    }

    let snapshot = m.snapshot_at(70_000);
    assert!(!snapshot.quality_history.is_empty());
    for entry in &snapshot.quality_history {
        assert!(
            entry.timestamp_ms >= 10_000,
            "entry at {}ms is older than the 60s window",
            entry.timestamp_ms
        );
    }
}

#[test]
fn test_reconnection_ledger_keeps_five_most_recent() {
    let mut m = monitor();

    for i in 0..6u64 {
        let t = i * 100_000;
        assert!(m.begin_reconnect_at(t));
        m.reconnect_succeeded_at(t + 500);
    }

    let snapshot = m.snapshot_at(600_000);
    assert_eq!(snapshot.reconnection_ledger.len(), 5);
    // The first outcome was pruned from the head
    assert_eq!(snapshot.reconnection_ledger[0].timestamp_ms, 100_500);
}

#[test]
fn test_transport_close_goes_offline_when_not_reconnecting() {
    let mut m = monitor();
    m.record_message_at(0);
    m.transport_closed_at(1_000);
    assert_eq!(m.quality(), ConnectionQuality::Offline);
}

#[test]
fn test_transport_close_ignored_mid_reconnection() {
    let mut m = monitor();
    assert!(m.begin_reconnect_at(0));
    m.transport_closed_at(100);
    assert_eq!(m.quality(), ConnectionQuality::Reconnecting);
}

#[test]
fn test_disconnect_cancels_reconnection() {
    let mut m = monitor();
    assert!(m.begin_reconnect_at(0));
    m.disconnect_at(100);

    assert_eq!(m.quality(), ConnectionQuality::Offline);
    assert!(!m.is_reconnecting());
}

#[test]
fn test_stale_reconnect_outcomes_ignored_after_disconnect() {
    let mut m = monitor();
    assert!(m.begin_reconnect_at(0));
    m.disconnect_at(100);

    // An attempt that was already in flight completes afterwards; neither
    // outcome may resurrect the terminal offline state or touch the ledger
    m.reconnect_succeeded_at(300);
    assert_eq!(m.quality(), ConnectionQuality::Offline);
    assert_eq!(m.reconnect_attempts(), 0);
    assert!(m.snapshot_at(300).reconnection_ledger.is_empty());

    assert_eq!(m.reconnect_failed_at(400), RetryDecision::GiveUp);
    assert_eq!(m.quality(), ConnectionQuality::Offline);
    assert_eq!(m.reconnect_attempts(), 0);
    assert!(m.snapshot_at(400).reconnection_ledger.is_empty());
}

#[test]
fn test_config_change_applies_on_next_tick() {
    let mut m = monitor();
    m.record_message_at(0);
    m.tick_at(4_000);
    assert_eq!(m.quality(), ConnectionQuality::Degraded);

    let mut config = HealthConfig::default();
    config.degraded_threshold_ms = 6_000;
    m.set_config(config);

    m.tick_at(4_500);
    assert_eq!(m.quality(), ConnectionQuality::Good);
}

#[test]
fn test_snapshot_serializes() {
    let mut m = monitor();
    m.record_message_at(0);
    m.record_error();
    m.tick_at(1_000);

    let snapshot = m.snapshot_at(2_000);
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"quality\":\"good\""));
    assert!(json.contains("\"total_errors\":1"));
}
