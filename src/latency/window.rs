use std::collections::VecDeque;

use serde::Serialize;

/// Samples kept per stage window; oldest evicted first
const WINDOW_CAP: usize = 100;

/// Statistics derived from a window's current contents
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
}

/// Bounded sliding window of latency samples (ms)
///
/// Statistics are recomputed from the live contents on every read, never
/// kept as running aggregates, so evicting an old sample is immediately
/// reflected.
#[derive(Debug, Default)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
}

impl LatencyWindow {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_CAP),
        }
    }

    pub fn push(&mut self, sample_ms: f64) {
        self.samples.push_back(sample_ms);
        while self.samples.len() > WINDOW_CAP {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Average / min / max / 95th percentile (nearest-rank) of the window
    pub fn stats(&self) -> Option<LatencyStats> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        // Nearest-rank: ceil(0.95 * n), 1-indexed
        let rank = ((0.95 * count as f64).ceil() as usize).clamp(1, count);

        Some(LatencyStats {
            samples: count,
            average_ms: sum / count as f64,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            p95_ms: sorted[rank - 1],
        })
    }
}
