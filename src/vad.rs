/// Default speech threshold as a fraction of full scale
pub const DEFAULT_VAD_THRESHOLD: f32 = 0.05;

/// RMS-power voice activity detector
///
/// Computes root-mean-square signal power over a 16-bit PCM frame and
/// compares it against a fixed fraction of full scale. This boolean is the
/// only VAD output the health monitors consume; the engine forwards it as
/// the "is this participant speaking" signal.
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    threshold: f32,
}

impl VoiceActivityDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// RMS power of the frame, normalized to [0.0, 1.0]
    pub fn rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f64 = samples
            .iter()
            .map(|&s| {
                let normalized = s as f64 / i16::MAX as f64;
                normalized * normalized
            })
            .sum();

        (sum_squares / samples.len() as f64).sqrt() as f32
    }

    /// Whether this frame counts as active speech
    pub fn is_speech(&self, samples: &[i16]) -> bool {
        Self::rms(samples) >= self.threshold
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new(DEFAULT_VAD_THRESHOLD)
    }
}
