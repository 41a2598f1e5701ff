use anyhow::Result;
use serde::Deserialize;

use crate::health::HealthConfig;
use crate::vad::DEFAULT_VAD_THRESHOLD;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub vad: VadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Sample rate of ingested PCM audio (the translation service expects 16kHz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono)
    #[serde(default = "default_channels")]
    pub channels: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VadConfig {
    /// RMS speech threshold as a fraction of full scale
    #[serde(default = "default_vad_threshold")]
    pub threshold: f32,
}

fn default_session_id() -> String {
    format!("call-{}", uuid::Uuid::new_v4())
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_vad_threshold() -> f32 {
    DEFAULT_VAD_THRESHOLD
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: default_vad_threshold(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
