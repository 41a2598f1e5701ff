// Demo driver: runs the telemetry engine against a simulated two-party
// translation session.
//
// Feeds PCM frames (from a WAV fixture if given, otherwise a synthesized
// speech/silence pattern) through the VAD and ingestion queue, fabricates
// transcription/translation/synthesis arrivals with plausible delays, and
// prints both participants' health and latency snapshots as JSON.
//
// Usage: cargo run -- --duration 10 [--wav path/to/fixture.wav]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use callbridge::{Config, Participant, ReconnectHandler, TelemetryEngine};
use clap::Parser;
use tokio::time::sleep;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "callbridge")]
#[command(about = "Simulated telemetry session for the call bridge engine")]
struct Args {
    /// How long to run the simulation, in seconds
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Optional 16-bit PCM WAV file to feed as the agent's audio
    #[arg(short, long)]
    wav: Option<String>,

    /// Configuration file (TOML, without extension)
    #[arg(short, long, default_value = "config/callbridge")]
    config: String,
}

/// Demo handler: pretends the first attempt fails, then reconnects
struct DemoReconnect;

#[async_trait]
impl ReconnectHandler for DemoReconnect {
    async fn reconnect(&self, participant: Participant, attempt: u32) -> Result<()> {
        if attempt == 0 {
            anyhow::bail!("[{}] simulated session request failure", participant);
        }
        Ok(())
    }
}

/// 100ms of synthesized audio: a tone burst while "speaking", silence otherwise
fn synth_frame(frame_index: usize, sample_rate: u32) -> Vec<i16> {
    let samples_per_frame = sample_rate as usize / 10;
    // Two seconds of speech, one second of silence, repeating
    let speaking = frame_index % 30 < 20;

    if !speaking {
        return vec![0i16; samples_per_frame];
    }

    (0..samples_per_frame)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (0.3 * (2.0 * std::f32::consts::PI * 220.0 * t).sin() * i16::MAX as f32) as i16
        })
        .collect()
}

fn load_wav(path: &str) -> Result<Vec<i16>> {
    let mut reader = hound::WavReader::open(path)?;
    let samples: std::result::Result<Vec<i16>, _> = reader.samples::<i16>().collect();
    Ok(samples?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("config load failed ({}), using defaults", e);
            Config::default()
        }
    };

    info!("Callbridge telemetry demo");
    info!("Session: {}", config.session.session_id);
    info!("Running for {} seconds", args.duration);

    let sample_rate = config.session.sample_rate;
    let wav_samples = match &args.wav {
        Some(path) => {
            let samples = load_wav(path)?;
            info!("Loaded {} samples from {}", samples.len(), path);
            Some(samples)
        }
        None => None,
    };

    let engine = TelemetryEngine::new(&config, Arc::new(DemoReconnect));
    engine.start().await;

    // Simulated capture + service loop
    let sim_engine = engine.clone();
    let sim = tokio::spawn(async move {
        let samples_per_frame = sample_rate as usize / 10;
        let mut frame_index = 0usize;
        let mut offset_ms = [0f64; 2];

        loop {
            for participant in Participant::both() {
                let frame = match (&wav_samples, participant) {
                    (Some(samples), Participant::Agent) if !samples.is_empty() => {
                        let start = (frame_index * samples_per_frame) % samples.len();
                        let end = (start + samples_per_frame).min(samples.len());
                        samples[start..end].to_vec()
                    }
                    _ => synth_frame(frame_index + participant.index() * 15, sample_rate),
                };

                let speaking = sim_engine.process_frame(participant, &frame).await;

                let pcm: Vec<u8> = frame.iter().flat_map(|s| s.to_le_bytes()).collect();
                sim_engine.enqueue_audio_chunk(participant, &pcm);

                let frame_ms = frame.len() as f64 / sample_rate as f64 * 1000.0;
                let idx = participant.index();
                offset_ms[idx] += frame_ms;

                // The service answers for audio we actually spoke
                if speaking && frame_index % 5 == 0 {
                    let end_offset = offset_ms[idx] - frame_ms / 2.0;
                    let now = sim_engine.now_ms();
                    sim_engine.on_message_received(participant).await;
                    sim_engine.enqueue_transcription(participant, now + 250, end_offset);
                    sim_engine.enqueue_translation(participant, now + 420, end_offset);
                    sim_engine.enqueue_synthesis(participant.other(), now + 600);
                }
            }

            frame_index += 1;
            sleep(Duration::from_millis(100)).await;
        }
    });

    sleep(Duration::from_secs(args.duration)).await;
    sim.abort();

    for participant in Participant::both() {
        let health = engine.health_snapshot(participant).await;
        let latency = engine.latency_snapshot(participant).await;

        println!("=== {} ===", participant);
        println!("{}", serde_json::to_string_pretty(&health)?);
        println!("{}", serde_json::to_string_pretty(&latency)?);
    }

    engine.shutdown().await;
    info!("Demo complete");

    Ok(())
}
