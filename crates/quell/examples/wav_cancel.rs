//! Offline echo cancellation of WAV recordings.
//!
//! Takes a microphone recording and the signal that was played through the
//! loudspeakers at the same time, and writes the microphone recording with
//! the echo removed. Both inputs must be 16-bit PCM at the same rate.
//!
//! ```sh
//! cargo run -p quell --example wav_cancel --features examples -- \
//!     --mic mic.wav --speaker speaker.wav --output cleaned.wav
//! ```

mod common;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use quell::{Config, EchoCanceller, FrameOutcome};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Remove loudspeaker echo from a microphone recording")]
struct Args {
    /// Microphone recording.
    #[arg(long)]
    mic: PathBuf,
    /// Loudspeaker signal, time-aligned with the microphone recording.
    #[arg(long)]
    speaker: PathBuf,
    /// Where to write the cleaned recording.
    #[arg(long)]
    output: PathBuf,
    /// Frame duration in milliseconds.
    #[arg(long, default_value_t = 20)]
    frame_ms: u32,
    /// Longest echo path in milliseconds.
    #[arg(long, default_value_t = 200)]
    tail_ms: u32,
    /// Disable the foreground/background filter pair.
    #[arg(long)]
    single_path: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let (mic_spec, mic) = common::read_wav(&args.mic)?;
    let (speaker_spec, speaker) = common::read_wav(&args.speaker)?;
    if mic_spec.sample_rate != speaker_spec.sample_rate {
        bail!(
            "sample rates differ: {} Hz vs {} Hz",
            mic_spec.sample_rate,
            speaker_spec.sample_rate
        );
    }

    let config = Config {
        sample_rate_hz: mic_spec.sample_rate,
        frame_ms: args.frame_ms,
        tail_ms: args.tail_ms,
        capture_channels: mic_spec.channels,
        render_channels: speaker_spec.channels,
        two_path: !args.single_path,
        ..Default::default()
    };
    let mut aec = EchoCanceller::builder()
        .config(config)
        .build()
        .context("creating echo canceller")?;

    let frame = aec.frame_size();
    let mic_len = frame * usize::from(mic_spec.channels);
    let speaker_len = frame * usize::from(speaker_spec.channels);
    let frames = (mic.len() / mic_len).min(speaker.len() / speaker_len);

    let mut cleaned = vec![0i16; frames * mic_len];
    let mut resets = 0;
    for (n, out) in cleaned.chunks_exact_mut(mic_len).enumerate() {
        let capture = &mic[n * mic_len..(n + 1) * mic_len];
        let render = &speaker[n * speaker_len..(n + 1) * speaker_len];
        if aec.process_i16(capture, render, out)? == FrameOutcome::Reset {
            resets += 1;
        }
    }

    common::write_wav(&args.output, mic_spec, &cleaned)?;

    let stats = aec.statistics();
    println!(
        "{frames} frames, ERLE {:.1} dB, {resets} divergence resets",
        stats.echo_return_loss_enhancement.unwrap_or(0.0)
    );
    Ok(())
}
