//! Minimal echo cancellation demo.
//!
//! Plays synthetic noise through a simulated room, captures the echo
//! together with a quiet near-end tone, and reports how much of the echo
//! was removed.
//!
//! ```sh
//! cargo run -p quell --example simple
//! ```

use std::f32::consts::TAU;

use quell::{Config, EchoCanceller};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config {
        sample_rate_hz: 16_000,
        frame_ms: 10,
        tail_ms: 100,
        ..Default::default()
    };
    let mut aec = EchoCanceller::builder()
        .config(config)
        .build()
        .expect("valid configuration");
    let frame = aec.frame_size();

    // The room delays the loudspeaker by 2 ms and attenuates it to a third.
    let echo_delay = 32;
    let mut played: Vec<f32> = Vec::new();
    let mut rng = 0x1234_5678u32;
    let mut out = vec![0.0f32; frame];

    for n in 0..500 {
        let render: Vec<f32> = (0..frame)
            .map(|_| {
                rng = rng.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                0.2 * ((rng >> 8) as f32 / (1u32 << 24) as f32 - 0.5)
            })
            .collect();

        let start = played.len();
        played.extend_from_slice(&render);
        let capture: Vec<f32> = (start..start + frame)
            .map(|i| {
                let echo = if i >= echo_delay {
                    played[i - echo_delay] / 3.0
                } else {
                    0.0
                };
                let voice = 0.01 * (TAU * 300.0 * i as f32 / 16_000.0).sin();
                echo + voice
            })
            .collect();

        // Render and capture are aligned here, so cancel them together.
        let render_i16: Vec<i16> = render.iter().map(|&v| (v * 32767.0) as i16).collect();
        let capture_i16: Vec<i16> = capture.iter().map(|&v| (v * 32767.0) as i16).collect();
        let mut cleaned = vec![0i16; frame];
        aec.process_i16(&capture_i16, &render_i16, &mut cleaned)
            .expect("frames have the configured length");
        for (o, &c) in out.iter_mut().zip(&cleaned) {
            *o = f32::from(c) / 32768.0;
        }

        if n % 100 == 99 {
            let stats = aec.statistics();
            println!(
                "{:>4} ms  ERLE {:5.1} dB  adapted {}",
                (n + 1) * 10,
                stats.echo_return_loss_enhancement.unwrap_or(0.0),
                stats.echo.adapted
            );
        }
    }

    let peak = out.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
    println!("last frame peak after cancellation: {peak:.4}");
}
