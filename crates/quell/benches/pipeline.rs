//! Benchmarks for the echo cancellation pipeline and its transform.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use quell::{Config, EchoCanceller, PseudoFloat, Scalar};
use quell_fft::{RealFft, Transform};

// ---------------------------------------------------------------------------
// Full pipeline benchmarks
// ---------------------------------------------------------------------------

fn noise(len: usize, seed: u32) -> Vec<i16> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 20) as i16 - 2048
        })
        .collect()
}

/// A canceller warmed up on noise so the benchmark sees steady state.
fn make_aec<T: Scalar>(config: Config) -> (EchoCanceller<T>, Vec<i16>, Vec<i16>) {
    let mut aec = EchoCanceller::builder()
        .config(config)
        .build_with_scalar::<T>()
        .unwrap();
    let frame = aec.frame_size();
    let near = noise(frame * usize::from(config.capture_channels), 1);
    let far = noise(frame * usize::from(config.render_channels), 2);
    let mut out = vec![0; near.len()];
    for _ in 0..50 {
        aec.process_i16(&near, &far, &mut out).unwrap();
    }
    (aec, near, far)
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_i16");

    let cases = [
        ("8k_mono", Config {
            sample_rate_hz: 8_000,
            ..Default::default()
        }),
        ("16k_mono", Config::default()),
        ("16k_stereo", Config {
            capture_channels: 2,
            render_channels: 2,
            ..Default::default()
        }),
        ("48k_mono", Config {
            sample_rate_hz: 48_000,
            frame_ms: 10,
            ..Default::default()
        }),
    ];
    for (name, config) in cases {
        let (mut aec, near, far) = make_aec::<f32>(config);
        let mut out = vec![0; near.len()];
        group.bench_function(name, |b| {
            b.iter(|| {
                aec.process_i16(black_box(&near), black_box(&far), &mut out)
                    .unwrap()
            });
        });
    }

    let (mut aec, near, far) = make_aec::<PseudoFloat>(Config::default());
    let mut out = vec![0; near.len()];
    group.bench_function("16k_mono_pseudo_float", |b| {
        b.iter(|| {
            aec.process_i16(black_box(&near), black_box(&far), &mut out)
                .unwrap()
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Transform benchmarks
// ---------------------------------------------------------------------------

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("real_fft");
    for len in [256, 640, 1920] {
        let mut fft = RealFft::new(len).unwrap();
        let input: Vec<f32> = noise(len, 3).into_iter().map(f32::from).collect();
        let mut spectrum = vec![0.0; len];
        let mut output = vec![0.0; len];
        group.bench_function(format!("forward_inverse_{len}"), |b| {
            b.iter(|| {
                fft.forward(black_box(&input), &mut spectrum);
                fft.inverse(&spectrum, &mut output);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_process, bench_transform);
criterion_main!(benches);
