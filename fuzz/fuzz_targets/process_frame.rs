#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quell_mdf::{FrameOutcome, MdfCanceller, MdfConfig, PseudoFloat, Scalar};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Frame size in units of 16 samples (clamped to 1-8)
    frame_units: u8,
    /// Filter blocks (clamped to 1-4)
    blocks: u8,
    /// Microphone and speaker counts (clamped to 1-2)
    mics: u8,
    speakers: u8,
    two_path: bool,
    pseudo_float: bool,
    /// Near-end samples followed by far-end samples, reused per frame
    samples: Vec<i16>,
}

fn run<T: Scalar>(config: MdfConfig, samples: &[i16]) {
    let near_len = config.frame_size * config.num_mics;
    let far_len = config.frame_size * config.num_speakers;
    let mut aec = MdfCanceller::<T>::new(config).expect("valid configuration");
    let mut out = vec![0i16; near_len];
    for chunk in samples.chunks_exact(near_len + far_len) {
        let (near, far) = chunk.split_at(near_len);
        let outcome = aec.cancel(near, far, &mut out);
        if outcome == FrameOutcome::Reset {
            assert!(out.iter().all(|&s| s == 0));
        }
        let mut echo = vec![0.0f32; config.frame_size + 1];
        aec.residual_echo(&mut echo);
        assert!(echo.iter().all(|v| v.is_finite()));
    }
}

fuzz_target!(|input: FuzzInput| {
    let frame_size = 16 * (usize::from(input.frame_units % 8) + 1);
    let config = MdfConfig {
        num_mics: usize::from(input.mics % 2) + 1,
        num_speakers: usize::from(input.speakers % 2) + 1,
        two_path: input.two_path,
        ..MdfConfig::new(frame_size, frame_size * (usize::from(input.blocks % 4) + 1))
    };
    if input.pseudo_float {
        run::<PseudoFloat>(config, &input.samples);
    } else {
        run::<f32>(config, &input.samples);
    }
});
