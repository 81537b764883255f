#![no_main]

use std::iter;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quell::{Config, EchoCanceller};
use quell_mdf::{MdfCanceller, MdfConfig};

#[derive(Debug, Arbitrary)]
enum Op {
    Capture,
    Render,
    Process,
    Reset,
    SetFilterLength(u16),
    SetChannels(u8, u8),
    SetSampleRate(u32),
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    ops: Vec<Op>,
    /// Audio samples reused for every frame
    samples: Vec<i16>,
}

fuzz_target!(|input: FuzzInput| {
    let config = Config {
        sample_rate_hz: 8_000,
        frame_ms: 10,
        tail_ms: 40,
        ..Default::default()
    };
    let Ok(mut aec) = EchoCanceller::builder().config(config).build() else {
        return;
    };
    let mut engine =
        MdfCanceller::<f32>::new(MdfConfig::new(80, 320)).expect("valid configuration");

    let frame = aec.frame_size();
    if input.samples.len() < frame {
        return;
    }
    let src = &input.samples[..frame];
    let mut out = vec![0i16; frame];

    for op in input.ops {
        match op {
            // The facade rejects nothing but malformed buffers here.
            Op::Capture => {
                aec.process_capture_i16(src, &mut out).expect("frame length");
            }
            Op::Render => aec.process_render_i16(src).expect("frame length"),
            Op::Process => {
                aec.process_i16(src, src, &mut out).expect("frame length");
                let near: Vec<i16> = src
                    .iter()
                    .flat_map(|&s| iter::repeat_n(s, engine.num_mics()))
                    .collect();
                let far: Vec<i16> = src
                    .iter()
                    .flat_map(|&s| iter::repeat_n(s / 2, engine.num_speakers()))
                    .collect();
                let mut engine_out = vec![0; near.len()];
                engine.cancel(&near, &far, &mut engine_out);
            }
            Op::Reset => {
                aec.reset();
                engine.reset();
            }
            Op::SetFilterLength(len) => {
                let _ = engine.set_filter_length(usize::from(len % 4096));
            }
            Op::SetChannels(mics, speakers) => {
                let _ = engine.set_channels(usize::from(mics % 3), usize::from(speakers % 3));
            }
            Op::SetSampleRate(rate) => {
                let _ = engine.set_sampling_rate(rate);
            }
        }
    }
});
