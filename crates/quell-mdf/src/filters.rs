//! Per-sample filters applied around the adaptive core.

use std::f32::consts::PI;

/// Second-order DC-blocking notch.
///
/// The state carries across frames so the filter is continuous at frame
/// boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct DcNotch {
    mem: [f32; 2],
}

impl DcNotch {
    /// Filters the `stride`-interleaved samples of `input` into `out`.
    pub(crate) fn process(&mut self, input: &[i16], stride: usize, radius: f32, out: &mut [f32]) {
        let den2 = radius * radius + 0.7 * (1.0 - radius) * (1.0 - radius);
        for (o, &v) in out.iter_mut().zip(input.iter().step_by(stride)) {
            let vin = f32::from(v);
            let vout = self.mem[0] + vin;
            self.mem[0] = self.mem[1] + 2.0 * (-vin + radius * vout);
            self.mem[1] = vin - den2 * vout;
            *o = (radius * vout).clamp(-32767.0, 32767.0);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.mem = [0.0; 2];
    }
}

/// Notch radius for a sampling rate.
pub(crate) fn notch_radius(sample_rate: u32) -> f32 {
    if sample_rate < 12_000 {
        0.9
    } else if sample_rate < 24_000 {
        0.982
    } else {
        0.992
    }
}

/// First-order pre-emphasis `y[n] = x[n] - c * x[n-1]` in place.
///
/// `mem` holds the last input sample of the previous call.
pub(crate) fn preemphasize(samples: &mut [f32], coef: f32, mem: &mut f32) {
    for s in samples {
        let x = *s;
        *s = x - coef * *mem;
        *mem = x;
    }
}

/// Hann window of `len` samples.
pub(crate) fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / len as f32).cos())
        .collect()
}
