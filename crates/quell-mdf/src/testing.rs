//! Deterministic signals shared by the unit tests.

/// Uniform noise from a linear congruential generator.
pub(crate) struct Noise(u32);

impl Noise {
    pub(crate) fn new(seed: u32) -> Self {
        Self(seed)
    }

    /// One sample in `[-amplitude, amplitude]`.
    pub(crate) fn sample(&mut self, amplitude: f32) -> i16 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let unit = (self.0 >> 8) as f32 / (1u32 << 24) as f32;
        ((2.0 * unit - 1.0) * amplitude) as i16
    }

    pub(crate) fn frame(&mut self, len: usize, amplitude: f32) -> Vec<i16> {
        (0..len).map(|_| self.sample(amplitude)).collect()
    }
}

/// A sparse linear echo path of `(delay, gain)` taps.
pub(crate) struct EchoPath {
    taps: Vec<(usize, f32)>,
    history: Vec<f32>,
}

impl EchoPath {
    pub(crate) fn new(taps: &[(usize, f32)]) -> Self {
        Self {
            taps: taps.to_vec(),
            history: Vec::new(),
        }
    }

    /// Echo of the next mono far-end frame.
    pub(crate) fn process(&mut self, far: &[i16]) -> Vec<f32> {
        let start = self.history.len();
        self.history.extend(far.iter().map(|&s| f32::from(s)));
        (start..self.history.len())
            .map(|n| {
                self.taps
                    .iter()
                    .filter(|&&(delay, _)| delay <= n)
                    .map(|&(delay, gain)| gain * self.history[n - delay])
                    .sum()
            })
            .collect()
    }
}

/// Far-end noise played through an echo path, with optional near-end
/// noise on top of the echo.
pub(crate) struct Scene {
    far: Noise,
    talk: Noise,
    pub(crate) path: EchoPath,
}

impl Scene {
    pub(crate) fn new(taps: &[(usize, f32)]) -> Self {
        Self {
            far: Noise::new(21),
            talk: Noise::new(22),
            path: EchoPath::new(taps),
        }
    }

    /// Next `(near, far)` pair. `talk` is the near-end noise amplitude.
    pub(crate) fn frame(&mut self, len: usize, talk: f32) -> (Vec<i16>, Vec<i16>) {
        let far = self.far.frame(len, 3000.0);
        let near: Vec<f32> = self
            .path
            .process(&far)
            .into_iter()
            .map(|echo| echo + f32::from(self.talk.sample(talk)))
            .collect();
        (to_i16(&near), far)
    }
}

pub(crate) fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&v| v.round().clamp(-32768.0, 32767.0) as i16)
        .collect()
}

pub(crate) fn energy(samples: &[i16]) -> f64 {
    samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
