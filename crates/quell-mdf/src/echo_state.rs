//! Buffers and scalar state of one canceller instance.
//!
//! All buffers are allocated once from the configuration and are never
//! resized. Multi-channel buffers are flat arenas indexed by stride:
//!
//! - weights: block `(mic, speaker, j)` at `((mic * M + j) * K + speaker) * N`
//! - far-end spectra: block `(j, speaker)` at `(j * K + speaker) * N`
//!
//! where `N` is the window size, `M` the number of filter blocks and `K`
//! the number of speakers. Block index 0 of the far-end spectra is always
//! the newest frame.

use derive_more::Debug;
use quell_fft::Transform;

use crate::config::{MdfConfig, Tuning};
use crate::filters::{DcNotch, hann, notch_radius};
use crate::sanity::Watchdog;
use crate::scalar::Scalar;
use crate::spectral::power_spectrum;
use crate::two_path::TwoPath;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EchoState<T> {
    pub(crate) frame_size: usize,
    pub(crate) window_size: usize,
    /// Number of filter blocks `M`.
    pub(crate) blocks: usize,
    pub(crate) mics: usize,
    pub(crate) speakers: usize,
    pub(crate) filter_length: usize,
    pub(crate) two_path: bool,
    pub(crate) tuning: Tuning,

    pub(crate) sample_rate: u32,
    pub(crate) spec_average: T,
    pub(crate) beta0: T,
    pub(crate) beta_max: T,
    pub(crate) notch_radius: f32,

    pub(crate) cancel_count: u64,
    pub(crate) sum_adapt: T,
    pub(crate) adapted: bool,
    pub(crate) saturated: u32,
    pub(crate) watchdog: Watchdog,
    pub(crate) leak_estimate: T,
    /// Smoothed residual/echo cross-correlation.
    pub(crate) pey: T,
    /// Smoothed echo autocorrelation.
    pub(crate) pyy: T,
    pub(crate) paths: TwoPath<T>,

    /// Filtered, pre-emphasized near end, `C * frame_size`.
    #[debug(skip)]
    pub(crate) input: Vec<f32>,
    /// Two-frame far-end history per speaker, `K * N`.
    #[debug(skip)]
    pub(crate) x: Vec<f32>,
    /// Far-end spectral history, `(M + 1) * K * N`.
    #[debug(skip)]
    pub(crate) far_spectra: Vec<f32>,
    /// Residual per mic, `C * N`.
    #[debug(skip)]
    pub(crate) e: Vec<f32>,
    /// Background echo estimate per mic, `C * N`.
    #[debug(skip)]
    pub(crate) y: Vec<f32>,
    #[debug(skip)]
    pub(crate) err_spectra: Vec<f32>,
    #[debug(skip)]
    pub(crate) echo_spectra: Vec<f32>,
    /// Background filter, `C * M * K * N`.
    #[debug(skip)]
    pub(crate) weights: Vec<f32>,
    /// Foreground filter, same shape as `weights`.
    #[debug(skip)]
    pub(crate) foreground: Vec<f32>,
    /// Echo removed from mic 0 over the last two frames.
    #[debug(skip)]
    pub(crate) last_y: Vec<f32>,

    #[debug(skip)]
    pub(crate) power: Vec<T>,
    #[debug(skip)]
    pub(crate) power_1: Vec<T>,
    #[debug(skip)]
    pub(crate) rf: Vec<T>,
    #[debug(skip)]
    pub(crate) yf: Vec<T>,
    #[debug(skip)]
    pub(crate) xf: Vec<T>,
    #[debug(skip)]
    pub(crate) eh: Vec<T>,
    #[debug(skip)]
    pub(crate) yh: Vec<T>,
    #[debug(skip)]
    pub(crate) prop: Vec<T>,

    #[debug(skip)]
    pub(crate) phi: Vec<f32>,
    #[debug(skip)]
    pub(crate) wtmp: Vec<f32>,
    #[debug(skip)]
    pub(crate) window: Vec<f32>,

    #[debug(skip)]
    pub(crate) notch: Vec<DcNotch>,
    #[debug(skip)]
    pub(crate) mem_d: Vec<f32>,
    #[debug(skip)]
    pub(crate) mem_x: Vec<f32>,
    #[debug(skip)]
    pub(crate) mem_e: Vec<f32>,
}

impl<T: Scalar> EchoState<T> {
    /// Allocates the state for an already validated configuration.
    pub(crate) fn new(config: &MdfConfig) -> Self {
        let frame = config.frame_size;
        let n = config.window_size();
        let m = config.num_blocks();
        let c = config.num_mics;
        let k = config.num_speakers;
        let bins = frame + 1;
        let mut state = Self {
            frame_size: frame,
            window_size: n,
            blocks: m,
            mics: c,
            speakers: k,
            filter_length: config.filter_length,
            two_path: config.two_path,
            tuning: config.tuning,
            sample_rate: config.sample_rate,
            spec_average: T::ZERO,
            beta0: T::ZERO,
            beta_max: T::ZERO,
            notch_radius: 0.0,
            cancel_count: 0,
            sum_adapt: T::ZERO,
            adapted: false,
            saturated: 0,
            watchdog: Watchdog::default(),
            leak_estimate: T::ZERO,
            pey: T::ONE,
            pyy: T::ONE,
            paths: TwoPath::new(),
            input: vec![0.0; c * frame],
            x: vec![0.0; k * n],
            far_spectra: vec![0.0; (m + 1) * k * n],
            e: vec![0.0; c * n],
            y: vec![0.0; c * n],
            err_spectra: vec![0.0; c * n],
            echo_spectra: vec![0.0; c * n],
            weights: vec![0.0; c * m * k * n],
            foreground: vec![0.0; c * m * k * n],
            last_y: vec![0.0; n],
            power: vec![T::ZERO; bins],
            power_1: vec![T::ONE; bins],
            rf: vec![T::ZERO; bins],
            yf: vec![T::ZERO; bins],
            xf: vec![T::ZERO; bins],
            eh: vec![T::ZERO; bins],
            yh: vec![T::ZERO; bins],
            prop: vec![T::ZERO; m],
            phi: vec![0.0; n],
            wtmp: vec![0.0; n],
            window: hann(n),
            notch: vec![DcNotch::default(); c],
            mem_d: vec![0.0; c],
            mem_x: vec![0.0; k],
            mem_e: vec![0.0; c],
        };
        state.set_sampling_rate(config.sample_rate);
        state.reset();
        state
    }

    /// Returns every buffer and counter to its post-construction value.
    pub(crate) fn reset(&mut self) {
        self.cancel_count = 0;
        self.sum_adapt = T::ZERO;
        self.adapted = false;
        self.saturated = 0;
        self.watchdog.clear();
        self.leak_estimate = T::ZERO;
        self.pey = T::ONE;
        self.pyy = T::ONE;
        self.paths.clear();

        for buf in [
            &mut self.input,
            &mut self.x,
            &mut self.far_spectra,
            &mut self.e,
            &mut self.y,
            &mut self.err_spectra,
            &mut self.echo_spectra,
            &mut self.weights,
            &mut self.foreground,
            &mut self.last_y,
            &mut self.phi,
            &mut self.wtmp,
            &mut self.mem_d,
            &mut self.mem_x,
            &mut self.mem_e,
        ] {
            buf.fill(0.0);
        }
        for buf in [
            &mut self.power,
            &mut self.rf,
            &mut self.yf,
            &mut self.xf,
            &mut self.eh,
            &mut self.yh,
        ] {
            buf.fill(T::ZERO);
        }
        self.power_1.fill(T::ONE);
        self.notch.iter_mut().for_each(DcNotch::reset);
        self.init_prop();
    }

    /// Exponentially decaying block shares summing to 0.8.
    fn init_prop(&mut self) {
        let decay = (-2.4 / self.blocks as f32).exp();
        let mut shares = Vec::with_capacity(self.blocks);
        let mut share = 0.7f32;
        for _ in 0..self.blocks {
            shares.push(share);
            share *= decay;
        }
        let sum: f32 = shares.iter().sum();
        for (p, s) in self.prop.iter_mut().zip(shares) {
            *p = T::from_f32(0.8 * s / sum);
        }
    }

    /// Recomputes every rate-dependent constant.
    ///
    /// `sample_rate` has been validated against
    /// [`MAX_SAMPLE_RATE`](crate::MAX_SAMPLE_RATE).
    pub(crate) fn set_sampling_rate(&mut self, sample_rate: u32) {
        let frame = self.frame_size as i32;
        let rate = sample_rate as i32;
        self.sample_rate = sample_rate;
        self.spec_average = T::ratio(frame, rate);
        self.beta0 = T::ratio(2 * frame, rate);
        self.beta_max = T::ratio(frame, 2 * rate);
        self.notch_radius = notch_radius(sample_rate);
    }

    /// Echo expected to remain in the last output, per bin.
    ///
    /// `out` has `frame_size + 1` bins.
    pub(crate) fn residual_echo(&mut self, fft: &mut dyn Transform, out: &mut [f32]) {
        assert_eq!(out.len(), self.frame_size + 1);
        for ((w, &win), &ly) in self.wtmp.iter_mut().zip(&self.window).zip(&self.last_y) {
            *w = win * ly;
        }
        fft.forward(&self.wtmp, &mut self.phi);
        power_spectrum(&self.phi, out);
        let leak2 = (T::from_f32(2.0) * self.leak_estimate).min(T::ONE).to_f32();
        for v in out.iter_mut() {
            *v *= leak2;
        }
    }

    /// Time-domain background filter of one mic/speaker pair in Q15.
    ///
    /// `out` has `blocks * frame_size` taps.
    pub(crate) fn impulse_response(
        &mut self,
        fft: &mut dyn Transform,
        mic: usize,
        speaker: usize,
        out: &mut [i32],
    ) {
        let n = self.window_size;
        let frame = self.frame_size;
        assert!(mic < self.mics && speaker < self.speakers);
        assert_eq!(out.len(), self.blocks * frame);
        // The unscaled inverse of a filter block is `N` times its taps.
        let scale = 32767.0 / n as f32;
        for (j, taps) in out.chunks_exact_mut(frame).enumerate() {
            let start = self.weight_block(mic, speaker, j);
            fft.inverse(&self.weights[start..start + n], &mut self.wtmp);
            for (tap, &v) in taps.iter_mut().zip(&self.wtmp) {
                *tap = T::from_f32(scale * v).to_i32();
            }
        }
    }

    pub(crate) fn weight_block(&self, mic: usize, speaker: usize, j: usize) -> usize {
        ((mic * self.blocks + j) * self.speakers + speaker) * self.window_size
    }

    pub(crate) fn far_block(&self, j: usize, speaker: usize) -> usize {
        (j * self.speakers + speaker) * self.window_size
    }
}
