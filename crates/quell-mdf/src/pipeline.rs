//! The per-frame cancellation pipeline.

use quell_fft::Transform;

use crate::echo_state::EchoState;
use crate::filters::preemphasize;
use crate::sanity::FrameEnergies;
use crate::scalar::Scalar;
use crate::spectral::{
    adjust_prop, inner_prod, power_spectrum_accum, spectral_mul_accum, weighted_spectral_mul_conj,
};
use crate::two_path::PathDecision;

/// What happened to a frame handed to the canceller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The echo estimate was subtracted.
    Cancelled,
    /// No aligned far-end frame was available; the near end was copied.
    PassThrough,
    /// Sustained numeric anomalies reset the whole state. The frame was
    /// abandoned and the output is silent.
    Reset,
}

/// Floor of the per-bin step size.
const MIN_POWER_1: f32 = 1e-10;

impl<T: Scalar> EchoState<T> {
    /// Cancels one frame of interleaved samples.
    ///
    /// `near` and `out` hold `frame_size * mics` samples, `far` holds
    /// `frame_size * speakers`.
    pub(crate) fn process_frame(
        &mut self,
        fft: &mut dyn Transform,
        near: &[i16],
        far: &[i16],
        out: &mut [i16],
    ) -> FrameOutcome {
        assert_eq!(near.len(), self.frame_size * self.mics);
        assert_eq!(far.len(), self.frame_size * self.speakers);
        assert_eq!(out.len(), self.frame_size * self.mics);
        self.cancel_count += 1;

        if self.is_saturated(near) {
            self.saturated = self.saturated.max(2);
        }
        self.filter_near(near);
        let sxx = self.push_far(fft, far);

        let foreground_energy = if self.two_path {
            Some(self.foreground_residual(fft))
        } else {
            None
        };

        if self.adapted {
            adjust_prop(&self.weights, self.window_size, self.speakers, &mut self.prop);
        }
        if self.saturated == 0 {
            self.accumulate_gradient();
        } else {
            self.saturated -= 1;
        }
        self.constrain_weights(fft);

        let (mut see, dbf) = self.background_residual(fft);
        let sff = foreground_energy.unwrap_or(see);
        if self.two_path {
            match self.paths.update(sff, see, dbf, &self.tuning) {
                PathDecision::Keep => {}
                PathDecision::Promote => self.promote_background(),
                PathDecision::Rollback => {
                    self.rollback_background();
                    see = sff;
                }
            }
        }

        let (sey, syy, sdd) = self.synthesize_output(fft, out);

        let energies = FrameEnergies {
            sff,
            see,
            syy,
            sxx,
            sdd,
        };
        let verdict = energies.verdict(self.window_size);
        if self.watchdog.observe(verdict, self.tuning.reset_threshold) {
            tracing::error!(
                anomalies = self.watchdog.count(),
                ?verdict,
                ?energies,
                "echo canceller diverged, resetting"
            );
            out.fill(0);
            self.reset();
            return FrameOutcome::Reset;
        }

        self.update_step_size(sxx + sxx, see, syy, sey);
        self.remember_echo(near, out);
        FrameOutcome::Cancelled
    }

    fn is_saturated(&self, near: &[i16]) -> bool {
        let level = T::from_i16(self.tuning.saturation_level);
        near.iter().any(|&s| T::from_i16(s).abs() >= level)
    }

    /// DC notch then pre-emphasis of every mic into `input`.
    fn filter_near(&mut self, near: &[i16]) {
        let frame = self.frame_size;
        for mic in 0..self.mics {
            let input = &mut self.input[mic * frame..(mic + 1) * frame];
            self.notch[mic].process(&near[mic..], self.mics, self.notch_radius, input);
            preemphasize(input, self.tuning.preemphasis, &mut self.mem_d[mic]);
        }
    }

    /// Shifts the new far-end frame into the time and spectral histories.
    ///
    /// Returns the energy of the new pre-emphasized far-end frame.
    fn push_far(&mut self, fft: &mut dyn Transform, far: &[i16]) -> T {
        let n = self.window_size;
        let frame = self.frame_size;
        let k = self.speakers;
        let preemph = self.tuning.preemphasis;

        for speaker in 0..k {
            let x = &mut self.x[speaker * n..(speaker + 1) * n];
            x.copy_within(frame.., 0);
            let mem = &mut self.mem_x[speaker];
            for (dst, &s) in x[frame..].iter_mut().zip(far[speaker..].iter().step_by(k)) {
                let s = f32::from(s);
                *dst = s - preemph * *mem;
                *mem = s;
            }
        }

        // Oldest block drops off the end.
        let blocks_len = self.blocks * k * n;
        self.far_spectra.copy_within(0..blocks_len, k * n);
        let mut sxx = T::ZERO;
        for speaker in 0..k {
            let x = &self.x[speaker * n..(speaker + 1) * n];
            let start = speaker * n;
            fft.forward(x, &mut self.far_spectra[start..start + n]);
            sxx = sxx + inner_prod(&x[frame..], &x[frame..]);
        }
        sxx
    }

    /// Foreground residual into `e[..frame]`, foreground echo into
    /// `e[frame..]`. Returns the residual energy.
    fn foreground_residual(&mut self, fft: &mut dyn Transform) -> T {
        let n = self.window_size;
        let frame = self.frame_size;
        let filter_len = self.blocks * self.speakers * n;
        let mut sff = T::ZERO;
        for mic in 0..self.mics {
            let spectrum = &mut self.echo_spectra[mic * n..(mic + 1) * n];
            spectral_mul_accum(
                &self.far_spectra[..filter_len],
                &self.foreground[mic * filter_len..(mic + 1) * filter_len],
                spectrum,
            );
            let e = &mut self.e[mic * n..(mic + 1) * n];
            fft.inverse(spectrum, e);
            let input = &self.input[mic * frame..(mic + 1) * frame];
            for i in 0..frame {
                e[i] = input[i] - e[i + frame];
            }
            sff = sff + inner_prod(&e[..frame], &e[..frame]);
        }
        sff
    }

    /// NLMS step of every background block against last frame's error.
    fn accumulate_gradient(&mut self) {
        let n = self.window_size;
        for mic in 0..self.mics {
            let err = &self.err_spectra[mic * n..(mic + 1) * n];
            for speaker in 0..self.speakers {
                for j in (0..self.blocks).rev() {
                    // The error spectrum lags the far-end history by one frame.
                    let far = self.far_block(j + 1, speaker);
                    weighted_spectral_mul_conj(
                        &self.power_1,
                        self.prop[j],
                        &self.far_spectra[far..far + n],
                        err,
                        &mut self.phi,
                    );
                    let start = self.weight_block(mic, speaker, j);
                    for (w, &g) in self.weights[start..start + n].iter_mut().zip(&self.phi) {
                        *w += g;
                    }
                }
            }
        }
    }

    /// Zeroes the wrapped half of block 0 every frame and of the other
    /// blocks in turn.
    fn constrain_weights(&mut self, fft: &mut dyn Transform) {
        let n = self.window_size;
        let frame = self.frame_size;
        let m = self.blocks as u64;
        for mic in 0..self.mics {
            for speaker in 0..self.speakers {
                for j in 0..self.blocks {
                    if j != 0 && self.cancel_count % (m - 1) != j as u64 - 1 {
                        continue;
                    }
                    let start = self.weight_block(mic, speaker, j);
                    let block = &mut self.weights[start..start + n];
                    fft.inverse(block, &mut self.wtmp);
                    self.wtmp[frame..].fill(0.0);
                    fft.forward(&self.wtmp, block);
                }
            }
        }
    }

    /// Background echo into `y`, background residual into `e[..frame]`.
    ///
    /// Returns the residual energy and the energy of the difference
    /// between the foreground and background echo estimates.
    fn background_residual(&mut self, fft: &mut dyn Transform) -> (T, T) {
        let n = self.window_size;
        let frame = self.frame_size;
        let filter_len = self.blocks * self.speakers * n;
        let ten = T::from_f32(10.0);
        let mut see = T::ZERO;
        let mut dbf = T::ZERO;
        for mic in 0..self.mics {
            let spectrum = &mut self.echo_spectra[mic * n..(mic + 1) * n];
            spectral_mul_accum(
                &self.far_spectra[..filter_len],
                &self.weights[mic * filter_len..(mic + 1) * filter_len],
                spectrum,
            );
            let y = &mut self.y[mic * n..(mic + 1) * n];
            fft.inverse(spectrum, y);
            let e = &mut self.e[mic * n..(mic + 1) * n];
            for i in 0..frame {
                e[i] = e[i + frame] - y[i + frame];
            }
            dbf = dbf + (ten + inner_prod(&e[..frame], &e[..frame]));
            let input = &self.input[mic * frame..(mic + 1) * frame];
            for i in 0..frame {
                e[i] = input[i] - y[i + frame];
            }
            see = see + inner_prod(&e[..frame], &e[..frame]);
        }
        (see, dbf)
    }

    /// Copies the background into the foreground and crossfades this
    /// frame's foreground echo toward the background one.
    fn promote_background(&mut self) {
        let n = self.window_size;
        let frame = self.frame_size;
        self.foreground.copy_from_slice(&self.weights);
        for mic in 0..self.mics {
            let e = &mut self.e[mic * n + frame..(mic + 1) * n];
            let y = &self.y[mic * n + frame..(mic + 1) * n];
            for i in 0..frame {
                e[i] = self.window[i + frame] * e[i] + self.window[i] * y[i];
            }
        }
    }

    /// Restores the background from the foreground and recomputes the
    /// background residual with the foreground echo.
    fn rollback_background(&mut self) {
        let n = self.window_size;
        let frame = self.frame_size;
        self.weights.copy_from_slice(&self.foreground);
        for mic in 0..self.mics {
            let e = &mut self.e[mic * n..(mic + 1) * n];
            let y = &mut self.y[mic * n..(mic + 1) * n];
            y[frame..].copy_from_slice(&e[frame..]);
            let input = &self.input[mic * frame..(mic + 1) * frame];
            for i in 0..frame {
                e[i] = input[i] - y[i + frame];
            }
        }
    }

    /// Writes the de-emphasized output and prepares the error and echo
    /// spectra for the next gradient step.
    ///
    /// Returns `(Sey, Syy, Sdd)`.
    fn synthesize_output(&mut self, fft: &mut dyn Transform, out: &mut [i16]) -> (T, T, T) {
        let n = self.window_size;
        let frame = self.frame_size;
        let c = self.mics;
        let preemph = self.tuning.preemphasis;
        self.rf.fill(T::ZERO);
        self.yf.fill(T::ZERO);
        let (mut sey, mut syy, mut sdd) = (T::ZERO, T::ZERO, T::ZERO);
        for mic in 0..c {
            let input = &self.input[mic * frame..(mic + 1) * frame];
            let e = &mut self.e[mic * n..(mic + 1) * n];
            let y = &mut self.y[mic * n..(mic + 1) * n];
            let echo = if self.two_path { &e[frame..] } else { &y[frame..] };
            let mem = &mut self.mem_e[mic];
            for (i, (&d, &echo)) in input.iter().zip(echo).enumerate() {
                let v = d - echo + preemph * *mem;
                out[i * c + mic] = T::from_f32(v).to_i16();
                *mem = v;
            }

            e.copy_within(..frame, frame);
            e[..frame].fill(0.0);
            sey = sey + inner_prod(&e[frame..], &y[frame..]);
            syy = syy + inner_prod(&y[frame..], &y[frame..]);
            sdd = sdd + inner_prod(input, input);

            let err_spectrum = &mut self.err_spectra[mic * n..(mic + 1) * n];
            fft.forward(e, err_spectrum);
            y[..frame].fill(0.0);
            let echo_spectrum = &mut self.echo_spectra[mic * n..(mic + 1) * n];
            fft.forward(y, echo_spectrum);
            power_spectrum_accum(err_spectrum, &mut self.rf);
            power_spectrum_accum(echo_spectrum, &mut self.yf);
        }
        (sey, syy, sdd)
    }

    /// Updates the far-end power, the leak estimate and the per-bin step
    /// size used by the next gradient step.
    fn update_step_size(&mut self, sxx: T, see: T, syy: T, sey: T) {
        let n = self.window_size;
        let window = T::from_f32(n as f32);
        let see = see.max(window * T::from_f32(100.0));

        self.xf.fill(T::ZERO);
        for speaker in 0..self.speakers {
            let start = self.far_block(0, speaker);
            power_spectrum_accum(&self.far_spectra[start..start + n], &mut self.xf);
        }
        let ss = T::from_f32(0.35 / self.blocks as f32);
        let ss_1 = T::ONE - ss;
        for (p, &xf) in self.power.iter_mut().zip(&self.xf) {
            *p = ss_1 * *p + T::ONE + ss * xf;
        }

        // Correlation of the frame-to-frame change of the residual and
        // echo spectra.
        let spec_average = self.spec_average;
        let spec_average_1 = T::ONE - spec_average;
        let mut pey = T::ONE;
        let mut pyy = T::ONE;
        for j in 0..=self.frame_size {
            let eh = self.rf[j] - self.eh[j];
            let yh = self.yf[j] - self.yh[j];
            pey = pey + eh * yh;
            pyy = pyy + yh * yh;
            self.eh[j] = spec_average_1 * self.eh[j] + spec_average * self.rf[j];
            self.yh[j] = spec_average_1 * self.yh[j] + spec_average * self.yf[j];
        }
        let pyy = pyy.sqrt();
        let pey = pey / pyy;

        let alpha = (self.beta0 * syy).min(self.beta_max * see) / see;
        let alpha_1 = T::ONE - alpha;
        self.pey = alpha_1 * self.pey + alpha * pey;
        self.pyy = alpha_1 * self.pyy + alpha * pyy;
        self.pyy = self.pyy.max(T::ONE);
        self.pey = self
            .pey
            .max(T::from_f32(self.tuning.min_leak) * self.pyy)
            .min(self.pyy);
        self.leak_estimate = self.pey / self.pyy;
        let leak = self.leak_estimate;

        // Residual to echo ratio.
        let rer = (T::from_f32(0.0001) * sxx + T::from_f32(3.0) * leak * syy) / see;
        let rer = rer
            .max(sey * sey / (T::ONE + see * syy))
            .min(T::from_f32(0.5));

        if !self.adapted
            && self.sum_adapt > T::from_i32(self.blocks as i32)
            && leak * syy > T::from_f32(0.03) * syy
        {
            self.adapted = true;
            tracing::debug!(frames = self.cancel_count, "filter adapted");
        }

        let floor = T::from_f32(MIN_POWER_1);
        let ten = T::from_f32(10.0);
        if self.adapted {
            let half = T::from_f32(0.5);
            for ((p1, &yf), (&rf, &power)) in self
                .power_1
                .iter_mut()
                .zip(&self.yf)
                .zip(self.rf.iter().zip(&self.power))
            {
                let e = rf + T::ONE;
                let r = (leak * yf).min(half * e);
                let r = T::from_f32(0.7) * r + T::from_f32(0.3) * rer * e;
                *p1 = (r / (e * (power + ten))).max(floor);
            }
        } else {
            let adapt_rate = if sxx > window * T::from_f32(1000.0) {
                let quarter = T::from_f32(0.25);
                (quarter * sxx).min(quarter * see) / see
            } else {
                T::ZERO
            };
            for (p1, &power) in self.power_1.iter_mut().zip(&self.power) {
                *p1 = (adapt_rate / (power + ten)).max(floor);
            }
            self.sum_adapt = self.sum_adapt + adapt_rate;
        }
    }

    /// Keeps the echo removed from mic 0 for the residual echo estimate.
    fn remember_echo(&mut self, near: &[i16], out: &[i16]) {
        let frame = self.frame_size;
        self.last_y.copy_within(frame.., 0);
        if self.adapted {
            let c = self.mics;
            for (i, ly) in self.last_y[frame..].iter_mut().enumerate() {
                *ly = f32::from(near[i * c]) - f32::from(out[i * c]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use quell_fft::RealFft;

    use super::*;
    use crate::config::MdfConfig;
    use crate::filters::{DcNotch, notch_radius};
    use crate::testing::{EchoPath, Noise, Scene, energy, mean, to_i16};

    /// Near-end noise level that keeps the leak estimate off its floor.
    const TALK: f32 = 300.0;
    const ROOM: [(usize, f32); 2] = [(20, 0.5), (45, -0.2)];

    fn engine(config: &MdfConfig) -> (EchoState<f32>, RealFft) {
        (
            EchoState::new(config),
            RealFft::new(config.window_size()).unwrap(),
        )
    }

    /// Runs `frames` frames of noise through a single-tap echo path.
    fn warm_up(state: &mut EchoState<f32>, fft: &mut RealFft, noise: &mut Noise, frames: usize) {
        let mut path = EchoPath::new(&[(5, 0.5)]);
        let mut out = vec![0; state.frame_size];
        for _ in 0..frames {
            let far = noise.frame(state.frame_size, 3000.0);
            let near = to_i16(&path.process(&far));
            assert_eq!(
                state.process_frame(fft, &near, &far, &mut out),
                FrameOutcome::Cancelled
            );
        }
    }

    fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
    }

    /// `|a - b| / |b|` over whole filters.
    fn relative_change(a: &[f32], b: &[f32]) -> f32 {
        let diff: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
        let norm: f32 = b.iter().map(|y| y * y).sum();
        (diff / norm).sqrt()
    }

    /// Per-frame near-end and output energies over `frames` frames.
    fn run_scene(
        state: &mut EchoState<f32>,
        fft: &mut RealFft,
        scene: &mut Scene,
        frames: usize,
        talk: f32,
    ) -> (Vec<f64>, Vec<f64>) {
        let mut out = vec![0; state.frame_size];
        let mut near_energy = Vec::with_capacity(frames);
        let mut out_energy = Vec::with_capacity(frames);
        for _ in 0..frames {
            let (near, far) = scene.frame(state.frame_size, talk);
            assert_eq!(
                state.process_frame(fft, &near, &far, &mut out),
                FrameOutcome::Cancelled
            );
            near_energy.push(energy(&near));
            out_energy.push(energy(&out));
        }
        (near_energy, out_energy)
    }

    /// Converges on [`ROOM`] and returns the residual energy floor.
    fn converged(state: &mut EchoState<f32>, fft: &mut RealFft, scene: &mut Scene) -> f64 {
        let (echo, residual) = run_scene(state, fft, scene, 300, TALK);
        let floor = mean(&residual[250..]);
        assert!(floor < 0.1 * mean(&echo[250..]), "{floor}");
        assert!(state.adapted);
        floor
    }

    #[test]
    fn silent_far_end_passes_the_notched_near_end() {
        let config = MdfConfig::new(64, 256);
        let (mut state, mut fft) = engine(&config);
        let mut reference = DcNotch::default();
        let radius = notch_radius(config.sample_rate);
        let mut noise = Noise::new(7);
        let far = vec![0; 64];
        let mut out = vec![0; 64];
        let mut expected = vec![0.0; 64];
        for _ in 0..20 {
            let near = noise.frame(64, 8000.0);
            let outcome = state.process_frame(&mut fft, &near, &far, &mut out);
            assert_eq!(outcome, FrameOutcome::Cancelled);
            reference.process(&near, 1, radius, &mut expected);
            for (&got, &want) in out.iter().zip(&expected) {
                let want = want.to_i16();
                assert!((i32::from(got) - i32::from(want)).abs() <= 1, "{got} vs {want}");
            }
        }
    }

    #[test]
    fn saturated_frame_freezes_the_background_filter() {
        let config = MdfConfig {
            two_path: false,
            ..MdfConfig::new(64, 64)
        };
        let (mut state, mut fft) = engine(&config);
        let mut noise = Noise::new(11);
        warm_up(&mut state, &mut fft, &mut noise, 10);

        let far = noise.frame(64, 3000.0);
        let mut near = noise.frame(64, 1000.0);
        let mut out = vec![0; 64];

        let mut unclipped = state.clone();
        unclipped.process_frame(&mut fft, &near, &far, &mut out);

        near[5] = 32_000;
        let before = state.weights.clone();
        state.process_frame(&mut fft, &near, &far, &mut out);
        assert_eq!(state.saturated, 1);

        let scale = before.iter().fold(0.0f32, |m, w| m.max(w.abs()));
        let tolerance = 1e-4 * scale;
        assert!(max_abs_diff(&before, &state.weights) <= tolerance);
        assert!(max_abs_diff(&before, &unclipped.weights) > 10.0 * tolerance);
    }

    #[test]
    fn saturation_suspends_adaptation_for_one_more_frame() {
        let config = MdfConfig::new(64, 128);
        let (mut state, mut fft) = engine(&config);
        let mut out = vec![0; 64];
        let mut near = vec![0; 64];
        near[0] = -32_000;
        state.process_frame(&mut fft, &near, &[0; 64], &mut out);
        assert_eq!(state.saturated, 1);
        state.process_frame(&mut fft, &[0; 64], &[0; 64], &mut out);
        assert_eq!(state.saturated, 0);
    }

    #[test]
    fn reset_restores_the_construction_state() {
        let config = MdfConfig::new(64, 256);
        let (mut state, mut fft) = engine(&config);
        let mut noise = Noise::new(3);
        warm_up(&mut state, &mut fft, &mut noise, 30);
        assert_ne!(state, EchoState::new(&config));

        state.reset();
        assert_eq!(state, EchoState::new(&config));
        state.reset();
        assert_eq!(state, EchoState::new(&config));
    }

    #[test]
    fn rate_constants_follow_the_sampling_rate() {
        let (mut state, _) = engine(&MdfConfig::new(160, 1600));
        for (rate, radius) in [(8000, 0.9), (16_000, 0.982), (48_000, 0.992)] {
            state.set_sampling_rate(rate);
            assert_eq!(state.notch_radius, radius);
            assert_eq!(state.spec_average, 160.0 / rate as f32);
            assert_eq!(state.beta0, 320.0 / rate as f32);
            assert_eq!(state.beta_max, 160.0 / (2 * rate) as f32);
        }
    }

    #[test]
    fn corrupt_frame_silences_the_output_and_resets() {
        let config = MdfConfig::new(64, 256);
        let (mut state, mut fft) = engine(&config);
        state.foreground.fill(1e12);
        let mut noise = Noise::new(5);
        let far = noise.frame(64, 3000.0);
        let near = noise.frame(64, 3000.0);
        let mut out = vec![1; 64];
        let outcome = state.process_frame(&mut fft, &near, &far, &mut out);
        assert_eq!(outcome, FrameOutcome::Reset);
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(state, EchoState::new(&config));
    }

    #[test]
    fn sustained_suspicion_resets_on_the_threshold_frame() {
        let config = MdfConfig {
            two_path: false,
            ..MdfConfig::new(64, 64)
        };
        let (mut state, mut fft) = engine(&config);
        // An identity echo path on a silent near end makes the residual
        // carry the whole far end.
        for (i, w) in state.weights.iter_mut().enumerate() {
            *w = if i != 0 && i % 2 == 0 { 0.0 } else { 1.0 };
        }
        state.saturated = 1000;

        let mut noise = Noise::new(13);
        let near = vec![0; 64];
        let mut out = vec![0; 64];
        for frame in 1..=50 {
            let far = noise.frame(64, 3000.0);
            let outcome = state.process_frame(&mut fft, &near, &far, &mut out);
            if frame < 50 {
                assert_eq!(outcome, FrameOutcome::Cancelled, "frame {frame}");
                assert_eq!(state.watchdog.count(), frame);
                assert!(out.iter().any(|&s| s != 0));
            } else {
                assert_eq!(outcome, FrameOutcome::Reset);
                assert!(out.iter().all(|&s| s == 0));
            }
        }
        assert_eq!(state, EchoState::new(&config));
    }

    #[test]
    fn step_size_stays_positive() {
        let config = MdfConfig::new(64, 256);
        let (mut state, mut fft) = engine(&config);
        let mut noise = Noise::new(17);
        warm_up(&mut state, &mut fft, &mut noise, 40);
        assert!(state.power_1.iter().all(|&p| p > 0.0));
        let leak = state.leak_estimate;
        assert!((0.0..=1.0).contains(&leak));
    }

    #[test]
    fn diverged_background_is_rolled_back() {
        let config = MdfConfig::new(128, 512);
        let (mut state, mut fft) = engine(&config);
        let mut scene = Scene::new(&ROOM);
        let floor = converged(&mut state, &mut fft, &mut scene);

        // A background predicting the inverted echo is far worse than the
        // foreground.
        let foreground = state.foreground.clone();
        for (w, &f) in state.weights.iter_mut().zip(&foreground) {
            *w = -f;
        }
        let (near, far) = scene.frame(128, TALK);
        let mut out = vec![0; 128];
        assert_eq!(
            state.process_frame(&mut fft, &near, &far, &mut out),
            FrameOutcome::Cancelled
        );
        assert_eq!(state.foreground, foreground);
        assert_eq!(state.weights, foreground);
        assert!(energy(&out) < 3.0 * floor, "{} vs {floor}", energy(&out));
    }

    #[test]
    fn double_talk_leaves_the_foreground_intact() {
        let config = MdfConfig::new(128, 512);
        let (mut state, mut fft) = engine(&config);
        let mut scene = Scene::new(&ROOM);
        converged(&mut state, &mut fft, &mut scene);
        let foreground = state.foreground.clone();

        run_scene(&mut state, &mut fft, &mut scene, 20, 6000.0);
        let drift = relative_change(&state.foreground, &foreground);
        assert!(drift < 0.25, "foreground drifted by {drift}");

        let (echo, residual) = run_scene(&mut state, &mut fft, &mut scene, 20, TALK);
        assert!(mean(&residual) < 0.1 * mean(&echo));
        assert_eq!(state.watchdog.count(), 0);
    }

    #[test]
    fn changed_echo_path_is_promoted_and_reconverges() {
        let config = MdfConfig::new(128, 512);
        let (mut state, mut fft) = engine(&config);
        let mut scene = Scene::new(&ROOM);
        converged(&mut state, &mut fft, &mut scene);
        let foreground = state.foreground.clone();

        // A new dominant reflection. The stale foreground still removes
        // part of the echo, so the watchdog stays quiet.
        let mut changed = ROOM.to_vec();
        changed.push((30, 0.8));
        scene.path = EchoPath::new(&changed);
        let (echo, residual) = run_scene(&mut state, &mut fft, &mut scene, 400, TALK);
        assert!(mean(&residual[350..]) < 0.1 * mean(&echo[350..]));
        assert!(relative_change(&state.foreground, &foreground) > 0.5);

        let mut taps = vec![0; state.blocks * state.frame_size];
        state.impulse_response(&mut fft, 0, 0, &mut taps);
        let peak = taps
            .iter()
            .enumerate()
            .max_by_key(|&(_, t)| t.abs())
            .map(|(i, _)| i);
        assert_eq!(peak, Some(30));
    }
}
