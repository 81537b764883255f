//! The canceller handle.

use derive_more::Debug;
use quell_fft::{RealFft, Transform};

use crate::config::MdfConfig;
use crate::echo_state::EchoState;
use crate::error::ConfigError;
use crate::pipeline::FrameOutcome;
use crate::playback::PlaybackBuffer;
use crate::scalar::Scalar;
use crate::stats::EchoStats;

/// Acoustic echo canceller over interleaved `i16` frames.
///
/// Use [`cancel`](Self::cancel) when near-end and far-end frames arrive
/// together, or [`playback`](Self::playback) and [`capture`](Self::capture)
/// when they arrive on separate schedules. The canceller owns no locks;
/// callers on different threads must serialize access.
#[derive(Debug)]
pub struct MdfCanceller<T: Scalar = f32> {
    pub(crate) config: MdfConfig,
    pub(crate) state: EchoState<T>,
    #[debug(skip)]
    pub(crate) transform: Box<dyn Transform>,
    pub(crate) playback: PlaybackBuffer,
    /// Set by the first processed frame.
    pub(crate) started: bool,
    pub(crate) frames_processed: u64,
    pub(crate) frames_passed_through: u64,
    pub(crate) divergence_resets: u64,
}

impl<T: Scalar> MdfCanceller<T> {
    /// Creates a canceller using [`RealFft`].
    pub fn new(config: MdfConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transform = RealFft::new(config.window_size())?;
        Self::with_transform(config, Box::new(transform))
    }

    /// Creates a canceller on a caller-supplied transform of
    /// `2 * frame_size` samples.
    pub fn with_transform(
        config: MdfConfig,
        transform: Box<dyn Transform>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if transform.len() != config.window_size() {
            return Err(ConfigError::TransformSizeMismatch {
                expected: config.window_size(),
                actual: transform.len(),
            });
        }
        tracing::debug!(
            frame_size = config.frame_size,
            filter_length = config.filter_length,
            blocks = config.num_blocks(),
            mics = config.num_mics,
            speakers = config.num_speakers,
            sample_rate = config.sample_rate,
            "creating echo canceller"
        );
        Ok(Self {
            state: EchoState::new(&config),
            transform,
            playback: PlaybackBuffer::new(
                config.frame_size * config.num_speakers,
                config.playback_delay_frames,
            ),
            config,
            started: false,
            frames_processed: 0,
            frames_passed_through: 0,
            divergence_resets: 0,
        })
    }

    pub fn config(&self) -> &MdfConfig {
        &self.config
    }

    /// Cancels the echo of `far` from `near` into `out`.
    ///
    /// `near` and `out` hold `frame_size * num_mics` interleaved samples,
    /// `far` holds `frame_size * num_speakers`.
    ///
    /// # Panics
    ///
    /// If a buffer has the wrong length.
    pub fn cancel(&mut self, near: &[i16], far: &[i16], out: &mut [i16]) -> FrameOutcome {
        self.started = true;
        let outcome = self
            .state
            .process_frame(self.transform.as_mut(), near, far, out);
        if outcome == FrameOutcome::Reset {
            self.playback.reset();
        }
        self.record(outcome);
        outcome
    }

    /// Cancels `near` against the oldest buffered far-end frame.
    ///
    /// Passes `near` through unchanged when no far-end frame is buffered.
    pub fn capture(&mut self, near: &[i16], out: &mut [i16]) -> FrameOutcome {
        self.started = true;
        self.playback.start();
        let outcome = match self.playback.front() {
            Some(far) => self
                .state
                .process_frame(self.transform.as_mut(), near, far, out),
            None => {
                assert_eq!(near.len(), self.state.frame_size * self.state.mics);
                assert_eq!(out.len(), near.len());
                self.playback.underrun();
                out.copy_from_slice(near);
                FrameOutcome::PassThrough
            }
        };
        match outcome {
            FrameOutcome::Cancelled => self.playback.pop(),
            FrameOutcome::Reset => self.playback.reset(),
            FrameOutcome::PassThrough => {}
        }
        self.record(outcome);
        outcome
    }

    /// Queues a far-end frame of `frame_size * num_speakers` interleaved
    /// samples for a later [`capture`](Self::capture).
    ///
    /// Frames submitted before the first capture, or while the buffer is
    /// full, are dropped with a warning.
    pub fn playback(&mut self, far: &[i16]) {
        self.playback.push(far);
    }

    /// Returns the canceller to its post-construction state.
    pub fn reset(&mut self) {
        self.state.reset();
        self.playback.reset();
        self.started = false;
    }

    /// Power spectrum of the echo expected to remain in the last output,
    /// `frame_size + 1` bins, for a downstream residual echo suppressor.
    pub fn residual_echo(&mut self, out: &mut [f32]) {
        self.state.residual_echo(self.transform.as_mut(), out);
    }

    pub fn stats(&self) -> EchoStats {
        EchoStats {
            frames_processed: self.frames_processed,
            frames_passed_through: self.frames_passed_through,
            frames_since_reset: self.state.cancel_count,
            adapted: self.state.adapted,
            leak_estimate: self.state.leak_estimate.to_f32(),
            sum_adapt: self.state.sum_adapt.to_f32(),
            saturated: self.state.saturated,
            anomalies: self.state.watchdog.count(),
            divergence_resets: self.divergence_resets,
            playback_buffered: self.playback.len(),
            playback_underruns: self.playback.underruns,
            playback_overruns: self.playback.overruns,
            playback_discarded: self.playback.discarded,
            playback_autofills: self.playback.autofills,
        }
    }

    fn record(&mut self, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::Cancelled => self.frames_processed += 1,
            FrameOutcome::PassThrough => self.frames_passed_through += 1,
            FrameOutcome::Reset => {
                self.frames_processed += 1;
                self.divergence_resets += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pseudo_float::PseudoFloat;
    use crate::testing::{EchoPath, Noise, Scene, energy, to_i16};

    const TAPS: [(usize, f32); 3] = [(20, 0.5), (45, -0.2), (90, 0.1)];
    /// Near-end noise level. A perfectly silent near end pins the leak
    /// estimate to its floor and the filter never leaves ramp-up.
    const TALK: f32 = 300.0;

    fn narrowband() -> MdfConfig {
        MdfConfig {
            sample_rate: 8000,
            ..MdfConfig::new(128, 512)
        }
    }

    /// Per-frame near-end and residual energies of a noise far end played
    /// through [`TAPS`], with near-end noise of amplitude `talk`.
    fn run_echo<T: Scalar>(
        aec: &mut MdfCanceller<T>,
        frames: usize,
        talk: f32,
    ) -> (Vec<f64>, Vec<f64>) {
        let mut scene = Scene::new(&TAPS);
        let mut out = vec![0; 128];
        let mut echo = Vec::with_capacity(frames);
        let mut residual = Vec::with_capacity(frames);
        for _ in 0..frames {
            let (near, far) = scene.frame(128, talk);
            assert_eq!(aec.cancel(&near, &far, &mut out), FrameOutcome::Cancelled);
            echo.push(energy(&near));
            residual.push(energy(&out));
        }
        (echo, residual)
    }

    fn tail_ratio(echo: &[f64], residual: &[f64], frames: usize) -> f64 {
        let start = echo.len() - frames;
        residual[start..].iter().sum::<f64>() / echo[start..].iter().sum::<f64>()
    }

    fn argmax_abs(taps: &[i32]) -> usize {
        taps.iter()
            .enumerate()
            .max_by_key(|&(_, t)| t.abs())
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn converges_on_a_linear_echo_path() {
        let mut aec = MdfCanceller::<f32>::new(narrowband()).unwrap();
        let (echo, residual) = run_echo(&mut aec, 400, 0.0);
        assert!(tail_ratio(&echo, &residual, 50) < 0.1);

        // Windows of 40 frames, well over twice the block count.
        let window = 40;
        let mean_echo = echo.iter().sum::<f64>() / echo.len() as f64;
        let averages: Vec<f64> = residual
            .chunks(window)
            .map(|c| c.iter().sum::<f64>() / c.len() as f64)
            .collect();
        for pair in averages.windows(2) {
            assert!(
                pair[1] <= 1.2 * pair[0] + 0.01 * mean_echo,
                "residual grew: {averages:?}"
            );
        }

        let stats = aec.stats();
        assert_eq!(stats.frames_processed, 400);
        assert_eq!(stats.divergence_resets, 0);
    }

    #[test]
    fn leaves_ramp_up_with_near_end_noise() {
        let mut aec = MdfCanceller::<f32>::new(narrowband()).unwrap();
        let (echo, residual) = run_echo(&mut aec, 400, TALK);
        // The residual settles at the near-end noise.
        assert!(tail_ratio(&echo, &residual, 50) < 0.1);
        let stats = aec.stats();
        assert!(stats.adapted);
        assert!((0.0..=1.0).contains(&stats.leak_estimate));
        assert_eq!(stats.divergence_resets, 0);
        // Steady state redistributes the step across blocks, raising the
        // total share from 0.8 toward 0.99.
        let share: f32 = aec.state.prop.iter().sum();
        assert!(share > 0.85, "{share}");
        assert!(aec.state.prop[0] > aec.state.prop[3]);
    }

    #[test]
    fn learned_impulse_response_peaks_at_the_echo_delay() {
        let mut aec = MdfCanceller::<f32>::new(narrowband()).unwrap();
        run_echo(&mut aec, 400, 0.0);
        let mut taps = vec![0; aec.impulse_response_len()];
        aec.impulse_response(&mut taps);
        assert_eq!(taps.len(), 512);
        assert_eq!(argmax_abs(&taps), 20);
        assert!((10_000..23_000).contains(&taps[20]), "{}", taps[20]);
    }

    #[test]
    fn pseudo_float_arithmetic_converges() {
        let mut aec = MdfCanceller::<PseudoFloat>::new(narrowband()).unwrap();
        let (echo, residual) = run_echo(&mut aec, 400, 0.0);
        assert!(tail_ratio(&echo, &residual, 50) < 0.2);
        let mut taps = vec![0; aec.impulse_response_len()];
        aec.impulse_response(&mut taps);
        assert_eq!(argmax_abs(&taps), 20);
    }

    #[test]
    fn cancels_each_mic_against_every_speaker() {
        let config = MdfConfig {
            num_mics: 2,
            num_speakers: 2,
            ..narrowband()
        };
        let mut aec = MdfCanceller::<f32>::new(config).unwrap();
        let mut noise = [Noise::new(1), Noise::new(2)];
        // paths[mic][speaker]
        let mut paths = [
            [EchoPath::new(&[(20, 0.5)]), EchoPath::new(&[(60, 0.3)])],
            [EchoPath::new(&[(70, 0.2)]), EchoPath::new(&[(15, 0.4)])],
        ];
        let mut far = vec![0; 256];
        let mut near = vec![0; 256];
        let mut out = vec![0; 256];
        let (mut echo, mut residual) = (0.0, 0.0);
        for frame in 0..600 {
            let speakers = [noise[0].frame(128, 3000.0), noise[1].frame(128, 3000.0)];
            for (mic, mic_paths) in paths.iter_mut().enumerate() {
                let a = mic_paths[0].process(&speakers[0]);
                let b = mic_paths[1].process(&speakers[1]);
                let mixed: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
                for (i, s) in to_i16(&mixed).into_iter().enumerate() {
                    near[2 * i + mic] = s;
                }
            }
            for i in 0..128 {
                far[2 * i] = speakers[0][i];
                far[2 * i + 1] = speakers[1][i];
            }
            assert_eq!(aec.cancel(&near, &far, &mut out), FrameOutcome::Cancelled);
            if frame >= 550 {
                echo += energy(&near);
                residual += energy(&out);
            }
        }
        assert!(residual < 0.25 * echo, "{residual} vs {echo}");

        let mut taps = vec![0; aec.impulse_response_len()];
        aec.impulse_response_for(0, 0, &mut taps);
        assert_eq!(argmax_abs(&taps), 20);
        aec.impulse_response_for(1, 1, &mut taps);
        assert_eq!(argmax_abs(&taps), 15);
    }

    #[test]
    fn capture_aligns_against_delayed_playback() {
        let mut aec = MdfCanceller::<f32>::new(narrowband()).unwrap();
        let delay = aec.config().playback_delay_frames;
        let mut noise = Noise::new(9);
        let mut path = EchoPath::new(&TAPS);
        let mut played: Vec<Vec<i16>> = Vec::new();
        let mut out = vec![0; 128];
        let (mut echo, mut residual) = (0.0, 0.0);
        for frame in 0..400 {
            // The loudspeaker emits what was queued `delay` captures ago.
            let audible = if frame >= delay {
                played[frame - delay].clone()
            } else {
                vec![0; 128]
            };
            let near = to_i16(&path.process(&audible));
            assert_eq!(aec.capture(&near, &mut out), FrameOutcome::Cancelled);
            let far = noise.frame(128, 3000.0);
            aec.playback(&far);
            played.push(far);
            if frame >= 350 {
                echo += energy(&near);
                residual += energy(&out);
            }
        }
        assert!(residual < 0.1 * echo, "{residual} vs {echo}");
        let stats = aec.stats();
        assert_eq!(stats.playback_underruns, 0);
        assert_eq!(stats.playback_overruns, 0);
        assert_eq!(stats.playback_discarded, 0);
        assert_eq!(stats.playback_buffered, delay);
    }

    #[test]
    fn capture_without_playback_passes_through() {
        let mut aec = MdfCanceller::<f32>::new(MdfConfig::new(64, 256)).unwrap();
        let near = Noise::new(4).frame(64, 1000.0);
        let mut out = vec![0; 64];
        // The primed silence is consumed first.
        for _ in 0..2 {
            assert_eq!(aec.capture(&near, &mut out), FrameOutcome::Cancelled);
        }
        assert_eq!(aec.capture(&near, &mut out), FrameOutcome::PassThrough);
        assert_eq!(out, near);
        let stats = aec.stats();
        assert_eq!(stats.playback_underruns, 1);
        assert_eq!(stats.frames_passed_through, 1);
        assert_eq!(stats.frames_processed, 2);
    }

    #[test]
    fn playback_before_the_first_capture_is_dropped() {
        let mut aec = MdfCanceller::<f32>::new(MdfConfig::new(64, 256)).unwrap();
        aec.playback(&[1; 64]);
        assert_eq!(aec.stats().playback_discarded, 1);
        assert_eq!(aec.stats().playback_buffered, 2);
    }

    #[test]
    fn divergence_reset_is_counted() {
        let mut aec = MdfCanceller::<f32>::new(MdfConfig::new(64, 64)).unwrap();
        // A full-scale alternating far end exceeds any plausible energy.
        let far: Vec<i16> = (0..64)
            .map(|i| if i % 2 == 0 { i16::MAX } else { -i16::MAX })
            .collect();
        let mut out = vec![0; 64];
        assert_eq!(aec.cancel(&[0; 64], &far, &mut out), FrameOutcome::Reset);
        let stats = aec.stats();
        assert_eq!(stats.divergence_resets, 1);
        assert_eq!(stats.frames_since_reset, 0);
        assert_eq!(stats.frames_processed, 1);
    }

    #[test]
    fn residual_echo_tracks_the_removed_echo() {
        let mut aec = MdfCanceller::<f32>::new(narrowband()).unwrap();
        let mut spectrum = vec![1.0; 129];
        aec.residual_echo(&mut spectrum);
        assert!(spectrum.iter().all(|&v| v == 0.0));

        run_echo(&mut aec, 200, TALK);
        assert!(aec.stats().adapted);
        aec.residual_echo(&mut spectrum);
        assert!(spectrum.iter().all(|&v| v.is_finite() && v >= 0.0));
        assert!(spectrum.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn reset_returns_to_a_fresh_canceller() {
        let mut aec = MdfCanceller::<f32>::new(narrowband()).unwrap();
        run_echo(&mut aec, 50, TALK);
        aec.reset();
        let fresh = MdfCanceller::<f32>::new(narrowband()).unwrap();
        assert_eq!(aec.state, fresh.state);
        assert_eq!(aec.stats().frames_since_reset, 0);
        assert_eq!(aec.stats().frames_processed, 50);
    }
}
