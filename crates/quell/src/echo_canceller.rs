//! [`EchoCanceller`], the frame-based echo cancellation API, and
//! [`EchoCancellerBuilder`] for constructing configured instances.

use std::error;
use std::fmt;

use quell_mdf::{ConfigError, FrameOutcome, MdfCanceller, Scalar};

use crate::config::{Config, MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ};
use crate::convert::{deinterleave_to_float, interleave_to_s16};
use crate::stats::{ErleMeter, Stats};

/// Errors returned by the echo canceller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Sample rate outside `8_000..=384_000` Hz.
    BadSampleRate,
    /// Zero channels, or a frame with a different channel count than
    /// configured.
    BadNumberChannels,
    /// A buffer does not hold exactly one frame.
    BadFrameLength { expected: usize, actual: usize },
    /// The derived engine configuration was rejected.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSampleRate => write!(
                f,
                "bad sample rate; expected {MIN_SAMPLE_RATE_HZ}..={MAX_SAMPLE_RATE_HZ} Hz"
            ),
            Self::BadNumberChannels => write!(f, "bad number of channels"),
            Self::BadFrameLength { expected, actual } => {
                write!(f, "bad frame length {actual}, expected {expected}")
            }
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

fn check_len(actual: usize, expected: usize) -> Result<(), Error> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::BadFrameLength { expected, actual })
    }
}

/// Builder for constructing an [`EchoCanceller`].
///
/// # Example
///
/// ```
/// use quell::{Config, EchoCanceller, PseudoFloat};
///
/// let config = Config {
///     sample_rate_hz: 8_000,
///     ..Default::default()
/// };
/// let aec = EchoCanceller::builder().config(config).build().unwrap();
/// assert_eq!(aec.frame_size(), 160);
///
/// // Integer-only arithmetic for cores without an FPU.
/// let fixed = EchoCanceller::builder()
///     .config(config)
///     .build_with_scalar::<PseudoFloat>()
///     .unwrap();
/// assert_eq!(fixed.frame_size(), 160);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EchoCancellerBuilder {
    config: Config,
}

impl EchoCancellerBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Build an [`EchoCanceller`] on `f32` arithmetic.
    pub fn build(self) -> Result<EchoCanceller, Error> {
        self.build_with_scalar()
    }

    /// Build an [`EchoCanceller`] on the numeric backend `T`.
    pub fn build_with_scalar<T: Scalar>(self) -> Result<EchoCanceller<T>, Error> {
        let config = self.config;
        if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&config.sample_rate_hz) {
            return Err(Error::BadSampleRate);
        }
        if config.capture_channels == 0 || config.render_channels == 0 {
            return Err(Error::BadNumberChannels);
        }
        let inner = MdfCanceller::new(config.to_mdf())?;
        tracing::debug!(
            sample_rate_hz = config.sample_rate_hz,
            frame_ms = config.frame_ms,
            tail_ms = config.tail_ms,
            "built echo canceller"
        );
        let frame = config.frame_size();
        Ok(EchoCanceller {
            capture: vec![0; frame * usize::from(config.capture_channels)],
            render: vec![0; frame * usize::from(config.render_channels)],
            output: vec![0; frame * usize::from(config.capture_channels)],
            config,
            frame_size: frame,
            inner,
            erle: ErleMeter::default(),
        })
    }
}

/// Frame-based acoustic echo canceller.
///
/// # Usage
///
/// 1. Create an instance via [`EchoCanceller::builder()`].
/// 2. For each frame of [`frame_size()`](Self::frame_size) samples per
///    channel:
///    - Call [`process_render_i16()`](Self::process_render_i16) with the
///      audio sent to the loudspeakers.
///    - Call [`process_capture_i16()`](Self::process_capture_i16) with the
///      microphone audio.
///
///    Or call [`process_i16()`](Self::process_i16) with both when they are
///    already aligned.
///
/// Both `i16` (interleaved) and `f32` (deinterleaved, `[-1, 1]`) interfaces
/// are provided.
#[derive(Debug)]
pub struct EchoCanceller<T: Scalar = f32> {
    config: Config,
    frame_size: usize,
    inner: MdfCanceller<T>,
    capture: Vec<i16>,
    render: Vec<i16>,
    output: Vec<i16>,
    erle: ErleMeter,
}

impl EchoCanceller {
    /// Returns a builder for constructing an instance.
    pub fn builder() -> EchoCancellerBuilder {
        EchoCancellerBuilder::default()
    }
}

impl<T: Scalar> EchoCanceller<T> {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Samples per channel in one frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn capture_len(&self) -> usize {
        self.frame_size * usize::from(self.config.capture_channels)
    }

    fn render_len(&self) -> usize {
        self.frame_size * usize::from(self.config.render_channels)
    }

    // ─── Int16 (interleaved) processing ──────────────────────────

    /// Queues one interleaved loudspeaker frame.
    ///
    /// Frames submitted before the first capture are dropped.
    pub fn process_render_i16(&mut self, src: &[i16]) -> Result<(), Error> {
        check_len(src.len(), self.render_len())?;
        self.inner.playback(src);
        Ok(())
    }

    /// Cancels the echo from one interleaved microphone frame, against the
    /// render frame queued `playback_delay_frames` captures ago.
    pub fn process_capture_i16(
        &mut self,
        src: &[i16],
        dest: &mut [i16],
    ) -> Result<FrameOutcome, Error> {
        check_len(src.len(), self.capture_len())?;
        check_len(dest.len(), self.capture_len())?;
        let outcome = self.inner.capture(src, dest);
        self.erle.observe(outcome, src, dest);
        Ok(outcome)
    }

    /// Cancels the echo of an already aligned render frame from a capture
    /// frame.
    pub fn process_i16(
        &mut self,
        capture: &[i16],
        render: &[i16],
        dest: &mut [i16],
    ) -> Result<FrameOutcome, Error> {
        check_len(capture.len(), self.capture_len())?;
        check_len(render.len(), self.render_len())?;
        check_len(dest.len(), self.capture_len())?;
        let outcome = self.inner.cancel(capture, render, dest);
        self.erle.observe(outcome, capture, dest);
        Ok(outcome)
    }

    // ─── Float (deinterleaved) processing ────────────────────────

    /// Queues one loudspeaker frame given as one slice per channel.
    pub fn process_render_f32(&mut self, src: &[&[f32]]) -> Result<(), Error> {
        self.check_channels(src.len(), self.config.render_channels)?;
        for channel in src {
            check_len(channel.len(), self.frame_size)?;
        }
        interleave_to_s16(src, &mut self.render);
        self.inner.playback(&self.render);
        Ok(())
    }

    /// Cancels the echo from one microphone frame given as one slice per
    /// channel.
    pub fn process_capture_f32(
        &mut self,
        src: &[&[f32]],
        dest: &mut [&mut [f32]],
    ) -> Result<FrameOutcome, Error> {
        self.check_channels(src.len(), self.config.capture_channels)?;
        self.check_channels(dest.len(), self.config.capture_channels)?;
        for channel in src {
            check_len(channel.len(), self.frame_size)?;
        }
        for channel in dest.iter() {
            check_len(channel.len(), self.frame_size)?;
        }
        interleave_to_s16(src, &mut self.capture);
        let outcome = self.inner.capture(&self.capture, &mut self.output);
        self.erle.observe(outcome, &self.capture, &self.output);
        deinterleave_to_float(&self.output, dest);
        Ok(outcome)
    }

    fn check_channels(&self, actual: usize, expected: u16) -> Result<(), Error> {
        if actual == usize::from(expected) {
            Ok(())
        } else {
            Err(Error::BadNumberChannels)
        }
    }

    // ─── Control and diagnostics ─────────────────────────────────

    /// Forgets the learned echo path and re-primes the render buffer.
    pub fn reset(&mut self) {
        self.inner.reset();
        self.erle.clear();
    }

    /// Power spectrum of the echo expected to remain in the last capture
    /// output, `frame_size + 1` bins, for a downstream suppressor.
    pub fn residual_echo(&mut self, out: &mut [f32]) -> Result<(), Error> {
        check_len(out.len(), self.frame_size + 1)?;
        self.inner.residual_echo(out);
        Ok(())
    }

    /// Learned echo path from render channel `render` to capture channel
    /// `capture`, in Q15.
    pub fn impulse_response(&mut self, capture: usize, render: usize) -> Result<Vec<i32>, Error> {
        if capture >= usize::from(self.config.capture_channels)
            || render >= usize::from(self.config.render_channels)
        {
            return Err(Error::BadNumberChannels);
        }
        let mut taps = vec![0; self.inner.impulse_response_len()];
        self.inner.impulse_response_for(capture, render, &mut taps);
        Ok(taps)
    }

    /// The adaptive filter, for control beyond this API.
    pub fn canceller(&self) -> &MdfCanceller<T> {
        &self.inner
    }

    pub fn statistics(&self) -> Stats {
        Stats {
            echo_return_loss_enhancement: self.erle.erle_db(),
            echo: self.inner.stats(),
        }
    }
}
