//! Canceller configuration.

use crate::error::ConfigError;

/// Highest accepted sampling rate in Hz.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

pub(crate) fn check_sample_rate(sample_rate: u32) -> Result<(), ConfigError> {
    if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
        return Err(ConfigError::InvalidSampleRate(sample_rate));
    }
    Ok(())
}

/// Empirically tuned constants of the adaptation and two-path logic.
///
/// The defaults are the values the algorithm was designed with at 8 and
/// 16 kHz. They are not guaranteed to be optimal for other sampling rates
/// or frame sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    /// Lower bound of the leak estimate, relative to the echo power.
    pub min_leak: f32,
    /// Smoothing of the short-term residual difference variance. The mean
    /// uses `sqrt(var1_smooth)`.
    pub var1_smooth: f32,
    /// Smoothing of the long-term residual difference variance. The mean
    /// uses `sqrt(var2_smooth)`.
    pub var2_smooth: f32,
    /// Short-term promotion threshold, relative to its variance.
    pub var1_update: f32,
    /// Long-term promotion threshold, relative to its variance.
    pub var2_update: f32,
    /// Rollback threshold applied to all three difference signals.
    pub var_backtrack: f32,
    /// Anomaly count at which the whole state is reset.
    pub reset_threshold: u32,
    /// Near-end magnitude treated as clipping.
    pub saturation_level: i16,
    /// Pre-emphasis coefficient shared by the near end, far end and output.
    pub preemphasis: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            min_leak: 0.005,
            var1_smooth: 0.36,
            var2_smooth: 0.7225,
            var1_update: 0.5,
            var2_update: 0.25,
            var_backtrack: 4.0,
            reset_threshold: 50,
            saturation_level: 32000,
            preemphasis: 0.9,
        }
    }
}

/// Construction parameters of an [`MdfCanceller`](crate::MdfCanceller).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MdfConfig {
    /// Samples per channel processed per call.
    pub frame_size: usize,
    /// Length of the learned echo path in samples. Rounded up to whole
    /// frames.
    pub filter_length: usize,
    /// Number of near-end (microphone) channels.
    pub num_mics: usize,
    /// Number of far-end (loudspeaker) channels.
    pub num_speakers: usize,
    /// Sampling rate in Hz.
    pub sample_rate: u32,
    /// Adapt a background filter and only promote it when it is better.
    pub two_path: bool,
    /// Far-end frames buffered ahead of the near end by
    /// [`playback`](crate::MdfCanceller::playback).
    pub playback_delay_frames: usize,
    pub tuning: Tuning,
}

impl MdfConfig {
    /// Mono configuration at 8 kHz with the default tuning.
    pub fn new(frame_size: usize, filter_length: usize) -> Self {
        Self {
            frame_size,
            filter_length,
            ..Self::default()
        }
    }

    /// Overlap-save block length.
    pub fn window_size(&self) -> usize {
        2 * self.frame_size
    }

    /// Number of frequency-domain filter blocks.
    pub fn num_blocks(&self) -> usize {
        self.filter_length.div_ceil(self.frame_size)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_size == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        if self.filter_length == 0 {
            return Err(ConfigError::ZeroFilterLength);
        }
        if self.num_mics == 0 || self.num_speakers == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        check_sample_rate(self.sample_rate)?;
        if self.playback_delay_frames == 0 {
            return Err(ConfigError::ZeroPlaybackDelay);
        }
        Ok(())
    }
}

impl Default for MdfConfig {
    /// 20 ms frames and a 200 ms tail at 8 kHz.
    fn default() -> Self {
        Self {
            frame_size: 160,
            filter_length: 1600,
            num_mics: 1,
            num_speakers: 1,
            sample_rate: 8000,
            two_path: true,
            playback_delay_frames: 2,
            tuning: Tuning::default(),
        }
    }
}
