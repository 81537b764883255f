//! Echo canceller configuration.

use quell_mdf::{MAX_SAMPLE_RATE, MdfConfig, Tuning};

/// Minimum supported sample rate in Hz.
pub const MIN_SAMPLE_RATE_HZ: u32 = 8_000;
/// Maximum supported sample rate in Hz.
pub const MAX_SAMPLE_RATE_HZ: u32 = MAX_SAMPLE_RATE;

/// Configuration of an [`EchoCanceller`](crate::EchoCanceller).
///
/// Durations are converted to samples at build time, rounding down.
///
/// # Example
///
/// ```
/// use quell::Config;
///
/// let config = Config {
///     sample_rate_hz: 48_000,
///     frame_ms: 10,
///     tail_ms: 250,
///     ..Default::default()
/// };
/// assert_eq!(config.frame_size(), 480);
/// assert_eq!(config.filter_length(), 12_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub sample_rate_hz: u32,
    /// Duration of one processed frame.
    pub frame_ms: u32,
    /// Longest echo path the filter can model.
    pub tail_ms: u32,
    /// Microphone channels per capture frame.
    pub capture_channels: u16,
    /// Loudspeaker channels per render frame.
    pub render_channels: u16,
    /// Protect the audible output with a foreground filter that only
    /// follows the adapting one once it has proven better.
    pub two_path: bool,
    /// Render frames buffered before they are matched with a capture.
    pub playback_delay_frames: usize,
    pub tuning: Tuning,
}

impl Config {
    /// Samples per channel in one frame.
    pub fn frame_size(&self) -> usize {
        (u64::from(self.sample_rate_hz) * u64::from(self.frame_ms) / 1000) as usize
    }

    /// Filter length in samples.
    pub fn filter_length(&self) -> usize {
        (u64::from(self.sample_rate_hz) * u64::from(self.tail_ms) / 1000) as usize
    }

    pub(crate) fn to_mdf(self) -> MdfConfig {
        MdfConfig {
            frame_size: self.frame_size(),
            filter_length: self.filter_length(),
            num_mics: usize::from(self.capture_channels),
            num_speakers: usize::from(self.render_channels),
            sample_rate: self.sample_rate_hz,
            two_path: self.two_path,
            playback_delay_frames: self.playback_delay_frames,
            tuning: self.tuning,
        }
    }
}

impl Default for Config {
    /// Mono 16 kHz with 20 ms frames and a 200 ms tail.
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            frame_ms: 20,
            tail_ms: 200,
            capture_channels: 1,
            render_channels: 1,
            two_path: true,
            playback_delay_frames: 2,
            tuning: Tuning::default(),
        }
    }
}
