//! Configuration errors.

use std::error;
use std::fmt;

use quell_fft::TransformError;

/// Errors reported when a canceller is created or reconfigured.
///
/// These are the only hard failures of the engine. Numeric trouble while
/// processing is recovered internally and reported through
/// [`FrameOutcome`](crate::FrameOutcome) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `frame_size` was zero.
    ZeroFrameSize,
    /// `filter_length` was zero.
    ZeroFilterLength,
    /// A microphone or speaker channel count was zero.
    ZeroChannels,
    /// The sampling rate was zero or above
    /// [`MAX_SAMPLE_RATE`](crate::MAX_SAMPLE_RATE).
    InvalidSampleRate(u32),
    /// The playback alignment buffer needs at least one frame of delay.
    ZeroPlaybackDelay,
    /// A supplied transform does not operate on `2 * frame_size` samples.
    TransformSizeMismatch { expected: usize, actual: usize },
    /// Filter length and channel counts are fixed once processing started.
    AlreadyStarted,
    /// The default transform could not be planned.
    Transform(TransformError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ZeroFrameSize => write!(f, "frame size must be non-zero"),
            Self::ZeroFilterLength => write!(f, "filter length must be non-zero"),
            Self::ZeroChannels => write!(f, "channel counts must be non-zero"),
            Self::InvalidSampleRate(rate) => write!(f, "invalid sample rate: {rate}"),
            Self::ZeroPlaybackDelay => write!(f, "playback delay must be at least one frame"),
            Self::TransformSizeMismatch { expected, actual } => {
                write!(f, "transform length {actual} does not match window size {expected}")
            }
            Self::AlreadyStarted => {
                write!(f, "filter length and channels cannot change after processing started")
            }
            Self::Transform(e) => write!(f, "transform: {e}"),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Transform(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransformError> for ConfigError {
    fn from(e: TransformError) -> Self {
        Self::Transform(e)
    }
}
