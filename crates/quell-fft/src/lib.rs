#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

use std::error;
use std::fmt;

mod packed;
mod real_fft;

pub use real_fft::RealFft;

/// A forward/inverse real DFT of a fixed, even block length operating on
/// the packed half-spectrum layout.
///
/// Implementations own whatever scratch memory they need, which is why
/// both directions take `&mut self`. Callers treat a transform as a pure
/// function of its input block.
pub trait Transform: Send {
    /// Block length `N` in samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time block of `N` samples to packed spectrum of `N` values, scaled
    /// by `1/N`.
    fn forward(&mut self, input: &[f32], output: &mut [f32]);

    /// Packed spectrum of `N` values back to a time block of `N` samples,
    /// unscaled.
    fn inverse(&mut self, input: &[f32], output: &mut [f32]);
}

/// Errors returned when creating a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    /// The block length was zero.
    ZeroLength,
    /// The packed layout needs a real Nyquist bin, so the length must be even.
    OddLength { len: usize },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ZeroLength => write!(f, "transform length must be non-zero"),
            Self::OddLength { len } => write!(f, "transform length {len} is not even"),
        }
    }
}

impl error::Error for TransformError {}
