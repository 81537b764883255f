//! Numeric backend abstraction.
//!
//! The energies and per-bin statistics that drive adaptation are
//! [`Scalar`]s, as are the sample conversions at the frame boundary. The
//! same adaptation logic runs on native `f32` or on the integer-only
//! [`PseudoFloat`](crate::PseudoFloat). Time-domain and spectral data,
//! filter weights included, stay `f32`, the data type of the
//! [`Transform`](crate::Transform) they pass through.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Arithmetic required by the adaptive filter engine.
pub trait Scalar:
    Copy
    + fmt::Debug
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    const ZERO: Self;
    const ONE: Self;

    fn from_f32(v: f32) -> Self;
    fn to_f32(self) -> f32;

    fn from_i16(v: i16) -> Self;
    /// Rounds to the nearest sample, saturating at the `i16` range.
    fn to_i16(self) -> i16;

    fn from_i32(v: i32) -> Self;
    /// Truncates toward zero, saturating at the `i32` range.
    fn to_i32(self) -> i32;

    /// `num / den` computed from integers.
    fn ratio(num: i32, den: i32) -> Self;

    /// Square root; negative inputs yield zero.
    fn sqrt(self) -> Self;

    fn abs(self) -> Self {
        if self < Self::ZERO { -self } else { self }
    }

    fn max(self, other: Self) -> Self {
        if other > self { other } else { self }
    }

    fn min(self, other: Self) -> Self {
        if other < self { other } else { self }
    }
}

impl Scalar for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn from_f32(v: f32) -> Self {
        v
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn from_i16(v: i16) -> Self {
        Self::from(v)
    }

    fn to_i16(self) -> i16 {
        // Float-to-int `as` casts saturate.
        self.round() as i16
    }

    fn from_i32(v: i32) -> Self {
        v as Self
    }

    fn to_i32(self) -> i32 {
        self as i32
    }

    fn ratio(num: i32, den: i32) -> Self {
        num as Self / den as Self
    }

    fn sqrt(self) -> Self {
        if self > 0.0 { Self::sqrt(self) } else { 0.0 }
    }
}
