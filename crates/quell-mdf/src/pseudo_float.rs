//! Software block floating point for integer-only targets.
//!
//! A [`PseudoFloat`] is `mantissa * 2^exponent` with a 16-bit signed
//! mantissa kept normalized so its magnitude lies in `[16384, 32767]`.
//! Every operation is done in integer arithmetic and renormalized.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::scalar::Scalar;

const MANTISSA_BITS: i32 = 15;

/// 16-bit mantissa, 16-bit exponent software float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PseudoFloat {
    mantissa: i16,
    exponent: i16,
}

impl PseudoFloat {
    pub const ZERO: Self = Self {
        mantissa: 0,
        exponent: 0,
    };
    pub const ONE: Self = Self {
        mantissa: 16384,
        exponent: -14,
    };
    pub const MAX: Self = Self {
        mantissa: i16::MAX,
        exponent: i16::MAX,
    };
    pub const MIN: Self = Self {
        mantissa: -i16::MAX,
        exponent: i16::MAX,
    };

    pub fn mantissa(self) -> i16 {
        self.mantissa
    }

    pub fn exponent(self) -> i16 {
        self.exponent
    }

    /// Builds `m * 2^e`, shifting the mantissa into 15 significant bits.
    ///
    /// Low bits are truncated toward zero. Exponent overflow saturates;
    /// underflow flushes to zero.
    fn normalize(m: i64, e: i32) -> Self {
        if m == 0 {
            return Self::ZERO;
        }
        let negative = m < 0;
        let mut mag = m.unsigned_abs();
        let bits = (u64::BITS - mag.leading_zeros()) as i32;
        let shift = bits - MANTISSA_BITS;
        if shift > 0 {
            mag >>= shift;
        } else {
            mag <<= -shift;
        }
        let e = e + shift;
        if e > i32::from(i16::MAX) {
            return if negative { Self::MIN } else { Self::MAX };
        }
        if e < i32::from(i16::MIN) {
            return Self::ZERO;
        }
        let mag = mag as i16;
        Self {
            mantissa: if negative { -mag } else { mag },
            exponent: e as i16,
        }
    }

    fn is_zero(self) -> bool {
        self.mantissa == 0
    }
}

impl Add for PseudoFloat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let (big, small) = if self.exponent >= rhs.exponent {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let diff = i32::from(big.exponent) - i32::from(small.exponent);
        // The smaller operand is below the mantissa resolution.
        if diff > 31 {
            return big;
        }
        let sum = (i64::from(big.mantissa) << diff) + i64::from(small.mantissa);
        Self::normalize(sum, i32::from(small.exponent))
    }
}

impl Sub for PseudoFloat {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + -rhs
    }
}

impl Neg for PseudoFloat {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            mantissa: -self.mantissa,
            exponent: self.exponent,
        }
    }
}

impl Mul for PseudoFloat {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::ZERO;
        }
        Self::normalize(
            i64::from(self.mantissa) * i64::from(rhs.mantissa),
            i32::from(self.exponent) + i32::from(rhs.exponent),
        )
    }
}

impl Div for PseudoFloat {
    type Output = Self;

    /// Division by zero saturates toward the sign of the dividend.
    fn div(self, rhs: Self) -> Self {
        if self.is_zero() {
            return Self::ZERO;
        }
        if rhs.is_zero() {
            return if self.mantissa < 0 { Self::MIN } else { Self::MAX };
        }
        Self::normalize(
            (i64::from(self.mantissa) << 30) / i64::from(rhs.mantissa),
            i32::from(self.exponent) - i32::from(rhs.exponent) - 30,
        )
    }
}

impl PartialOrd for PseudoFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let sign = |v: Self| v.mantissa.signum();
        let by_sign = sign(*self).cmp(&sign(*other));
        if by_sign != Ordering::Equal || self.is_zero() {
            return Some(by_sign);
        }
        // Same non-zero sign: normalized values order by exponent first.
        let by_magnitude = self
            .exponent
            .cmp(&other.exponent)
            .then(self.mantissa.unsigned_abs().cmp(&other.mantissa.unsigned_abs()));
        Some(if self.mantissa > 0 {
            by_magnitude
        } else {
            by_magnitude.reverse()
        })
    }
}

impl fmt::Display for PseudoFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

impl Scalar for PseudoFloat {
    const ZERO: Self = Self::ZERO;
    const ONE: Self = Self::ONE;

    /// Decodes the IEEE-754 bit pattern with integer operations only.
    ///
    /// Subnormals and NaN map to zero, infinities saturate.
    fn from_f32(v: f32) -> Self {
        let bits = v.to_bits();
        let negative = bits >> 31 != 0;
        let biased = ((bits >> 23) & 0xff) as i32;
        let fraction = i64::from(bits & 0x007f_ffff);
        match biased {
            0 => Self::ZERO,
            0xff if fraction != 0 => Self::ZERO,
            0xff => {
                if negative {
                    Self::MIN
                } else {
                    Self::MAX
                }
            }
            _ => {
                let m = fraction | 0x0080_0000;
                Self::normalize(if negative { -m } else { m }, biased - 150)
            }
        }
    }

    fn to_f32(self) -> f32 {
        // Two steps keep results near the f32 range limits representable.
        let e = i32::from(self.exponent);
        f32::from(self.mantissa) * 2.0f32.powi(e / 2) * 2.0f32.powi(e - e / 2)
    }

    fn from_i16(v: i16) -> Self {
        Self::normalize(i64::from(v), 0)
    }

    fn to_i16(self) -> i16 {
        if self.is_zero() {
            return 0;
        }
        let e = i32::from(self.exponent);
        if e >= 0 {
            let wide = i64::from(self.mantissa) << e.min(32);
            return wide.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
        }
        let shift = -e;
        if shift > 16 {
            return 0;
        }
        let half = 1i64 << (shift - 1);
        let mag = (i64::from(self.mantissa.unsigned_abs()) + half) >> shift;
        let v = if self.mantissa < 0 { -mag } else { mag };
        v.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
    }

    fn from_i32(v: i32) -> Self {
        Self::normalize(i64::from(v), 0)
    }

    fn to_i32(self) -> i32 {
        let e = i32::from(self.exponent);
        if e >= 0 {
            let wide = i64::from(self.mantissa) << e.min(32);
            return wide.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        }
        if -e > 15 {
            return 0;
        }
        // Integer division truncates toward zero.
        i32::from(self.mantissa) / (1 << -e)
    }

    fn ratio(num: i32, den: i32) -> Self {
        Self::from_i32(num) / Self::from_i32(den)
    }

    fn sqrt(self) -> Self {
        if self.mantissa <= 0 {
            return Self::ZERO;
        }
        let (m, e) = if self.exponent % 2 != 0 {
            (i64::from(self.mantissa) << 1, i32::from(self.exponent) - 1)
        } else {
            (i64::from(self.mantissa), i32::from(self.exponent))
        };
        let root = (m << 28).unsigned_abs().isqrt();
        Self::normalize(root as i64, (e - 28) / 2)
    }
}
