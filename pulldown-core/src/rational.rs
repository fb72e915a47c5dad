//! Rational number type for exact frame rate arithmetic.
//!
//! Pulldown math keeps rates such as 30000/1001 exact through repeated
//! scaling (`* 4/5`, `* 2`), so equality and ordering compare by value
//! rather than by representation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Div, Mul};

/// A rational number represented as a numerator and denominator.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Rational {
    /// Numerator
    pub num: i64,
    /// Denominator (always positive)
    pub den: i64,
}

impl Rational {
    /// NTSC video rate, 30000/1001.
    pub const NTSC: Self = Self {
        num: 30000,
        den: 1001,
    };

    /// NTSC film rate, 24000/1001.
    pub const NTSC_FILM: Self = Self {
        num: 24000,
        den: 1001,
    };

    /// PAL video rate, 25/1.
    pub const PAL: Self = Self { num: 25, den: 1 };

    /// Film rate, 24/1.
    pub const FILM: Self = Self { num: 24, den: 1 };

    /// Create a new rational number.
    ///
    /// # Panics
    ///
    /// Panics if denominator is zero.
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "Denominator cannot be zero");
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        Self { num, den }
    }

    /// Create a rational from an integer.
    pub const fn from_int(n: i64) -> Self {
        Self { num: n, den: 1 }
    }

    /// Check if this rational is zero.
    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Reduce the rational to its simplest form.
    pub fn reduce(&self) -> Self {
        if self.num == 0 {
            return Self { num: 0, den: 1 };
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs()) as i64;
        Self {
            num: self.num / g,
            den: self.den / g,
        }
    }

    /// Multiply by an integer.
    pub fn mul_int(&self, n: i64) -> Self {
        Self::new(self.num * n, self.den).reduce()
    }

    /// Scale by `num/den`, e.g. `rate.scale(cycle - 1, cycle)` to remove
    /// one frame per pulldown cycle.
    pub fn scale(&self, num: i64, den: i64) -> Self {
        *self * Self::new(num, den)
    }

    /// Ratio of `self` to `other` as a reduced rational.
    pub fn ratio_to(&self, other: Rational) -> Self {
        *self / other
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::from_int(0)
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rational {}

impl Hash for Rational {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let r = self.reduce();
        r.num.hash(state);
        r.den.hash(state);
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({}/{})", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl Mul for Rational {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let a = self.reduce();
        let b = rhs.reduce();
        Self::new(a.num * b.num, a.den * b.den).reduce()
    }
}

impl Div for Rational {
    type Output = Self;

    /// # Panics
    ///
    /// Panics if `rhs` is zero.
    fn div(self, rhs: Self) -> Self::Output {
        let a = self.reduce();
        let b = rhs.reduce();
        Self::new(a.num * b.den, a.den * b.num).reduce()
    }
}

impl From<(i64, i64)> for Rational {
    fn from((num, den): (i64, i64)) -> Self {
        Self::new(num, den)
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Self::from_int(n)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
