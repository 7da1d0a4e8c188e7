//! Immutable double-precision value used for coefficients, powers and evaluation results.
//!
//! `Scalar` is a thin `f64` newtype. Equality and ordering follow IEEE-754 exactly, so NaN is
//! never equal to itself and every comparison against NaN is false. NaN doubles as the "no value"
//! sentinel for unbound symbols.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A double-precision value with IEEE-754 semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Scalar(f64);

impl Scalar {
    /// The additive identity.
    pub const ZERO: Scalar = Scalar(0.0);
    /// The multiplicative identity.
    pub const ONE: Scalar = Scalar(1.0);
    /// Sentinel for "no value".
    pub const NAN: Scalar = Scalar(f64::NAN);

    pub const fn new(value: f64) -> Self {
        Scalar(value)
    }

    /// Returns the wrapped `f64`.
    pub const fn value(self) -> f64 {
        self.0
    }

    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }

    /// True when the value is a whole number that fits losslessly in an `i64`.
    pub fn is_integral(self) -> bool {
        self.0.is_finite() && self.0.fract() == 0.0 && self.0.abs() < (1u64 << 53) as f64
    }

    /// Raises `self` to `power` with `f64::powf` semantics.
    ///
    /// A negative base with a fractional power yields NaN rather than an error.
    pub fn pow(self, power: Scalar) -> Scalar {
        Scalar(self.0.powf(power.0))
    }

    pub fn abs(self) -> Scalar {
        Scalar(self.0.abs())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar(f64::from(value))
    }
}

impl From<Scalar> for f64 {
    fn from(value: Scalar) -> Self {
        value.0
    }
}

impl PartialEq<f64> for Scalar {
    fn eq(&self, other: &f64) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<f64> for Scalar {
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl Add for Scalar {
    type Output = Scalar;

    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;

    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;

    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Div for Scalar {
    type Output = Scalar;

    fn div(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 / rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

impl std::iter::Sum for Scalar {
    fn sum<I: Iterator<Item = Scalar>>(iter: I) -> Self {
        iter.fold(Scalar::ZERO, |acc, x| acc + x)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_is_never_equal() {
        assert_ne!(Scalar::NAN, Scalar::NAN);
        assert!(Scalar::NAN.is_nan());
        assert!(!(Scalar::NAN < Scalar::ZERO));
        assert!(!(Scalar::NAN > Scalar::ZERO));
    }

    #[test]
    fn test_arithmetic() {
        let a = Scalar::new(3.0);
        let b = Scalar::from(2);
        assert_eq!(a + b, 5.0);
        assert_eq!(a - b, 1.0);
        assert_eq!(a * b, 6.0);
        assert_eq!(a / b, 1.5);
        assert_eq!(-a, -3.0);
        assert_eq!(b.pow(Scalar::new(3.0)), 8.0);
        assert_eq!(Scalar::new(-4.0).abs(), 4.0);
    }

    #[test]
    fn test_domain_errors_propagate() {
        assert!(Scalar::new(-8.0).pow(Scalar::new(0.5)).is_nan());
        assert_eq!(Scalar::ONE / Scalar::ZERO, f64::INFINITY);
        assert!((Scalar::NAN + Scalar::ONE).is_nan());
    }

    #[test]
    fn test_is_integral() {
        assert!(Scalar::new(-3.0).is_integral());
        assert!(!Scalar::new(0.25).is_integral());
        assert!(!Scalar::NAN.is_integral());
        assert!(!Scalar::new(f64::INFINITY).is_integral());
    }

    #[test]
    fn test_sum() {
        let total: Scalar = [1.0, 2.0, 3.5].into_iter().map(Scalar::from).sum();
        assert_eq!(total, 6.5);
    }
}
