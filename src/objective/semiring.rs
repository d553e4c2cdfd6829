// src/objective/semiring.rs

use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul};

/// Non-negative reals stored as their natural logarithm.
///
/// `+` is log-sum-exp and `*` is log-domain addition, so large scores can
/// be normalized without overflow.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LogWeight(f64);

impl LogWeight {
    pub const fn zero() -> Self {
        LogWeight(f64::NEG_INFINITY)
    }

    pub const fn one() -> Self {
        LogWeight(0.0)
    }

    /// The weight `e^x`.
    pub const fn exp(x: f64) -> Self {
        LogWeight(x)
    }

    pub fn ln(self) -> f64 {
        self.0
    }

    pub fn value(self) -> f64 {
        self.0.exp()
    }

    pub fn is_zero(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }
}

impl Default for LogWeight {
    fn default() -> Self {
        LogWeight::zero()
    }
}

impl Add for LogWeight {
    type Output = LogWeight;

    fn add(self, other: LogWeight) -> LogWeight {
        if self.is_zero() {
            return other;
        }
        if other.is_zero() {
            return self;
        }
        let (hi, lo) = if self.0 >= other.0 {
            (self.0, other.0)
        } else {
            (other.0, self.0)
        };
        LogWeight(hi + (lo - hi).exp().ln_1p())
    }
}

impl AddAssign for LogWeight {
    fn add_assign(&mut self, other: LogWeight) {
        *self = *self + other;
    }
}

impl Mul for LogWeight {
    type Output = LogWeight;

    fn mul(self, other: LogWeight) -> LogWeight {
        LogWeight(self.0 + other.0)
    }
}

impl Div for LogWeight {
    type Output = LogWeight;

    fn div(self, other: LogWeight) -> LogWeight {
        LogWeight(self.0 - other.0)
    }
}

impl Sum for LogWeight {
    fn sum<I: Iterator<Item = LogWeight>>(iter: I) -> LogWeight {
        iter.fold(LogWeight::zero(), Add::add)
    }
}

impl From<LogWeight> for f64 {
    fn from(weight: LogWeight) -> f64 {
        weight.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_is_log_sum_exp() {
        let sum = LogWeight::exp(2.0f64.ln()) + LogWeight::exp(3.0f64.ln());
        assert!((sum.value() - 5.0).abs() < 1e-12);
        assert_eq!(LogWeight::zero() + LogWeight::one(), LogWeight::one());
    }

    #[test]
    fn large_exponents_do_not_overflow() {
        let z: LogWeight = [1000.0, 1000.0, 999.0].iter().map(|&x| LogWeight::exp(x)).sum();
        let p = LogWeight::exp(1000.0) / z;
        assert!(z.ln().is_finite());
        let expected = 1.0 / (2.0 + (-1.0f64).exp());
        assert!((p.value() - expected).abs() < 1e-12);
    }

    #[test]
    fn multiplication_adds_logs() {
        let w = LogWeight::exp(0.5) * LogWeight::exp(1.5);
        assert_eq!(w.ln(), 2.0);
        assert_eq!(f64::from(LogWeight::zero()), 0.0);
    }
}
