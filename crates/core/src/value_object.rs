//! Value objects: equality by value, not identity.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A stock quantity (on-hand amount, counted amount or ledger delta).
///
/// Always finite. The value is kept exactly as supplied; ledger sums are
/// compared with [`Quantity::approx_eq`] since adding float deltas does not
/// reproduce the quantities they were derived from bit for bit.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Quantity(f64);

impl ValueObject for Quantity {}

impl Quantity {
    /// Relative tolerance of [`Quantity::approx_eq`], scaled by the larger
    /// operand (never below 1).
    pub const TOLERANCE: f64 = 1e-9;

    pub const ZERO: Quantity = Quantity(0.0);

    /// Build a quantity, rejecting NaN and infinities.
    pub fn new(value: f64) -> Result<Self, DomainError> {
        if !value.is_finite() {
            return Err(DomainError::validation("quantity must be a finite number"));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0.0
    }

    /// `target - self`. Fails when the difference overflows.
    pub fn delta_to(self, target: Quantity) -> Result<Quantity, DomainError> {
        checked(target.0 - self.0)
    }

    /// `self + delta`. Fails when the sum overflows.
    pub fn apply(self, delta: Quantity) -> Result<Quantity, DomainError> {
        checked(self.0 + delta.0)
    }

    /// Equal up to float error accumulated by ledger arithmetic.
    pub fn approx_eq(self, other: Quantity) -> bool {
        let scale = self.0.abs().max(other.0.abs()).max(1.0);
        (self.0 - other.0).abs() <= Self::TOLERANCE * scale
    }
}

fn checked(value: f64) -> Result<Quantity, DomainError> {
    if !value.is_finite() {
        return Err(DomainError::validation("quantity arithmetic overflowed"));
    }
    Ok(Quantity(value))
}

impl TryFrom<f64> for Quantity {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for f64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| DomainError::validation(format!("'{s}' is not a valid quantity")))?;
        Self::new(value)
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_non_finite_values() {
        assert!(Quantity::new(f64::NAN).is_err());
        assert!(Quantity::new(f64::INFINITY).is_err());
        assert!("inf".parse::<Quantity>().is_err());
        assert!("".parse::<Quantity>().is_err());
    }

    #[test]
    fn parses_form_input() {
        assert_eq!(" 7 ".parse::<Quantity>().unwrap().value(), 7.0);
        assert_eq!("-2.5".parse::<Quantity>().unwrap().value(), -2.5);
    }

    #[test]
    fn deserializes_plain_numbers() {
        let q: Quantity = serde_json::from_str("3.25").unwrap();
        assert_eq!(q.value(), 3.25);
    }

    #[test]
    fn keeps_the_value_as_given() {
        assert_eq!(Quantity::new(0.1234567).unwrap().value(), 0.1234567);
        assert_eq!(Quantity::new(1e303).unwrap().value(), 1e303);
        assert_eq!(Quantity::new(f64::MAX).unwrap().value(), f64::MAX);
    }

    #[test]
    fn overflowing_arithmetic_is_rejected() {
        let max = Quantity::new(f64::MAX).unwrap();
        let min = Quantity::new(f64::MIN).unwrap();
        assert!(max.apply(max).is_err());
        assert!(min.delta_to(max).is_err());
        assert_eq!(max.delta_to(max).unwrap(), Quantity::ZERO);
    }

    #[test]
    fn large_values_serialize_as_numbers() {
        let q = Quantity::new(1e303).unwrap();
        let json = serde_json::to_string(&q).unwrap();
        assert_ne!(json, "null");
        assert!(serde_json::from_str::<Quantity>(&json).unwrap().approx_eq(q));
    }

    #[test]
    fn approx_eq_absorbs_float_noise_only() {
        let sum = Quantity::new(0.1).unwrap().apply(Quantity::new(0.2).unwrap()).unwrap();
        let expected = Quantity::new(0.3).unwrap();
        assert_ne!(sum, expected);
        assert!(sum.approx_eq(expected));
        assert!(!Quantity::new(0.1234567).unwrap().approx_eq(Quantity::new(0.123457).unwrap()));
    }

    proptest! {
        #[test]
        fn applying_the_delta_lands_on_the_target(a in -1.0e6f64..1.0e6, b in -1.0e6f64..1.0e6) {
            let from = Quantity::new(a).unwrap();
            let to = Quantity::new(b).unwrap();
            prop_assert!(from.apply(from.delta_to(to).unwrap()).unwrap().approx_eq(to));
        }
    }
}
