//! # Quantity Module
//!
//! Fixed-point quantities for cart lines, sale items and stock movements.
//!
//! Countable products sell in whole units; weighable products (cheese,
//! nails by the kilo, cable by the metre) sell in decimal amounts. Both are
//! stored as integer thousandths so that summing a wholesale group or
//! checking a return against the sold amount never drifts.
//!
//! On the wire a quantity is a plain decimal number (`1.5`), which is what
//! stored sales and the register UI already use.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Thousandths per unit.
const SCALE: i64 = 1000;

/// A quantity with three decimal places of precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Quantity(i64);

impl Quantity {
    /// Whole units.
    ///
    /// ```rust
    /// use mostrador_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::from_units(3).thousandths(), 3000);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * SCALE)
    }

    /// Raw thousandths (1250 = 1.25).
    #[inline]
    pub const fn from_thousandths(thousandths: i64) -> Self {
        Quantity(thousandths)
    }

    /// Converts a decimal reading (scale, UI input) rounding to thousandths.
    pub fn from_decimal(value: f64) -> Self {
        Quantity((value * SCALE as f64).round() as i64)
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn thousandths(&self) -> i64 {
        self.0
    }

    /// Whole units, truncated toward zero.
    #[inline]
    pub const fn whole_units(&self) -> i64 {
        self.0 / SCALE
    }

    #[inline]
    pub const fn is_whole(&self) -> bool {
        self.0 % SCALE == 0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Decimal value, for display and serialization only.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// Scales by a whole factor (packs, presentations).
    #[inline]
    pub const fn scale(&self, factor: i64) -> Self {
        Quantity(self.0 * factor)
    }

    /// Divides by a whole divisor, rounding half up (loose pieces).
    pub fn divide(&self, divisor: i64) -> Self {
        if divisor == 0 {
            return *self;
        }
        Quantity((self.0 * 2 + divisor) / (divisor * 2))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{}", self.whole_units())
        } else {
            let text = format!("{:.3}", self.as_f64());
            write!(f, "{}", text.trim_end_matches('0'))
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_whole() {
            serializer.serialize_i64(self.whole_units())
        } else {
            serializer.serialize_f64(self.as_f64())
        }
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Quantity::from_decimal(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_and_fractional() {
        assert!(Quantity::from_units(4).is_whole());
        assert!(!Quantity::from_thousandths(1250).is_whole());
        assert_eq!(Quantity::from_decimal(0.3335).thousandths(), 334);
    }

    #[test]
    fn test_divide_rounds_half_up() {
        // one loose piece out of a 12-piece box
        assert_eq!(Quantity::from_units(1).divide(12).thousandths(), 83);
        assert_eq!(Quantity::from_units(6).divide(12).thousandths(), 500);
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::from_units(5).to_string(), "5");
        assert_eq!(Quantity::from_thousandths(1250).to_string(), "1.25");
    }

    #[test]
    fn test_serde_as_decimal() {
        let json = serde_json::to_string(&Quantity::from_thousandths(1500)).unwrap();
        assert_eq!(json, "1.5");
        let whole = serde_json::to_string(&Quantity::from_units(2)).unwrap();
        assert_eq!(whole, "2");

        let back: Quantity = serde_json::from_str("2").unwrap();
        assert_eq!(back, Quantity::from_units(2));
    }
}
