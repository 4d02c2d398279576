//! Fixed-point decimal types used throughout the settlement pipeline.
//!
//! Three scales are in play and are never mixed implicitly: energy
//! quantities carry 3 fractional digits (kWh), unit prices carry 6
//! (currency-minor-units per kWh), and monetary amounts carry 2. Rounding
//! only ever happens when a [`Quantity`] is multiplied by a [`UnitPrice`]
//! to produce an [`Amount`], and it is always half-away-from-zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MoneyError {
    #[error("division by zero quantity")]
    DivisionByZeroQuantity,
}

/// An energy quantity in kWh, scale 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Quantity(Decimal);

/// A unit price in currency-minor-units per kWh, scale 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct UnitPrice(Decimal);

/// A monetary amount in currency-minor-units, scale 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Amount(Decimal);

impl Quantity {
    pub const SCALE: u32 = 3;

    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp(Self::SCALE))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiplies by a unit price, rounding the result to [`Amount`]'s scale
    /// (half-away-from-zero, per the line-level rounding rule).
    pub fn amount_at(&self, price: UnitPrice) -> Amount {
        Amount::new(self.0 * price.0)
    }
}

impl UnitPrice {
    pub const SCALE: u32 = 6;

    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp(Self::SCALE))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Amount {
    pub const SCALE: u32 = 2;

    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Quantity-weighted unit price: `self / quantity`, rounded to 6dp.
    /// Used when a line aggregates several observations into one amount
    /// and needs to report a representative unit price.
    pub fn weighted_unit_price(&self, quantity: Quantity) -> Result<UnitPrice, MoneyError> {
        if quantity.is_zero() {
            return Err(MoneyError::DivisionByZeroQuantity);
        }
        Ok(UnitPrice::new(self.0 / quantity.0))
    }
}

macro_rules! impl_decimal_newtype_ops {
    ($t:ty) => {
        impl Add for $t {
            type Output = $t;
            fn add(self, rhs: $t) -> $t {
                Self::new(self.0 + rhs.0)
            }
        }

        impl Sub for $t {
            type Output = $t;
            fn sub(self, rhs: $t) -> $t {
                Self::new(self.0 - rhs.0)
            }
        }

        impl Neg for $t {
            type Output = $t;
            fn neg(self) -> $t {
                Self::new(-self.0)
            }
        }

        impl Sum for $t {
            fn sum<I: Iterator<Item = $t>>(iter: I) -> $t {
                iter.fold(Self::zero(), |acc, x| acc + x)
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_decimal_newtype_ops!(Quantity);
impl_decimal_newtype_ops!(UnitPrice);
impl_decimal_newtype_ops!(Amount);

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_rounds_half_away_from_zero() {
        let q = Quantity::new(dec!(1.0));
        let p = UnitPrice::new(dec!(0.125));
        // 1.0 * 0.125000 = 0.125 -> rounds to 0.13 (half away from zero)
        assert_eq!(q.amount_at(p).value(), dec!(0.13));
    }

    #[test]
    fn negative_amount_rounds_away_from_zero() {
        let q = Quantity::new(dec!(-1.0));
        let p = UnitPrice::new(dec!(0.125));
        assert_eq!(q.amount_at(p).value(), dec!(-0.13));
    }

    #[test]
    fn sum_of_amounts_matches_individually_rounded_lines() {
        let lines = vec![Amount::new(dec!(3.60)), Amount::new(dec!(12.00))];
        let total: Amount = lines.into_iter().sum();
        assert_eq!(total.value(), dec!(15.60));
    }

    #[test]
    fn weighted_unit_price_is_amount_over_quantity() {
        let amount = Amount::new(dec!(24.00));
        let quantity = Quantity::new(dec!(24.000));
        assert_eq!(amount.weighted_unit_price(quantity).unwrap().value(), dec!(1.000000));
    }

    #[test]
    fn weighted_unit_price_rejects_zero_quantity() {
        let amount = Amount::new(dec!(1.00));
        assert_eq!(
            amount.weighted_unit_price(Quantity::zero()),
            Err(MoneyError::DivisionByZeroQuantity)
        );
    }
}
