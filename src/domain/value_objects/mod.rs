//! Value Objects for the marketplace

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use validator::Validate;

/// Money value object. All amounts share the marketplace currency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn units(amount: i64) -> Self { Self(Decimal::from(amount)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_negative(&self) -> bool { self.0.is_sign_negative() && !self.0.is_zero() }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }

    /// Clamps into `[0, ceiling]`.
    pub fn clamp_to(self, ceiling: Money) -> Money {
        if self.is_negative() { Money::ZERO } else { self.min(ceiling) }
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money { Money(self.0 - rhs.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, |acc, m| acc + m) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Quantity value object; never negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> { self.0.checked_sub(other).map(Self) }
    pub fn covers(&self, requested: u32) -> bool { self.0 >= requested }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Shipping address snapshot stored on an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub street1: String,
    pub street2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub zip: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_arithmetic() {
        let a = Money::units(100);
        let b = Money::units(50);
        assert_eq!((a + b).amount(), Decimal::new(150, 0));
        assert_eq!((a - b).amount(), Decimal::new(50, 0));
        assert_eq!(b.multiply(3), Money::units(150));
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>(), Money::units(200));
    }

    #[test]
    fn test_money_clamp() {
        let total = Money::units(80);
        assert_eq!(Money::units(-5).clamp_to(total), Money::ZERO);
        assert_eq!(Money::units(120).clamp_to(total), total);
        assert_eq!(Money::units(30).clamp_to(total), Money::units(30));
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(Decimal::new(1999, 2)).to_string(), "19.99");
    }

    #[test]
    fn test_quantity() {
        let q = Quantity::new(5);
        assert_eq!(q.subtract(2).unwrap().value(), 3);
        assert!(q.subtract(6).is_none());
        assert!(q.covers(5));
        assert!(!q.covers(6));
        assert!(Quantity::new(0).is_zero());
    }

    #[test]
    fn test_address_validation() {
        let mut address = Address { name: "Jane".into(), street1: "1 Main St".into(), city: "Springfield".into(), zip: "12345".into(), country: "US".into(), ..Default::default() };
        assert!(address.validate().is_ok());
        address.city.clear();
        assert!(address.validate().is_err());
    }
}
