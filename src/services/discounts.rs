//! Coupon discount collaborator

use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::Money;

/// Computes the discount for a cart. The order engine clamps the result into
/// `[0, total]`, so implementations need not.
pub trait DiscountPolicy: Send + Sync {
    fn discount(&self, lines: &[CartLine], total: Money, coupon_code: Option<&str>) -> Money;
}

/// Coupons are accepted and recorded on the order but never reduce the price.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDiscount;

impl DiscountPolicy for NoDiscount {
    fn discount(&self, _lines: &[CartLine], _total: Money, _coupon_code: Option<&str>) -> Money { Money::ZERO }
}

impl<F> DiscountPolicy for F
where
    F: Fn(&[CartLine], Money, Option<&str>) -> Money + Send + Sync,
{
    fn discount(&self, lines: &[CartLine], total: Money, coupon_code: Option<&str>) -> Money { self(lines, total, coupon_code) }
}
