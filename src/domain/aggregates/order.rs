//! Order Aggregate

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::cart::CartLine;
use crate::domain::value_objects::{Address, Money};

/// Order header plus its line items. Amounts are fixed at placement time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) shipping_address: Address,
    pub(crate) order_date: DateTime<Utc>,
    pub(crate) status: OrderStatus,
    pub(crate) payment_method: String,
    pub(crate) coupon_code: Option<String>,
    pub(crate) total_amount: Money,
    pub(crate) delivery_charge: Money,
    pub(crate) discount: Money,
    pub(crate) final_amount: Money,
    pub(crate) priority: bool,
    pub(crate) preferred_delivery_date: Option<NaiveDate>,
    pub(crate) refund: Option<RefundRequest>,
    pub(crate) items: Vec<OrderItem>,
}

/// Snapshot of a product at purchase time; later catalog changes never touch it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub price: Money,
    pub discount_at_purchase: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus { #[default] Placed, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Placed => "PLACED", Self::Shipped => "SHIPPED", Self::Delivered => "DELIVERED", Self::Cancelled => "CANCELLED" }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLACED" => Ok(Self::Placed),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// Everything the engine decided before the order is built.
#[derive(Clone, Debug)]
pub struct Placement {
    pub user_id: Uuid,
    pub shipping_address: Address,
    pub payment_method: String,
    pub coupon_code: Option<String>,
    pub preferred_delivery_date: Option<NaiveDate>,
    pub premium: bool,
    pub delivery_charge: Money,
    pub discount: Money,
}

impl Order {
    /// Builds a `PLACED` order from the cart lines at current catalog prices.
    pub fn place(placement: Placement, lines: &[CartLine]) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::NoItems); }
        if placement.preferred_delivery_date.is_some() && !placement.premium { return Err(OrderError::PreferredDateRequiresPremium); }

        let id = Uuid::now_v7();
        let items: Vec<OrderItem> = lines.iter().map(|line| OrderItem {
            id: Uuid::now_v7(), order_id: id, product_id: line.product.id(), seller_id: line.product.seller_id(),
            product_name: line.product.name().to_string(), quantity: line.item.quantity, price: line.product.price(),
            discount_at_purchase: Money::ZERO,
        }).collect();
        let total_amount: Money = items.iter().map(OrderItem::line_total).sum();
        let delivery_charge = if placement.premium { Money::ZERO } else { placement.delivery_charge };
        let discount = placement.discount.clamp_to(total_amount);

        Ok(Self {
            id, user_id: placement.user_id, shipping_address: placement.shipping_address, order_date: Utc::now(),
            status: OrderStatus::Placed, payment_method: placement.payment_method, coupon_code: placement.coupon_code,
            total_amount, delivery_charge, discount, final_amount: total_amount + delivery_charge - discount,
            priority: placement.premium, preferred_delivery_date: placement.preferred_delivery_date, refund: None, items,
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn shipping_address(&self) -> &Address { &self.shipping_address }
    pub fn order_date(&self) -> DateTime<Utc> { self.order_date }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_method(&self) -> &str { &self.payment_method }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn total_amount(&self) -> Money { self.total_amount }
    pub fn delivery_charge(&self) -> Money { self.delivery_charge }
    pub fn discount(&self) -> Money { self.discount }
    pub fn final_amount(&self) -> Money { self.final_amount }
    pub fn priority(&self) -> bool { self.priority }
    pub fn preferred_delivery_date(&self) -> Option<NaiveDate> { self.preferred_delivery_date }
    pub fn refund(&self) -> Option<&RefundRequest> { self.refund.as_ref() }
    pub fn items(&self) -> &[OrderItem] { &self.items }

    /// Cancels a not-yet-delivered order. The caller restores stock for every item.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Delivered => Err(OrderError::CannotCancelDelivered),
            OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled),
            OrderStatus::Placed | OrderStatus::Shipped => { self.status = OrderStatus::Cancelled; Ok(()) }
        }
    }

    /// Only delivered orders can be refunded; stock is not restored.
    pub fn request_refund(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        if self.status != OrderStatus::Delivered { return Err(OrderError::RefundNotAllowed(self.status)); }
        self.status = OrderStatus::Cancelled;
        self.refund = Some(RefundRequest { reason: reason.into(), requested_at: Utc::now() });
        Ok(())
    }

    /// Fulfillment moves strictly forward: `PLACED -> SHIPPED -> DELIVERED`.
    pub fn advance(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        match (self.status, to) {
            (OrderStatus::Placed, OrderStatus::Shipped) | (OrderStatus::Shipped, OrderStatus::Delivered) => { self.status = to; Ok(()) }
            (from, to) => Err(OrderError::InvalidTransition { from, to }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("only premium users can choose a delivery date")]
    PreferredDateRequiresPremium,
    #[error("cannot cancel a delivered order")]
    CannotCancelDelivered,
    #[error("order is already cancelled")]
    AlreadyCancelled,
    #[error("only delivered orders can be refunded (status is {0})")]
    RefundNotAllowed(OrderStatus),
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("unknown order status {0:?}")]
    UnknownStatus(String),
}
