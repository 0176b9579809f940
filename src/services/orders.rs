//! Order lifecycle engine
//!
//! Checkout turns the user's cart into an order in one transaction: availability is
//! checked for every line before any write, then the order is stored, stock is
//! debited through the inventory ledger and the cart is emptied. Any failure drops
//! the transaction and leaves nothing behind.

use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::{CartLine, Order, OrderItem, OrderStatus, Placement};
use crate::domain::events::{announce, DomainEvent, EventPublisher};
use crate::domain::value_objects::{Address, Money};
use crate::services::discounts::{DiscountPolicy, NoDiscount};
use crate::services::{carts, inventory, subscriptions};
use crate::storage::Store;
use crate::{MarketError, Result};

pub const DEFAULT_PAYMENT_METHOD: &str = "COD";

/// Charges applied on top of the item total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Charged to non-premium users; premium delivery is free.
    pub delivery_charge: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self { Self { delivery_charge: Money::units(50) } }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlaceOrder {
    pub address: Address,
    pub preferred_delivery_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub coupon_code: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventPublisher>,
    discounts: Arc<dyn DiscountPolicy>,
    pricing: PricingPolicy,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventPublisher>) -> Self {
        Self { store, events, discounts: Arc::new(NoDiscount), pricing: PricingPolicy::default() }
    }

    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self { self.pricing = pricing; self }
    pub fn with_discounts(mut self, discounts: Arc<dyn DiscountPolicy>) -> Self { self.discounts = discounts; self }

    #[tracing::instrument(skip(self, request))]
    pub async fn place_order(&self, user_id: Uuid, request: PlaceOrder) -> Result<Order> {
        request.address.validate()?;
        let coupon_code = request.coupon_code.filter(|c| !c.trim().is_empty());

        let mut tx = self.store.begin().await?;
        tx.find_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;
        let cart = tx.lock_cart(user_id).await?.ok_or(MarketError::CartNotFound(user_id))?;
        if cart.is_empty() { return Err(MarketError::EmptyCart); }

        let lines = carts::load_lines(tx.as_mut(), &cart).await?;
        for line in &lines {
            if !line.product.has_stock_for(line.item.quantity) {
                return Err(MarketError::InsufficientStock {
                    product_id: line.product.id(), available: line.product.stock_quantity(), requested: line.item.quantity,
                });
            }
        }

        let premium = subscriptions::is_premium_in(tx.as_mut(), user_id).await?;
        let total: Money = lines.iter().map(CartLine::line_total).sum();
        let discount = self.discounts.discount(&lines, total, coupon_code.as_deref());
        let placement = Placement {
            user_id,
            shipping_address: request.address,
            payment_method: request.payment_method.unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            coupon_code,
            preferred_delivery_date: request.preferred_delivery_date,
            premium,
            delivery_charge: self.pricing.delivery_charge,
            discount,
        };
        let order = Order::place(placement, &lines)?;

        tx.insert_order(&order).await?;
        for item in by_product(order.items()) {
            inventory::debit(tx.as_mut(), item.product_id, item.quantity).await?;
        }
        tx.remove_cart_items(cart.id(), &cart.item_ids()).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id(), final_amount = %order.final_amount(), premium, items = order.items().len(), "order placed");
        announce(self.events.as_ref(), DomainEvent::OrderPlaced {
            order_id: order.id(), user_id, final_amount: order.final_amount(), priority: order.priority(),
        }).await;
        Ok(order)
    }

    /// Cancels an order of `user_id` and returns every item's quantity to stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx.find_order(order_id).await?.filter(|o| o.user_id() == user_id).ok_or(MarketError::OrderNotFound(order_id))?;
        order.cancel()?;
        for item in by_product(order.items()) {
            inventory::credit(tx.as_mut(), item.product_id, item.quantity).await?;
        }
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(%order_id, "order cancelled");
        announce(self.events.as_ref(), DomainEvent::OrderCancelled { order_id, user_id }).await;
        Ok(order)
    }

    /// Refunds a delivered order. Delivered goods are not returned to stock.
    #[tracing::instrument(skip(self, reason))]
    pub async fn request_refund(&self, order_id: Uuid, user_id: Uuid, reason: String) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx.find_order(order_id).await?.filter(|o| o.user_id() == user_id).ok_or(MarketError::OrderNotFound(order_id))?;
        order.request_refund(reason.clone())?;
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(%order_id, "refund requested");
        announce(self.events.as_ref(), DomainEvent::RefundRequested { order_id, user_id, reason }).await;
        Ok(order)
    }

    /// Fulfillment-side status change; not scoped to a user.
    #[tracing::instrument(skip(self))]
    pub async fn advance_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx.find_order(order_id).await?.ok_or(MarketError::OrderNotFound(order_id))?;
        order.advance(status)?;
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(%order_id, %status, "order status changed");
        announce(self.events.as_ref(), DomainEvent::OrderStatusChanged { order_id, status }).await;
        Ok(order)
    }

    pub async fn get_orders(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let mut tx = self.store.begin().await?;
        tx.find_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;
        tx.orders_for_user(user_id).await
    }

    pub async fn get_order(&self, order_id: Uuid, user_id: Uuid) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        tx.find_order(order_id).await?.filter(|o| o.user_id() == user_id).ok_or(MarketError::OrderNotFound(order_id))
    }
}

/// Stock rows are always touched in product id order so concurrent checkouts and
/// cancellations lock them in the same sequence.
fn by_product(items: &[OrderItem]) -> Vec<&OrderItem> {
    let mut sorted: Vec<&OrderItem> = items.iter().collect();
    sorted.sort_by_key(|item| item.product_id);
    sorted
}
