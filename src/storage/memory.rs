//! In-memory store
//!
//! One `tokio::sync::Mutex` guards every table. A transaction owns the guard for its
//! whole lifetime and works on a copy of the tables that replaces the originals on
//! commit, so transactions are fully serialized and a dropped transaction leaves no
//! trace.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;
use crate::domain::aggregates::{Cart, CartItem, Order, OrderStatus, PremiumSubscription, Product, RatingSummary, Review, User};
use crate::domain::value_objects::Money;
use crate::storage::{Store, Transaction};
use crate::{MarketError, Result};

#[derive(Clone, Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
    subscriptions: HashMap<Uuid, PremiumSubscription>,
    reviews: Vec<Review>,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_product(&self, product: Product) {
        self.tables.lock().await.products.insert(product.id(), product);
    }

    /// Catalog price change; orders already placed keep their snapshot.
    pub async fn set_price(&self, product_id: Uuid, price: Money) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let product = tables.products.get_mut(&product_id).ok_or(MarketError::ProductNotFound(product_id))?;
        product.set_price(price);
        Ok(())
    }

    pub async fn user(&self, id: Uuid) -> Option<User> { self.tables.lock().await.users.get(&id).cloned() }
    pub async fn product(&self, id: Uuid) -> Option<Product> { self.tables.lock().await.products.get(&id).cloned() }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl InMemoryTransaction {
    fn cart_mut(&mut self, cart_id: Uuid) -> Result<&mut Cart> {
        self.working.carts.values_mut().find(|c| c.id() == cart_id).ok_or_else(|| MarketError::Storage(format!("cart {cart_id} does not exist")))
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>> { Ok(self.working.users.get(&id).cloned()) }

    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>> { self.find_user(id).await }

    async fn set_premium_status(&mut self, user_id: Uuid, premium: bool) -> Result<()> {
        let user = self.working.users.get_mut(&user_id).ok_or(MarketError::UserNotFound(user_id))?;
        user.premium_status = premium;
        Ok(())
    }

    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>> { Ok(self.working.products.get(&id).cloned()) }

    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>> { self.find_product(id).await }

    async fn debit_stock(&mut self, product_id: Uuid, qty: u32) -> Result<Option<u32>> {
        Ok(self.working.products.get_mut(&product_id).and_then(|p| p.remove_inventory(qty)))
    }

    async fn credit_stock(&mut self, product_id: Uuid, qty: u32) -> Result<Option<u32>> {
        Ok(self.working.products.get_mut(&product_id).map(|p| p.add_inventory(qty)))
    }

    async fn set_rating(&mut self, product_id: Uuid, rating: RatingSummary) -> Result<()> {
        let product = self.working.products.get_mut(&product_id).ok_or(MarketError::ProductNotFound(product_id))?;
        product.set_rating(rating);
        Ok(())
    }

    async fn find_cart(&mut self, user_id: Uuid) -> Result<Option<Cart>> { Ok(self.working.carts.get(&user_id).cloned()) }

    async fn lock_cart(&mut self, user_id: Uuid) -> Result<Option<Cart>> { self.find_cart(user_id).await }

    async fn ensure_cart(&mut self, cart: &Cart) -> Result<()> {
        self.working.carts.entry(cart.user_id()).or_insert_with(|| cart.clone());
        Ok(())
    }

    async fn add_cart_item(&mut self, cart_id: Uuid, product_id: Uuid, qty: u32) -> Result<CartItem> {
        Ok(self.cart_mut(cart_id)?.add_item(product_id, qty))
    }

    async fn remove_cart_items(&mut self, cart_id: Uuid, item_ids: &[Uuid]) -> Result<u64> {
        Ok(self.cart_mut(cart_id)?.remove_items(item_ids) as u64)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>> { Ok(self.working.orders.get(&id).cloned()) }

    async fn orders_for_user(&mut self, user_id: Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.working.orders.values().filter(|o| o.user_id() == user_id).cloned().collect();
        orders.sort_by(|a, b| b.order_date().cmp(&a.order_date()).then_with(|| b.id().cmp(&a.id())));
        Ok(orders)
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let stored = self.working.orders.get_mut(&order.id()).ok_or(MarketError::OrderNotFound(order.id()))?;
        stored.status = order.status;
        stored.refund = order.refund.clone();
        Ok(())
    }

    async fn has_purchased(&mut self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        Ok(self.working.orders.values().any(|o| {
            o.user_id() == user_id && o.status() != OrderStatus::Cancelled && o.items().iter().any(|i| i.product_id == product_id)
        }))
    }

    async fn find_subscription(&mut self, user_id: Uuid) -> Result<Option<PremiumSubscription>> {
        Ok(self.working.subscriptions.get(&user_id).cloned())
    }

    async fn save_subscription(&mut self, subscription: &PremiumSubscription) -> Result<()> {
        self.working.subscriptions.insert(subscription.user_id, subscription.clone());
        Ok(())
    }

    async fn review_exists(&mut self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        Ok(self.working.reviews.iter().any(|r| r.user_id == user_id && r.product_id == product_id))
    }

    async fn insert_review(&mut self, review: &Review) -> Result<()> {
        if self.review_exists(review.user_id, review.product_id).await? {
            return Err(MarketError::DuplicateReview(review.product_id));
        }
        self.working.reviews.push(review.clone());
        Ok(())
    }

    async fn reviews_for_product(&mut self, product_id: Uuid) -> Result<Vec<Review>> {
        Ok(self.working.reviews.iter().filter(|r| r.product_id == product_id).cloned().collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
