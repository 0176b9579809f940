//! Storage seam
//!
//! A [`Store`] hands out [`Transaction`]s. All reads and writes of one service
//! operation go through a single transaction; dropping it without calling
//! [`Transaction::commit`] discards every write it made.

use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, CartItem, Order, PremiumSubscription, Product, RatingSummary, Review, User};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

#[async_trait]
pub trait Transaction: Send {
    // Users
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>>;
    /// Reads the user and holds it exclusively until the transaction ends.
    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>>;
    async fn set_premium_status(&mut self, user_id: Uuid, premium: bool) -> Result<()>;

    // Products
    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>>;
    /// Reads the product and holds it exclusively until the transaction ends.
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>>;
    /// Conditional decrement. `None` when the product is missing or holds fewer than `qty` units.
    async fn debit_stock(&mut self, product_id: Uuid, qty: u32) -> Result<Option<u32>>;
    /// `None` when the product is missing.
    async fn credit_stock(&mut self, product_id: Uuid, qty: u32) -> Result<Option<u32>>;
    async fn set_rating(&mut self, product_id: Uuid, rating: RatingSummary) -> Result<()>;

    // Carts
    async fn find_cart(&mut self, user_id: Uuid) -> Result<Option<Cart>>;
    /// Reads the user's cart with its items and holds it exclusively until the
    /// transaction ends. Checkout and cart edits for one user are serialized on this.
    async fn lock_cart(&mut self, user_id: Uuid) -> Result<Option<Cart>>;
    /// Inserts the cart unless the user already has one.
    async fn ensure_cart(&mut self, cart: &Cart) -> Result<()>;
    /// Adds to the quantity of an existing line for the product, or inserts a new line.
    async fn add_cart_item(&mut self, cart_id: Uuid, product_id: Uuid, qty: u32) -> Result<CartItem>;
    /// Deletes the given items of the cart; other items stay.
    async fn remove_cart_items(&mut self, cart_id: Uuid, item_ids: &[Uuid]) -> Result<u64>;

    // Orders
    async fn insert_order(&mut self, order: &Order) -> Result<()>;
    /// Locks the order row until the transaction ends.
    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>>;
    async fn orders_for_user(&mut self, user_id: Uuid) -> Result<Vec<Order>>;
    /// Persists status and refund bookkeeping. Items are never rewritten.
    async fn update_order(&mut self, order: &Order) -> Result<()>;
    /// True when a non-cancelled order of the user contains the product.
    async fn has_purchased(&mut self, user_id: Uuid, product_id: Uuid) -> Result<bool>;

    // Subscriptions
    async fn find_subscription(&mut self, user_id: Uuid) -> Result<Option<PremiumSubscription>>;
    async fn save_subscription(&mut self, subscription: &PremiumSubscription) -> Result<()>;

    // Reviews
    async fn review_exists(&mut self, user_id: Uuid, product_id: Uuid) -> Result<bool>;
    async fn insert_review(&mut self, review: &Review) -> Result<()>;
    async fn reviews_for_product(&mut self, product_id: Uuid) -> Result<Vec<Review>>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
