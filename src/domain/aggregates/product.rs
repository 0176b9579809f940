//! Product Aggregate
//!
//! Stock and rating aggregates are only mutated through the crate-internal methods
//! below, which the storage backends call on behalf of the inventory ledger and
//! the review aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::review::RatingSummary;
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    seller_id: Uuid,
    name: String,
    price: Money,
    stock: Quantity,
    rating: RatingSummary,
    created_at: DateTime<Utc>,
}

impl Product {
    pub fn create(seller_id: Uuid, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: Uuid::now_v7(), seller_id, name: name.into(), price, stock: Quantity::new(stock),
            rating: RatingSummary::default(), created_at: Utc::now(),
        }
    }

    /// Rebuilds a product from persisted columns.
    pub fn restore(id: Uuid, seller_id: Uuid, name: String, price: Money, stock: u32, rating: RatingSummary, created_at: DateTime<Utc>) -> Self {
        Self { id, seller_id, name, price, stock: Quantity::new(stock), rating, created_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn seller_id(&self) -> Uuid { self.seller_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> Money { self.price }
    pub fn stock_quantity(&self) -> u32 { self.stock.value() }
    pub fn rating(&self) -> RatingSummary { self.rating }
    pub fn review_count(&self) -> u32 { self.rating.review_count }
    pub fn average_rating(&self) -> f64 { self.rating.average_rating }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }
    pub fn has_stock_for(&self, qty: u32) -> bool { self.stock.covers(qty) }

    pub(crate) fn set_price(&mut self, price: Money) { self.price = price; }

    pub(crate) fn add_inventory(&mut self, qty: u32) -> u32 {
        self.stock = self.stock.add(qty);
        self.stock.value()
    }

    /// Returns `None` and leaves stock untouched when `qty` exceeds the stock on hand.
    pub(crate) fn remove_inventory(&mut self, qty: u32) -> Option<u32> {
        self.stock = self.stock.subtract(qty)?;
        Some(self.stock.value())
    }

    pub(crate) fn set_rating(&mut self, rating: RatingSummary) { self.rating = rating; }
}
