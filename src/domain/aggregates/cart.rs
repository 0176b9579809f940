//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Money;

/// One cart per user. The row survives checkout; only its items are removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: Uuid,
    user_id: Uuid,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
}

/// A cart item joined with the product as currently listed in the catalog.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    /// Priced at the current catalog price, not the price when the item was added.
    pub fn line_total(&self) -> Money { self.product.price().multiply(self.item.quantity) }
}

impl Cart {
    pub fn for_user(user_id: Uuid) -> Self {
        Self { id: Uuid::now_v7(), user_id, items: vec![], created_at: Utc::now() }
    }

    pub fn restore(id: Uuid, user_id: Uuid, items: Vec<CartItem>, created_at: DateTime<Utc>) -> Self {
        Self { id, user_id, items, created_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Adds `quantity` of a product, merging into an existing line for the same product.
    pub fn add_item(&mut self, product_id: Uuid, quantity: u32) -> CartItem {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return existing.clone();
        }
        let item = CartItem { id: Uuid::now_v7(), product_id, quantity };
        self.items.push(item.clone());
        item
    }

    pub fn item_ids(&self) -> Vec<Uuid> { self.items.iter().map(|i| i.id).collect() }

    /// Removes the listed items and returns how many were present.
    pub fn remove_items(&mut self, item_ids: &[Uuid]) -> usize {
        let before = self.items.len();
        self.items.retain(|i| !item_ids.contains(&i.id));
        before - self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::for_user(Uuid::now_v7());
        let product = Uuid::now_v7();
        cart.add_item(product, 2);
        assert_eq!(cart.item_count(), 1);
        let merged = cart.add_item(product, 1);
        assert_eq!(merged.quantity, 3);
        assert_eq!(cart.items()[0].quantity, 3);
        let ordered = cart.item_ids();
        let late = cart.add_item(Uuid::now_v7(), 1);
        assert_eq!(cart.remove_items(&ordered), 1);
        assert_eq!(cart.items(), &[late]);
        assert_eq!(cart.remove_items(&ordered), 0);
    }

    #[test]
    fn test_line_total_uses_catalog_price() {
        let product = Product::create(Uuid::now_v7(), "Widget", Money::units(100), 5);
        let line = CartLine { item: CartItem { id: Uuid::now_v7(), product_id: product.id(), quantity: 2 }, product };
        assert_eq!(line.line_total(), Money::units(200));
    }
}
