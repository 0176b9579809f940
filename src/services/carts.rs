//! Cart lines

use std::sync::Arc;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, CartItem, CartLine};
use crate::storage::{Store, Transaction};
use crate::{MarketError, Result};

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    /// Adds a product to the user's cart, creating the cart on first use.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: u32) -> Result<CartItem> {
        if quantity == 0 { return Err(MarketError::InvalidQuantity); }
        let mut tx = self.store.begin().await?;
        tx.find_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;
        tx.find_product(product_id).await?.ok_or(MarketError::ProductNotFound(product_id))?;
        let cart = match tx.lock_cart(user_id).await? {
            Some(cart) => cart,
            None => {
                tx.ensure_cart(&Cart::for_user(user_id)).await?;
                tx.lock_cart(user_id).await?.ok_or_else(|| MarketError::Storage(format!("cart of user {user_id} missing after insert")))?
            }
        };
        let item = tx.add_cart_item(cart.id(), product_id, quantity).await?;
        tx.commit().await?;
        tracing::info!(cart_id = %cart.id(), quantity = item.quantity, "cart updated");
        Ok(item)
    }

    /// The user's cart priced at current catalog prices.
    pub async fn cart(&self, user_id: Uuid) -> Result<Vec<CartLine>> {
        let mut tx = self.store.begin().await?;
        let cart = tx.find_cart(user_id).await?.ok_or(MarketError::CartNotFound(user_id))?;
        load_lines(tx.as_mut(), &cart).await
    }
}

/// Joins each cart item with the product as currently listed.
pub(crate) async fn load_lines(tx: &mut dyn Transaction, cart: &Cart) -> Result<Vec<CartLine>> {
    let mut lines = Vec::with_capacity(cart.item_count());
    for item in cart.items() {
        let product = tx.find_product(item.product_id).await?.ok_or(MarketError::ProductNotFound(item.product_id))?;
        lines.push(CartLine { item: item.clone(), product });
    }
    Ok(lines)
}
