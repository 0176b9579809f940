//! Inventory ledger
//!
//! The only path by which stock quantities change. Both operations run inside the
//! caller's transaction; the debit is re-validated by the store at mutation time, so
//! an earlier availability check by the caller is advisory.

use uuid::Uuid;
use crate::storage::Transaction;
use crate::{MarketError, Result};

/// Removes `qty` units from a product, returning the remaining stock.
pub async fn debit(tx: &mut dyn Transaction, product_id: Uuid, qty: u32) -> Result<u32> {
    if qty == 0 { return Err(MarketError::InvalidQuantity); }
    if let Some(remaining) = tx.debit_stock(product_id, qty).await? {
        tracing::debug!(%product_id, qty, remaining, "stock debited");
        return Ok(remaining);
    }
    let product = tx.find_product(product_id).await?.ok_or(MarketError::ProductNotFound(product_id))?;
    Err(MarketError::InsufficientStock { product_id, available: product.stock_quantity(), requested: qty })
}

/// Returns `qty` units to a product, returning the new stock.
pub async fn credit(tx: &mut dyn Transaction, product_id: Uuid, qty: u32) -> Result<u32> {
    let stock = tx.credit_stock(product_id, qty).await?.ok_or(MarketError::ProductNotFound(product_id))?;
    tracing::debug!(%product_id, qty, stock, "stock credited");
    Ok(stock)
}
