//! PostgreSQL store
//!
//! Stock debit is a conditional `UPDATE` so two checkouts racing for the last unit
//! cannot both succeed. Rows whose new value is computed from their old value are
//! read with `FOR UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;
use crate::domain::aggregates::{
    Cart, CartItem, Order, OrderItem, OrderStatus, PremiumSubscription, Product, RatingSummary, RefundRequest, Review,
    SubscriptionPlan, User,
};
use crate::domain::value_objects::{Address, Money};
use crate::storage::{Store, Transaction};
use crate::{MarketError, Result};

const ORDER_COLUMNS: &str = "id, user_id, shipping_address, order_date, status, payment_method, coupon_code, total_amount, \
    delivery_charge, discount, final_amount, priority, preferred_delivery_date, refund_reason, refund_requested_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, seller_id, product_name, quantity, price, discount_at_purchase";
const PRODUCT_COLUMNS: &str = "id, seller_id, name, price, stock_quantity, review_count, average_rating, created_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| MarketError::Storage(e.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(PgTransaction { tx: self.pool.begin().await? }))
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn to_db(qty: u32) -> Result<i32> { i32::try_from(qty).map_err(|_| MarketError::InvalidQuantity) }

fn from_db(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| MarketError::Storage(format!("negative quantity {value} in storage")))
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User { id: row.try_get("id")?, name: row.try_get("name")?, email: row.try_get("email")?, premium_status: row.try_get("premium_status")? })
}

fn product_from_row(row: &PgRow) -> Result<Product> {
    let rating = RatingSummary { review_count: from_db(row.try_get("review_count")?)?, average_rating: row.try_get("average_rating")? };
    Ok(Product::restore(
        row.try_get("id")?, row.try_get("seller_id")?, row.try_get("name")?, Money::new(row.try_get("price")?),
        from_db(row.try_get("stock_quantity")?)?, rating, row.try_get("created_at")?,
    ))
}

fn item_from_row(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: row.try_get("id")?, order_id: row.try_get("order_id")?, product_id: row.try_get("product_id")?,
        seller_id: row.try_get("seller_id")?, product_name: row.try_get("product_name")?,
        quantity: from_db(row.try_get("quantity")?)?, price: Money::new(row.try_get("price")?),
        discount_at_purchase: Money::new(row.try_get("discount_at_purchase")?),
    })
}

fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let Json(shipping_address): Json<Address> = row.try_get("shipping_address")?;
    let status: String = row.try_get("status")?;
    let refund_reason: Option<String> = row.try_get("refund_reason")?;
    let refund_requested_at: Option<DateTime<Utc>> = row.try_get("refund_requested_at")?;
    Ok(Order {
        id: row.try_get("id")?, user_id: row.try_get("user_id")?, shipping_address, order_date: row.try_get("order_date")?,
        status: status.parse::<OrderStatus>()?, payment_method: row.try_get("payment_method")?, coupon_code: row.try_get("coupon_code")?,
        total_amount: Money::new(row.try_get("total_amount")?), delivery_charge: Money::new(row.try_get("delivery_charge")?),
        discount: Money::new(row.try_get("discount")?), final_amount: Money::new(row.try_get("final_amount")?),
        priority: row.try_get("priority")?, preferred_delivery_date: row.try_get("preferred_delivery_date")?,
        refund: refund_reason.zip(refund_requested_at).map(|(reason, requested_at)| RefundRequest { reason, requested_at }),
        items,
    })
}

fn subscription_from_row(row: &PgRow) -> Result<PremiumSubscription> {
    let plan: String = row.try_get("plan_type")?;
    Ok(PremiumSubscription {
        id: row.try_get("id")?, user_id: row.try_get("user_id")?,
        plan_type: plan.parse::<SubscriptionPlan>().map_err(MarketError::Storage)?,
        start_date: row.try_get("start_date")?, end_date: row.try_get("end_date")?,
        active: row.try_get("active")?, auto_renew: row.try_get("auto_renew")?,
    })
}

fn review_from_row(row: &PgRow) -> Result<Review> {
    let rating: i16 = row.try_get("rating")?;
    Ok(Review {
        id: row.try_get("id")?, user_id: row.try_get("user_id")?, product_id: row.try_get("product_id")?,
        rating: u8::try_from(rating).map_err(|_| MarketError::Storage(format!("rating {rating} out of range")))?,
        comment: row.try_get("comment")?, verified_purchase: row.try_get("verified_purchase")?, created_at: row.try_get("created_at")?,
    })
}

impl PgTransaction {
    async fn items_for_orders(&mut self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
        let rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"))
            .bind(order_ids)
            .fetch_all(&mut *self.tx)
            .await?;
        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = item_from_row(row)?;
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn fetch_user(&mut self, id: Uuid, lock: bool) -> Result<Option<User>> {
        let sql = format!("SELECT id, name, email, premium_status FROM users WHERE id = $1{}", if lock { " FOR UPDATE" } else { "" });
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn fetch_product(&mut self, id: Uuid, lock: bool) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1{}", if lock { " FOR UPDATE" } else { "" });
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn fetch_cart(&mut self, user_id: Uuid, lock: bool) -> Result<Option<Cart>> {
        let sql = format!("SELECT id, user_id, created_at FROM carts WHERE user_id = $1{}", if lock { " FOR UPDATE" } else { "" });
        let Some(row) = sqlx::query(&sql).bind(user_id).fetch_optional(&mut *self.tx).await? else {
            return Ok(None);
        };
        let cart_id: Uuid = row.try_get("id")?;
        let rows = sqlx::query("SELECT id, product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY id")
            .bind(cart_id)
            .fetch_all(&mut *self.tx)
            .await?;
        let items = rows
            .iter()
            .map(|r| Ok(CartItem { id: r.try_get("id")?, product_id: r.try_get("product_id")?, quantity: from_db(r.try_get("quantity")?)? }))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Cart::restore(cart_id, row.try_get("user_id")?, items, row.try_get("created_at")?)))
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>> { self.fetch_user(id, false).await }

    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>> { self.fetch_user(id, true).await }

    async fn set_premium_status(&mut self, user_id: Uuid, premium: bool) -> Result<()> {
        let result = sqlx::query("UPDATE users SET premium_status = $2 WHERE id = $1")
            .bind(user_id)
            .bind(premium)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 { return Err(MarketError::UserNotFound(user_id)); }
        Ok(())
    }

    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>> { self.fetch_product(id, false).await }

    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>> { self.fetch_product(id, true).await }

    async fn debit_stock(&mut self, product_id: Uuid, qty: u32) -> Result<Option<u32>> {
        let remaining: Option<i32> = sqlx::query_scalar(
            "UPDATE products SET stock_quantity = stock_quantity - $2 WHERE id = $1 AND stock_quantity >= $2 RETURNING stock_quantity",
        )
        .bind(product_id)
        .bind(to_db(qty)?)
        .fetch_optional(&mut *self.tx)
        .await?;
        remaining.map(from_db).transpose()
    }

    async fn credit_stock(&mut self, product_id: Uuid, qty: u32) -> Result<Option<u32>> {
        let stock: Option<i32> = sqlx::query_scalar("UPDATE products SET stock_quantity = stock_quantity + $2 WHERE id = $1 RETURNING stock_quantity")
            .bind(product_id)
            .bind(to_db(qty)?)
            .fetch_optional(&mut *self.tx)
            .await?;
        stock.map(from_db).transpose()
    }

    async fn set_rating(&mut self, product_id: Uuid, rating: RatingSummary) -> Result<()> {
        let result = sqlx::query("UPDATE products SET review_count = $2, average_rating = $3 WHERE id = $1")
            .bind(product_id)
            .bind(i32::try_from(rating.review_count).map_err(|_| MarketError::Storage("review count overflow".into()))?)
            .bind(rating.average_rating)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 { return Err(MarketError::ProductNotFound(product_id)); }
        Ok(())
    }

    async fn find_cart(&mut self, user_id: Uuid) -> Result<Option<Cart>> { self.fetch_cart(user_id, false).await }

    async fn lock_cart(&mut self, user_id: Uuid) -> Result<Option<Cart>> { self.fetch_cart(user_id, true).await }

    async fn ensure_cart(&mut self, cart: &Cart) -> Result<()> {
        sqlx::query("INSERT INTO carts (id, user_id, created_at) VALUES ($1, $2, $3) ON CONFLICT (user_id) DO NOTHING")
            .bind(cart.id())
            .bind(cart.user_id())
            .bind(cart.created_at())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn add_cart_item(&mut self, cart_id: Uuid, product_id: Uuid, qty: u32) -> Result<CartItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING id, product_id, quantity
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(cart_id)
        .bind(product_id)
        .bind(to_db(qty)?)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(CartItem { id: row.try_get("id")?, product_id: row.try_get("product_id")?, quantity: from_db(row.try_get("quantity")?)? })
    }

    async fn remove_cart_items(&mut self, cart_id: Uuid, item_ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = ANY($2)")
            .bind(cart_id)
            .bind(item_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"))
            .bind(order.id())
            .bind(order.user_id())
            .bind(Json(order.shipping_address()))
            .bind(order.order_date())
            .bind(order.status().as_str())
            .bind(order.payment_method())
            .bind(order.coupon_code())
            .bind(order.total_amount().amount())
            .bind(order.delivery_charge().amount())
            .bind(order.discount().amount())
            .bind(order.final_amount().amount())
            .bind(order.priority())
            .bind(order.preferred_delivery_date())
            .bind(order.refund().map(|r| r.reason.clone()))
            .bind(order.refund().map(|r| r.requested_at))
            .execute(&mut *self.tx)
            .await?;
        for item in order.items() {
            sqlx::query(&format!("INSERT INTO order_items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"))
                .bind(item.id)
                .bind(item.order_id)
                .bind(item.product_id)
                .bind(item.seller_id)
                .bind(&item.product_name)
                .bind(to_db(item.quantity)?)
                .bind(item.price.amount())
                .bind(item.discount_at_purchase.amount())
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        let Some(row) = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };
        let mut items = self.items_for_orders(&[id]).await?;
        order_from_row(&row, items.remove(&id).unwrap_or_default()).map(Some)
    }

    async fn orders_for_user(&mut self, user_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY order_date DESC, id DESC"))
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        let ids = rows.iter().map(|r| r.try_get::<Uuid, _>("id")).collect::<std::result::Result<Vec<_>, _>>()?;
        let mut items = self.items_for_orders(&ids).await?;
        rows.iter()
            .zip(&ids)
            .map(|(row, id)| order_from_row(row, items.remove(id).unwrap_or_default()))
            .collect()
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, refund_reason = $3, refund_requested_at = $4 WHERE id = $1")
            .bind(order.id())
            .bind(order.status().as_str())
            .bind(order.refund().map(|r| r.reason.clone()))
            .bind(order.refund().map(|r| r.requested_at))
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 { return Err(MarketError::OrderNotFound(order.id())); }
        Ok(())
    }

    async fn has_purchased(&mut self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        let purchased: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM orders o JOIN order_items i ON i.order_id = o.id
                WHERE o.user_id = $1 AND i.product_id = $2 AND o.status <> 'CANCELLED'
            )
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(purchased)
    }

    async fn find_subscription(&mut self, user_id: Uuid) -> Result<Option<PremiumSubscription>> {
        let row = sqlx::query("SELECT id, user_id, plan_type, start_date, end_date, active, auto_renew FROM premium_subscriptions WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn save_subscription(&mut self, s: &PremiumSubscription) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO premium_subscriptions (id, user_id, plan_type, start_date, end_date, active, auto_renew)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET plan_type = EXCLUDED.plan_type, start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date, active = EXCLUDED.active, auto_renew = EXCLUDED.auto_renew
            "#,
        )
        .bind(s.id)
        .bind(s.user_id)
        .bind(s.plan_type.as_str())
        .bind(s.start_date)
        .bind(s.end_date)
        .bind(s.active)
        .bind(s.auto_renew)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn review_exists(&mut self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM reviews WHERE user_id = $1 AND product_id = $2)")
            .bind(user_id)
            .bind(product_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn insert_review(&mut self, review: &Review) -> Result<()> {
        sqlx::query(
            "INSERT INTO reviews (id, user_id, product_id, rating, comment, verified_purchase, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.product_id)
        .bind(i16::from(review.rating))
        .bind(&review.comment)
        .bind(review.verified_purchase)
        .bind(review.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => MarketError::DuplicateReview(review.product_id),
            other => MarketError::Database(other),
        })?;
        Ok(())
    }

    async fn reviews_for_product(&mut self, product_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query("SELECT id, user_id, product_id, rating, comment, verified_purchase, created_at FROM reviews WHERE product_id = $1 ORDER BY created_at DESC")
            .bind(product_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(review_from_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
