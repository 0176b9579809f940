//! Review aggregator

use std::sync::Arc;
use uuid::Uuid;
use crate::domain::aggregates::{Product, RatingSummary, Review, MAX_RATING, MIN_RATING};
use crate::domain::events::{announce, DomainEvent, EventPublisher};
use crate::storage::{Store, Transaction};
use crate::{MarketError, Result};

#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventPublisher>,
}

/// Folds a rating into a product's aggregate. `product` must have been read with
/// [`Transaction::lock_product`] in the same transaction.
pub async fn record_rating(tx: &mut dyn Transaction, product: &Product, rating: u8) -> Result<RatingSummary> {
    let summary = product.rating().record(rating);
    tx.set_rating(product.id(), summary).await?;
    Ok(summary)
}

impl ReviewService {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventPublisher>) -> Self { Self { store, events } }

    #[tracing::instrument(skip(self, comment))]
    pub async fn add_review(&self, user_id: Uuid, product_id: Uuid, rating: u8, comment: String) -> Result<Review> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) { return Err(MarketError::InvalidRating(rating)); }

        let mut tx = self.store.begin().await?;
        tx.find_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;
        let product = tx.lock_product(product_id).await?.ok_or(MarketError::ProductNotFound(product_id))?;
        if tx.review_exists(user_id, product_id).await? { return Err(MarketError::DuplicateReview(product_id)); }

        let verified = tx.has_purchased(user_id, product_id).await?;
        let review = Review::new(user_id, product_id, rating, comment, verified);
        tx.insert_review(&review).await?;
        let summary = record_rating(tx.as_mut(), &product, rating).await?;
        tx.commit().await?;

        tracing::info!(review_id = %review.id, review_count = summary.review_count, average_rating = summary.average_rating, "review added");
        announce(self.events.as_ref(), DomainEvent::ReviewAdded {
            product_id, user_id, rating, review_count: summary.review_count, average_rating: summary.average_rating,
        }).await;
        Ok(review)
    }

    pub async fn can_user_review(&self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        tx.find_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;
        tx.find_product(product_id).await?.ok_or(MarketError::ProductNotFound(product_id))?;
        Ok(!tx.review_exists(user_id, product_id).await?)
    }

    pub async fn product_reviews(&self, product_id: Uuid) -> Result<Vec<Review>> {
        let mut tx = self.store.begin().await?;
        tx.find_product(product_id).await?.ok_or(MarketError::ProductNotFound(product_id))?;
        tx.reviews_for_product(product_id).await
    }
}
