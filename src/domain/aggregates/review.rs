//! Review Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(user_id: Uuid, product_id: Uuid, rating: u8, comment: impl Into<String>, verified_purchase: bool) -> Self {
        Self { id: Uuid::now_v7(), user_id, product_id, rating, comment: comment.into(), verified_purchase, created_at: Utc::now() }
    }
}

/// Running review count and mean rating of a product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub review_count: u32,
    pub average_rating: f64,
}

impl RatingSummary {
    /// Folds one more rating into the running mean.
    pub fn record(self, rating: u8) -> Self {
        let old_count = f64::from(self.review_count);
        let review_count = self.review_count.saturating_add(1);
        let average_rating = (self.average_rating * old_count + f64::from(rating)) / f64::from(review_count);
        Self { review_count, average_rating }
    }
}
