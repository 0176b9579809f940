//! Aggregates module
pub mod user;
pub mod product;
pub mod cart;
pub mod order;
pub mod subscription;
pub mod review;

pub use user::User;
pub use product::Product;
pub use cart::{Cart, CartItem, CartLine};
pub use order::{Order, OrderError, OrderItem, OrderStatus, Placement, RefundRequest};
pub use subscription::{PremiumSubscription, SubscriptionPlan};
pub use review::{RatingSummary, Review, MAX_RATING, MIN_RATING};
