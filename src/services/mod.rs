//! Application services. Each public operation runs in one storage transaction.
pub mod carts;
pub mod discounts;
pub mod inventory;
pub mod orders;
pub mod reviews;
pub mod subscriptions;

pub use carts::CartService;
pub use discounts::{DiscountPolicy, NoDiscount};
pub use orders::{OrderService, PlaceOrder, PricingPolicy};
pub use reviews::ReviewService;
pub use subscriptions::SubscriptionService;
