//! Marketplace Core
//!
//! Order placement and inventory consistency engine for an online marketplace.
//!
//! ## Features
//! - Cart-to-order checkout with all-or-nothing stock debit
//! - Premium subscription gating of delivery charge, priority and delivery dates
//! - Order cancellation with stock restoration, refund requests
//! - Incremental review rating aggregation
//!
//! Every public service operation runs inside a single storage transaction; see
//! [`storage::Store`].

use thiserror::Error;
use uuid::Uuid;

pub mod config;
pub mod domain;
pub mod http;
pub mod services;
pub mod storage;

pub use domain::aggregates::{
    Cart, CartItem, CartLine, Order, OrderItem, OrderStatus, PremiumSubscription, Product, RatingSummary,
    RefundRequest, Review, SubscriptionPlan, User,
};
pub use domain::value_objects::{Address, Money};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Cart not found for user {0}")]
    CartNotFound(Uuid),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock { product_id: Uuid, available: u32, requested: u32 },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid rating {0}: must be between 1 and 5")]
    InvalidRating(u8),

    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid order state: {0}")]
    InvalidState(String),

    #[error("User already has an active premium subscription")]
    AlreadySubscribed,

    #[error("No active subscription found")]
    NoActiveSubscription,

    #[error("User has already reviewed product {0}")]
    DuplicateReview(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failure classes callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    StateConflict,
    NoActiveSubscription,
    Internal,
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_) | Self::ProductNotFound(_) | Self::CartNotFound(_) | Self::OrderNotFound(_) => ErrorKind::NotFound,
            Self::EmptyCart
            | Self::InsufficientStock { .. }
            | Self::PermissionDenied(_)
            | Self::InvalidRating(_)
            | Self::InvalidQuantity
            | Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidState(_) | Self::AlreadySubscribed | Self::DuplicateReview(_) => ErrorKind::StateConflict,
            Self::NoActiveSubscription => ErrorKind::NoActiveSubscription,
            Self::Database(_) | Self::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<domain::aggregates::OrderError> for MarketError {
    fn from(err: domain::aggregates::OrderError) -> Self {
        use domain::aggregates::OrderError;
        match err {
            OrderError::NoItems => Self::EmptyCart,
            OrderError::PreferredDateRequiresPremium => Self::PermissionDenied(err.to_string()),
            OrderError::UnknownStatus(_) => Self::Storage(err.to_string()),
            OrderError::CannotCancelDelivered
            | OrderError::AlreadyCancelled
            | OrderError::RefundNotAllowed(_)
            | OrderError::InvalidTransition { .. } => Self::InvalidState(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for MarketError {
    fn from(err: validator::ValidationErrors) -> Self { Self::Validation(err.to_string()) }
}

pub type Result<T> = std::result::Result<T, MarketError>;
