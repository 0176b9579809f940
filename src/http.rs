//! HTTP API
//!
//! The acting user is taken from the `X-USER-ID` header; authentication happens
//! upstream of this service.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::{CartItem, CartLine, Order, OrderStatus, PremiumSubscription, Review, SubscriptionPlan};
use crate::domain::events::EventPublisher;
use crate::domain::value_objects::Money;
use crate::services::{CartService, OrderService, PlaceOrder, PricingPolicy, ReviewService, SubscriptionService};
use crate::storage::Store;
use crate::{ErrorKind, MarketError};

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub subscriptions: SubscriptionService,
    pub reviews: ReviewService,
    pub carts: CartService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventPublisher>, pricing: PricingPolicy) -> Self {
        Self {
            orders: OrderService::new(store.clone(), events.clone()).with_pricing(pricing),
            subscriptions: SubscriptionService::new(store.clone(), events.clone()),
            reviews: ReviewService::new(store.clone(), events),
            carts: CartService::new(store),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "marketplace-core"})) }))
        .route("/api/v1/cart", get(get_cart).post(add_to_cart))
        .route("/api/v1/orders", get(list_orders).post(place_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/cancel", post(cancel_order))
        .route("/api/v1/orders/:id/refund", post(request_refund))
        .route("/api/v1/admin/orders/:id/status", put(advance_status))
        .route("/api/v1/subscription", get(get_subscription))
        .route("/api/v1/subscription/subscribe", post(subscribe))
        .route("/api/v1/subscription/cancel", delete(cancel_subscription))
        .route("/api/v1/products/:id/reviews", get(product_reviews).post(add_review))
        .route("/api/v1/products/:id/reviews/eligibility", get(review_eligibility))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody { error: String, code: &'static str }

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let (status, code) = match (&self, self.kind()) {
            (MarketError::PermissionDenied(_), _) => (StatusCode::FORBIDDEN, "permission_denied"),
            (_, ErrorKind::NotFound) => (StatusCode::NOT_FOUND, "not_found"),
            (_, ErrorKind::Validation) => (StatusCode::BAD_REQUEST, "validation"),
            (_, ErrorKind::StateConflict) => (StatusCode::CONFLICT, "state_conflict"),
            (_, ErrorKind::NoActiveSubscription) => (StatusCode::NOT_FOUND, "no_active_subscription"),
            (_, ErrorKind::Internal) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { error, code })).into_response()
    }
}

/// The authenticated user making the request.
#[derive(Clone, Copy, Debug)]
pub struct ActingUser(pub Uuid);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(ActingUser)
            .ok_or_else(|| MarketError::Validation("missing or malformed X-USER-ID header".to_string()))
    }
}

type ApiResult<T> = Result<T, MarketError>;

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartView { pub lines: Vec<CartLine>, pub total: Money }

async fn get_cart(State(s): State<AppState>, ActingUser(user): ActingUser) -> ApiResult<Json<CartView>> {
    let lines = s.carts.cart(user).await?;
    let total = lines.iter().map(CartLine::line_total).sum();
    Ok(Json(CartView { lines, total }))
}

async fn add_to_cart(State(s): State<AppState>, ActingUser(user): ActingUser, Json(req): Json<AddToCartRequest>) -> ApiResult<(StatusCode, Json<CartItem>)> {
    req.validate()?;
    Ok((StatusCode::CREATED, Json(s.carts.add_to_cart(user, req.product_id, req.quantity).await?)))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RefundBody {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody { pub status: OrderStatus }

async fn list_orders(State(s): State<AppState>, ActingUser(user): ActingUser) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.orders.get_orders(user).await?))
}

async fn place_order(State(s): State<AppState>, ActingUser(user): ActingUser, Json(req): Json<PlaceOrder>) -> ApiResult<(StatusCode, Json<Order>)> {
    Ok((StatusCode::CREATED, Json(s.orders.place_order(user, req).await?)))
}

async fn get_order(State(s): State<AppState>, ActingUser(user): ActingUser, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.get_order(id, user).await?))
}

async fn cancel_order(State(s): State<AppState>, ActingUser(user): ActingUser, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.cancel_order(id, user).await?))
}

async fn request_refund(State(s): State<AppState>, ActingUser(user): ActingUser, Path(id): Path<Uuid>, Json(req): Json<RefundBody>) -> ApiResult<Json<Order>> {
    req.validate()?;
    Ok(Json(s.orders.request_refund(id, user, req.reason).await?))
}

async fn advance_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<StatusBody>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.advance_status(id, req.status).await?))
}

// =============================================================================
// Subscription
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SubscribeBody { pub plan_type: SubscriptionPlan }

#[derive(Debug, Serialize)]
pub struct SubscriptionView { pub premium: bool, pub subscription: Option<PremiumSubscription> }

async fn get_subscription(State(s): State<AppState>, ActingUser(user): ActingUser) -> ApiResult<Json<SubscriptionView>> {
    let subscription = s.subscriptions.current_subscription(user).await?;
    Ok(Json(SubscriptionView { premium: subscription.as_ref().is_some_and(|sub| sub.active), subscription }))
}

async fn subscribe(State(s): State<AppState>, ActingUser(user): ActingUser, Json(req): Json<SubscribeBody>) -> ApiResult<(StatusCode, Json<PremiumSubscription>)> {
    Ok((StatusCode::CREATED, Json(s.subscriptions.subscribe(user, req.plan_type).await?)))
}

async fn cancel_subscription(State(s): State<AppState>, ActingUser(user): ActingUser) -> ApiResult<Json<PremiumSubscription>> {
    Ok(Json(s.subscriptions.cancel_subscription(user).await?))
}

// =============================================================================
// Reviews
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewBody {
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct Eligibility { pub can_review: bool }

async fn product_reviews(State(s): State<AppState>, Path(product_id): Path<Uuid>) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(s.reviews.product_reviews(product_id).await?))
}

async fn add_review(State(s): State<AppState>, ActingUser(user): ActingUser, Path(product_id): Path<Uuid>, Json(req): Json<ReviewBody>) -> ApiResult<(StatusCode, Json<Review>)> {
    req.validate()?;
    Ok((StatusCode::CREATED, Json(s.reviews.add_review(user, product_id, req.rating, req.comment).await?)))
}

async fn review_eligibility(State(s): State<AppState>, ActingUser(user): ActingUser, Path(product_id): Path<Uuid>) -> ApiResult<Json<Eligibility>> {
    Ok(Json(Eligibility { can_review: s.reviews.can_user_review(user, product_id).await? }))
}
