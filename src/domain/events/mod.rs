//! Domain events
//!
//! Events are published after the owning transaction commits. A failed publish
//! never undoes or fails the operation that produced the event.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;
use crate::domain::aggregates::{OrderStatus, SubscriptionPlan};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced { order_id: Uuid, user_id: Uuid, final_amount: Money, priority: bool },
    OrderCancelled { order_id: Uuid, user_id: Uuid },
    RefundRequested { order_id: Uuid, user_id: Uuid, reason: String },
    OrderStatusChanged { order_id: Uuid, status: OrderStatus },
    SubscriptionActivated { user_id: Uuid, plan_type: SubscriptionPlan },
    SubscriptionCancelled { user_id: Uuid },
    ReviewAdded { product_id: Uuid, user_id: Uuid, rating: u8, review_count: u32, average_rating: f64 },
}

impl DomainEvent {
    /// Subject suffix, e.g. `orders.placed`.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "orders.placed",
            Self::OrderCancelled { .. } => "orders.cancelled",
            Self::RefundRequested { .. } => "orders.refund_requested",
            Self::OrderStatusChanged { .. } => "orders.status_changed",
            Self::SubscriptionActivated { .. } => "subscriptions.activated",
            Self::SubscriptionCancelled { .. } => "subscriptions.cancelled",
            Self::ReviewAdded { .. } => "reviews.added",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to publish event: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

/// Publishes, logging instead of propagating failures.
pub(crate) async fn announce(publisher: &dyn EventPublisher, event: DomainEvent) {
    if let Err(e) = publisher.publish(&event).await {
        tracing::warn!(error = %e, subject = event.subject(), "domain event not published");
    }
}

/// Publishes JSON-encoded events on `<prefix>.<subject>`.
#[derive(Clone, Debug)]
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self { Self { client, prefix: prefix.into() } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(format!("{}.{}", self.prefix, event.subject()), payload.into())
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

/// Used when no broker is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        tracing::debug!(subject = event.subject(), ?event, "domain event");
        Ok(())
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl InMemoryPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .map_err(|e| PublishError::Transport(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}
