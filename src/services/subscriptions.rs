//! Subscription status provider
//!
//! Keeps `User::premium_status` equal to "has an active subscription row" at the
//! end of every subscribe and cancel. Subscriptions past their end date are not
//! swept; `active` only changes through these two operations.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use crate::domain::aggregates::{PremiumSubscription, SubscriptionPlan};
use crate::domain::events::{announce, DomainEvent, EventPublisher};
use crate::storage::{Store, Transaction};
use crate::{MarketError, Result};

#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventPublisher>,
}

/// Premium check inside an open transaction.
pub async fn is_premium_in(tx: &mut dyn Transaction, user_id: Uuid) -> Result<bool> {
    Ok(tx.find_subscription(user_id).await?.is_some_and(|s| s.active))
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventPublisher>) -> Self { Self { store, events } }

    /// Activates a subscription, reusing the user's inactive row when one exists.
    #[tracing::instrument(skip(self))]
    pub async fn subscribe(&self, user_id: Uuid, plan_type: SubscriptionPlan) -> Result<PremiumSubscription> {
        let mut tx = self.store.begin().await?;
        // Serializes concurrent subscribe calls for the same user.
        tx.lock_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;

        let today = Utc::now().date_naive();
        let subscription = match tx.find_subscription(user_id).await? {
            Some(existing) if existing.active => return Err(MarketError::AlreadySubscribed),
            Some(mut existing) => {
                existing.activate(plan_type, today);
                existing
            }
            None => PremiumSubscription::start(user_id, plan_type, today),
        };
        tx.save_subscription(&subscription).await?;
        tx.set_premium_status(user_id, true).await?;
        tx.commit().await?;

        tracing::info!(subscription_id = %subscription.id, end_date = %subscription.end_date, "premium subscription activated");
        announce(self.events.as_ref(), DomainEvent::SubscriptionActivated { user_id, plan_type }).await;
        Ok(subscription)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_subscription(&self, user_id: Uuid) -> Result<PremiumSubscription> {
        let mut tx = self.store.begin().await?;
        tx.lock_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;
        let mut subscription = tx
            .find_subscription(user_id)
            .await?
            .filter(|s| s.active)
            .ok_or(MarketError::NoActiveSubscription)?;
        subscription.deactivate();
        tx.save_subscription(&subscription).await?;
        tx.set_premium_status(user_id, false).await?;
        tx.commit().await?;

        tracing::info!(subscription_id = %subscription.id, "premium subscription cancelled");
        announce(self.events.as_ref(), DomainEvent::SubscriptionCancelled { user_id }).await;
        Ok(subscription)
    }

    pub async fn is_premium(&self, user_id: Uuid) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        tx.find_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;
        is_premium_in(tx.as_mut(), user_id).await
    }

    pub async fn current_subscription(&self, user_id: Uuid) -> Result<Option<PremiumSubscription>> {
        let mut tx = self.store.begin().await?;
        tx.find_user(user_id).await?.ok_or(MarketError::UserNotFound(user_id))?;
        tx.find_subscription(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::User;
    use crate::domain::events::InMemoryPublisher;
    use crate::storage::InMemoryStore;

    async fn setup() -> (InMemoryStore, SubscriptionService, Arc<InMemoryPublisher>, Uuid) {
        let store = InMemoryStore::new();
        let user = User::new("Sam", "sam@example.com");
        let user_id = user.id;
        store.insert_user(user).await;
        let events = Arc::new(InMemoryPublisher::default());
        let service = SubscriptionService::new(Arc::new(store.clone()), events.clone());
        (store, service, events, user_id)
    }

    #[tokio::test]
    async fn test_subscribe_sets_premium_flag() {
        let (store, service, events, user_id) = setup().await;
        assert!(!service.is_premium(user_id).await.unwrap());

        let sub = service.subscribe(user_id, SubscriptionPlan::Monthly).await.unwrap();
        assert!(sub.active && sub.auto_renew);
        assert!(sub.end_date > sub.start_date);
        assert!(service.is_premium(user_id).await.unwrap());
        assert!(store.user(user_id).await.unwrap().premium_status);
        assert_eq!(events.events(), vec![DomainEvent::SubscriptionActivated { user_id, plan_type: SubscriptionPlan::Monthly }]);
    }

    #[tokio::test]
    async fn test_second_subscribe_fails() {
        let (store, service, _, user_id) = setup().await;
        service.subscribe(user_id, SubscriptionPlan::Yearly).await.unwrap();
        assert!(matches!(service.subscribe(user_id, SubscriptionPlan::Monthly).await, Err(MarketError::AlreadySubscribed)));
        assert!(store.user(user_id).await.unwrap().premium_status);
        assert_eq!(service.current_subscription(user_id).await.unwrap().unwrap().plan_type, SubscriptionPlan::Yearly);
    }

    #[tokio::test]
    async fn test_cancel_then_resubscribe_reuses_row() {
        let (store, service, _, user_id) = setup().await;
        assert!(matches!(service.cancel_subscription(user_id).await, Err(MarketError::NoActiveSubscription)));

        let first = service.subscribe(user_id, SubscriptionPlan::Monthly).await.unwrap();
        let cancelled = service.cancel_subscription(user_id).await.unwrap();
        assert!(!cancelled.active && !cancelled.auto_renew);
        assert!(!store.user(user_id).await.unwrap().premium_status);
        assert!(matches!(service.cancel_subscription(user_id).await, Err(MarketError::NoActiveSubscription)));

        let again = service.subscribe(user_id, SubscriptionPlan::Yearly).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.plan_type, SubscriptionPlan::Yearly);
        assert!(store.user(user_id).await.unwrap().premium_status);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (_, service, _, _) = setup().await;
        assert!(matches!(service.subscribe(Uuid::now_v7(), SubscriptionPlan::Monthly).await, Err(MarketError::UserNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_only_one_wins() {
        let (_, service, _, user_id) = setup().await;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.subscribe(user_id, SubscriptionPlan::Monthly).await })
            })
            .collect();
        let mut won = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(e) => assert!(matches!(e, MarketError::AlreadySubscribed)),
            }
        }
        assert_eq!(won, 1);
    }
}
