//! Newsletter subscriptions.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::domain::aggregates::user::normalize_email;
use crate::domain::aggregates::Subscription;
use crate::store::Store;
use crate::{MarketplaceError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubscriptionRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
}

#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn Store>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn subscribe(&self, req: SubscriptionRequest) -> Result<Subscription> {
        req.validate()?;
        let email = normalize_email(&req.email);
        let subscription = match self.store.find_subscription(&email).await? {
            Some(existing) if existing.is_active => {
                return Err(MarketplaceError::validation("This email is already subscribed"));
            }
            Some(mut lapsed) => {
                lapsed.reactivate();
                lapsed
            }
            None => Subscription::new(email),
        };
        self.store.save_subscription(&subscription).await?;
        info!(subscription_id = %subscription.id, "newsletter subscription");
        Ok(subscription)
    }

    pub async fn unsubscribe(&self, req: SubscriptionRequest) -> Result<Subscription> {
        let email = normalize_email(&req.email);
        let mut subscription = self.store.find_subscription(&email).await?.ok_or_else(|| MarketplaceError::not_found("Subscription"))?;
        subscription.deactivate();
        self.store.save_subscription(&subscription).await?;
        info!(subscription_id = %subscription.id, "newsletter unsubscription");
        Ok(subscription)
    }
}
