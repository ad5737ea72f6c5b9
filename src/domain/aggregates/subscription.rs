//! Newsletter subscription

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), email: email.into(), is_active: true, subscribed_at: now, unsubscribed_at: None, updated_at: now }
    }

    pub fn reactivate(&mut self) {
        let now = Utc::now();
        self.is_active = true;
        self.subscribed_at = now;
        self.unsubscribed_at = None;
        self.updated_at = now;
    }

    pub fn deactivate(&mut self) {
        let now = Utc::now();
        self.is_active = false;
        self.unsubscribed_at = Some(now);
        self.updated_at = now;
    }
}
