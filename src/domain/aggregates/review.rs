//! Review Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{MarketplaceError, Result};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    #[serde(rename = "product")]
    pub product_id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(product_id: Uuid, user_id: Uuid, rating: u8, comment: impl Into<String>) -> Result<Self> {
        if !(1..=5).contains(&rating) {
            return Err(MarketplaceError::validation("Rating must be between 1 and 5"));
        }
        Ok(Self { id: Uuid::now_v7(), product_id, user_id, rating, comment: comment.into(), created_at: Utc::now() })
    }
}
