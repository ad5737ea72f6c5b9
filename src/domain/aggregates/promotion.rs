//! Promotion Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Category, DiscountType, PromotionKind};
use crate::{MarketplaceError, Result};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: PromotionKind,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_discount: Option<Decimal>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub categories: Vec<Category>,
    #[serde(rename = "products")]
    pub product_ids: Vec<Uuid>,
    pub is_active: bool,
    pub usage_count: u32,
    pub usage_limit: Option<u32>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of discounting a single price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricedDiscount {
    pub sale_price: Decimal,
    pub percentage: Decimal,
}

/// Discount `price` by `value`. A percentage discount larger than
/// `max_discount` is clamped to the cap and its percentage recomputed.
pub fn price_with_discount(price: Decimal, discount_type: DiscountType, value: Decimal, max_discount: Option<Decimal>) -> PricedDiscount {
    let hundred = Decimal::ONE_HUNDRED;
    match discount_type {
        DiscountType::Percentage => {
            let sale_price = price * (hundred - value) / hundred;
            match max_discount {
                Some(cap) if price - sale_price > cap => PricedDiscount {
                    sale_price: (price - cap).round_dp(2),
                    percentage: if price.is_zero() { Decimal::ZERO } else { (cap / price * hundred).round_dp(2) },
                },
                _ => PricedDiscount { sale_price: sale_price.round_dp(2), percentage: value },
            }
        }
        DiscountType::FixedAmount => {
            let sale_price = (price - value).max(Decimal::ZERO);
            let percentage = if price.is_zero() { Decimal::ZERO } else { (value / price * hundred).min(hundred).round_dp(2) };
            PricedDiscount { sale_price: sale_price.round_dp(2), percentage }
        }
    }
}

pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(MarketplaceError::validation("End date must be after start date"));
    }
    Ok(())
}

pub fn validate_discount(discount_type: DiscountType, value: Decimal, max_discount: Option<Decimal>) -> Result<()> {
    if value.is_sign_negative() {
        return Err(MarketplaceError::validation("Discount value cannot be negative"));
    }
    if discount_type == DiscountType::Percentage && value > Decimal::ONE_HUNDRED {
        return Err(MarketplaceError::validation("Percentage discount cannot exceed 100"));
    }
    if max_discount.is_some_and(|cap| cap.is_sign_negative()) {
        return Err(MarketplaceError::validation("Maximum discount cannot be negative"));
    }
    Ok(())
}

impl Promotion {
    pub fn discount(&self, price: Decimal) -> PricedDiscount {
        price_with_discount(price, self.discount_type, self.discount_value, self.max_discount)
    }

    pub fn covers(&self, product_id: Uuid) -> bool { self.product_ids.contains(&product_id) }

    /// Record `ids` as affected, keeping the list free of duplicates.
    pub fn attach_products(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        for id in ids {
            if !self.product_ids.contains(&id) { self.product_ids.push(id); }
        }
        self.touch();
    }

    pub fn detach_products(&mut self, ids: &[Uuid]) {
        self.product_ids.retain(|id| !ids.contains(id));
        self.touch();
    }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}
