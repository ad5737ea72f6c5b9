//! Order Aggregate
//!
//! Item prices are copied from the product when the order is placed and are
//! never recalculated afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::events::MarketplaceEvent;
use crate::domain::value_objects::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::{MarketplaceError, Result};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(rename = "product")]
    pub product_id: Uuid,
    pub quantity: u32,
    pub price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ShippingAddress {
    /// Validate required fields and fill optional ones with defaults.
    pub fn normalized(mut self, default_country: &str) -> Result<Self> {
        self.street = self.street.trim().to_string();
        self.city = self.city.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.validate()?;
        if self.state.trim().is_empty() { self.state = "N/A".into(); }
        if self.zip_code.trim().is_empty() { self.zip_code = "N/A".into(); }
        if self.country.trim().is_empty() { self.country = default_country.to_string(); }
        Ok(self)
    }
}

pub fn compute_total(items: &[OrderItem], shipping_cost: Decimal) -> Decimal {
    items.iter().map(OrderItem::line_total).sum::<Decimal>() + shipping_cost
}

impl Order {
    pub fn place(
        user_id: Uuid,
        order_number: String,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        shipping_cost: Decimal,
    ) -> Result<Self> {
        if items.is_empty() { return Err(MarketplaceError::validation("Order must contain at least one item")); }
        if shipping_cost.is_sign_negative() { return Err(MarketplaceError::validation("Shipping cost cannot be negative")); }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            order_number,
            user_id,
            total_amount: compute_total(&items, shipping_cost),
            items,
            shipping_address,
            payment_method,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Pending,
            shipping_cost,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.items.iter().map(|i| i.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    /// Follow the transition table. `elevated` actors may set any status.
    pub fn transition_to(&mut self, next: OrderStatus, elevated: bool) -> Result<Option<MarketplaceEvent>> {
        let from = self.order_status;
        if !elevated && !from.can_transition_to(next) {
            return Err(MarketplaceError::InvalidTransition { from, to: next });
        }
        self.order_status = next;
        self.touch();
        Ok((from != next).then(|| MarketplaceEvent::OrderStatusChanged {
            order_id: self.id,
            order_number: self.order_number.clone(),
            buyer_id: self.user_id,
            from,
            to: next,
        }))
    }

    pub fn set_payment_status(&mut self, status: PaymentStatus) { self.payment_status = status; self.touch(); }

    pub fn set_tracking_number(&mut self, tracking: impl Into<String>) { self.tracking_number = Some(tracking.into()); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
