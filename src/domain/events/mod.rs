//! Domain events
//!
//! Published after the state change that raised them has been stored.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::OrderStatus;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketplaceEvent {
    /// Confirmation for the buyer.
    OrderPlaced {
        order_id: Uuid,
        order_number: String,
        buyer_id: Uuid,
        buyer_email: String,
        buyer_name: String,
        total_amount: Decimal,
        item_count: u32,
    },
    /// One per distinct seller represented in an order.
    SellerOrderReceived {
        order_id: Uuid,
        order_number: String,
        seller_id: Uuid,
        seller_email: String,
        seller_name: String,
        lines: Vec<SellerLine>,
    },
    OrderStatusChanged {
        order_id: Uuid,
        order_number: String,
        buyer_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SellerLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub price: Decimal,
}

impl MarketplaceEvent {
    /// Subject suffix the event is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            MarketplaceEvent::OrderPlaced { .. } => "order.placed",
            MarketplaceEvent::SellerOrderReceived { .. } => "order.seller",
            MarketplaceEvent::OrderStatusChanged { .. } => "order.status",
        }
    }

    pub fn order_number(&self) -> &str {
        match self {
            MarketplaceEvent::OrderPlaced { order_number, .. }
            | MarketplaceEvent::SellerOrderReceived { order_number, .. }
            | MarketplaceEvent::OrderStatusChanged { order_number, .. } => order_number,
        }
    }
}
