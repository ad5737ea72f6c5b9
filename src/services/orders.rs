//! Checkout and order fulfillment.
//!
//! Placing an order validates every line against live product data, prices
//! it at the effective price, reserves stock atomically through the store,
//! then notifies the buyer and every distinct seller in the background.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderItem, Product, ShippingAddress, User};
use crate::domain::events::{MarketplaceEvent, SellerLine};
use crate::domain::value_objects::{Capability, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus};
use crate::notify::{dispatch, Notifier};
use crate::store::Store;
use crate::{MarketplaceError, Result};

pub const ORDER_NUMBER_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<PaymentMethod>,
    pub shipping_cost: Option<Decimal>,
    #[serde(default)]
    pub use_cart: bool,
    #[serde(default)]
    pub items: Vec<LineRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    #[serde(alias = "product")]
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub tracking_number: Option<String>,
}

/// Produces candidate order numbers for a category name.
pub type NumberSource = Arc<dyn Fn(&str) -> OrderNumber + Send + Sync>;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    default_country: String,
    numbers: NumberSource,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, default_country: impl Into<String>) -> Self {
        Self {
            store,
            notifier,
            default_country: default_country.into(),
            numbers: Arc::new(|category: &str| OrderNumber::generate(category, &mut rand::thread_rng())),
        }
    }

    pub fn with_number_source(mut self, numbers: NumberSource) -> Self {
        self.numbers = numbers;
        self
    }

    pub async fn create_order(&self, buyer: &User, req: CreateOrder) -> Result<Order> {
        let (Some(address), Some(payment_method)) = (req.shipping_address, req.payment_method) else {
            return Err(MarketplaceError::validation("Shipping address and payment method are required"));
        };
        let address = address.normalized(&self.default_country)?;
        let shipping_cost = req.shipping_cost.unwrap_or(Decimal::ZERO);

        let lines: Vec<LineRequest> = if req.use_cart {
            let cart = self.store.find_cart(buyer.id).await?;
            let lines: Vec<LineRequest> = cart
                .map(|c| c.items.iter().map(|i| LineRequest { product_id: i.product_id, quantity: i.quantity }).collect())
                .unwrap_or_default();
            if lines.is_empty() { return Err(MarketplaceError::validation("Cart is empty")); }
            lines
        } else {
            if req.items.is_empty() { return Err(MarketplaceError::validation("No order items provided")); }
            req.items
        };

        let products = self.check_lines(&lines).await?;
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem { product_id: line.product_id, quantity: line.quantity, price: products[&line.product_id].effective_price() })
            .collect();

        let first_category = products[&lines[0].product_id].category;
        let order_number = self.allocate_order_number(first_category.as_str()).await?;
        let order = Order::place(buyer.id, order_number, items, address, payment_method, shipping_cost)?;
        self.store.place_order(&order, req.use_cart).await?;
        info!(order_id = %order.id, order_number = %order.order_number, buyer_id = %buyer.id, total = %order.total_amount, "order placed");

        match self.placement_events(buyer, &order, &products).await {
            Ok(events) => { dispatch(self.notifier.clone(), events); }
            Err(e) => error!(order_id = %order.id, error = %e, "could not prepare order notifications"),
        }
        Ok(order)
    }

    /// Every line must name an active product with enough stock.
    async fn check_lines(&self, lines: &[LineRequest]) -> Result<HashMap<Uuid, Product>> {
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<Uuid, Product> = self.store.find_products(&ids).await?.into_iter().map(|p| (p.id, p)).collect();
        let mut requested: HashMap<Uuid, u32> = HashMap::new();
        for line in lines {
            if line.quantity == 0 {
                return Err(MarketplaceError::validation("Quantity must be at least 1"));
            }
            let product = products.get(&line.product_id).ok_or_else(|| MarketplaceError::not_found(format!("Product {}", line.product_id)))?;
            if !product.is_active {
                return Err(MarketplaceError::validation(format!("Product {} is not available", product.name)));
            }
            let total = requested.entry(product.id).or_default();
            *total = total.saturating_add(line.quantity);
            if !product.is_purchasable(*total) {
                warn!(product_id = %product.id, stock = product.stock, requested = *total, "insufficient stock");
                return Err(MarketplaceError::InsufficientStock { product: product.name.clone() });
            }
        }
        Ok(products)
    }

    async fn allocate_order_number(&self, category: &str) -> Result<String> {
        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            let candidate = (self.numbers)(category);
            if !self.store.order_number_exists(candidate.as_str()).await? {
                return Ok(candidate.into_string());
            }
            warn!(attempt, order_number = %candidate, "order number collision");
        }
        Err(MarketplaceError::OrderNumberExhausted)
    }

    async fn placement_events(&self, buyer: &User, order: &Order, products: &HashMap<Uuid, Product>) -> Result<Vec<MarketplaceEvent>> {
        let mut by_seller: BTreeMap<Uuid, Vec<SellerLine>> = BTreeMap::new();
        for item in &order.items {
            let product = &products[&item.product_id];
            by_seller.entry(product.seller_id).or_default().push(SellerLine {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: item.quantity,
                price: item.price,
            });
        }
        let seller_ids: Vec<Uuid> = by_seller.keys().copied().collect();
        let sellers: HashMap<Uuid, User> = self.store.find_users(&seller_ids).await?.into_iter().map(|u| (u.id, u)).collect();

        let mut events = vec![MarketplaceEvent::OrderPlaced {
            order_id: order.id,
            order_number: order.order_number.clone(),
            buyer_id: buyer.id,
            buyer_email: buyer.email.clone(),
            buyer_name: buyer.name.clone(),
            total_amount: order.total_amount,
            item_count: order.item_count(),
        }];
        for (seller_id, lines) in by_seller {
            let Some(seller) = sellers.get(&seller_id) else { continue };
            events.push(MarketplaceEvent::SellerOrderReceived {
                order_id: order.id,
                order_number: order.order_number.clone(),
                seller_id,
                seller_email: seller.email.clone(),
                seller_name: seller.name.clone(),
                lines,
            });
        }
        Ok(events)
    }

    pub async fn my_orders(&self, user: &User) -> Result<Vec<Order>> { self.store.orders_for_user(user.id).await }

    /// Orders containing at least one of the seller's products.
    pub async fn seller_orders(&self, seller: &User) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = self.store.products_by_seller(seller.id).await?.into_iter().map(|p| p.id).collect();
        if ids.is_empty() { return Ok(vec![]); }
        self.store.orders_with_products(&ids, None).await
    }

    pub async fn get_order(&self, actor: &User, id: Uuid) -> Result<Order> {
        let order = self.find(id).await?;
        if order.user_id == actor.id || actor.can(Capability::ViewAllOrders) || self.sells_into(actor, &order).await? {
            return Ok(order);
        }
        warn!(order_id = %id, actor_id = %actor.id, "order access rejected");
        Err(MarketplaceError::forbidden("Not authorized to view this order"))
    }

    pub async fn update_status(&self, actor: &User, id: Uuid, update: StatusUpdate) -> Result<Order> {
        let mut order = self.find(id).await?;
        let elevated = actor.can(Capability::ManageOrders);
        if !elevated && !self.sells_into(actor, &order).await? {
            warn!(order_id = %id, actor_id = %actor.id, "order update rejected");
            return Err(MarketplaceError::forbidden("Not authorized to update this order"));
        }
        if update.order_status.is_none() && update.payment_status.is_none() && update.tracking_number.is_none() {
            return Err(MarketplaceError::validation("Nothing to update"));
        }
        if update.payment_status.is_some() && !elevated {
            return Err(MarketplaceError::forbidden("Only administrators can change payment status"));
        }

        let mut event = None;
        if let Some(next) = update.order_status {
            event = order.transition_to(next, elevated)?;
        }
        if let Some(payment) = update.payment_status { order.set_payment_status(payment); }
        if let Some(tracking) = update.tracking_number { order.set_tracking_number(tracking); }
        self.store.update_order(&order).await?;
        info!(order_id = %order.id, status = %order.order_status, payment = %order.payment_status, actor_id = %actor.id, "order updated");

        if let Some(event) = event {
            dispatch(self.notifier.clone(), vec![event]);
        }
        Ok(order)
    }

    async fn find(&self, id: Uuid) -> Result<Order> {
        self.store.find_order(id).await?.ok_or_else(|| MarketplaceError::not_found("Order"))
    }

    /// Ownership is recomputed from the order's current products on every call.
    async fn sells_into(&self, actor: &User, order: &Order) -> Result<bool> {
        if !actor.can(Capability::ListProducts) { return Ok(false); }
        let products = self.store.find_products(&order.product_ids()).await?;
        Ok(products.iter().any(|p| p.owned_by(actor.id)))
    }
}
