//! Per-user shopping cart.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Product, ProductView};
use crate::store::Store;
use crate::{MarketplaceError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: Uuid,
    pub user: Uuid,
    pub items: Vec<CartLine>,
    pub total_items: u32,
    pub subtotal: Decimal,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Line id, used by update and remove.
    pub id: Uuid,
    pub product: ProductView,
    pub quantity: u32,
    pub line_total: Decimal,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn get(&self, user_id: Uuid) -> Result<CartView> {
        let cart = self.load(user_id).await?;
        self.present(cart).await
    }

    pub async fn add(&self, user_id: Uuid, req: AddToCart) -> Result<CartView> {
        let product = self.available(req.product_id).await?;
        let mut cart = self.load(user_id).await?;
        cart.add_item(product.id, req.quantity, product.stock)?;
        self.store.save_cart(&cart).await?;
        info!(%user_id, product_id = %product.id, quantity = req.quantity, "cart item added");
        self.present(cart).await
    }

    pub async fn update(&self, user_id: Uuid, item_id: Uuid, quantity: u32) -> Result<CartView> {
        let mut cart = self.load(user_id).await?;
        let product_id = cart.item(item_id).map(|i| i.product_id).ok_or_else(|| MarketplaceError::not_found("Cart item"))?;
        let product = self.available(product_id).await?;
        cart.update_quantity(item_id, quantity, product.stock)?;
        self.store.save_cart(&cart).await?;
        self.present(cart).await
    }

    pub async fn remove(&self, user_id: Uuid, item_id: Uuid) -> Result<CartView> {
        let mut cart = self.load(user_id).await?;
        cart.remove_item(item_id)?;
        self.store.save_cart(&cart).await?;
        self.present(cart).await
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<CartView> {
        let mut cart = self.load(user_id).await?;
        cart.clear();
        self.store.save_cart(&cart).await?;
        info!(%user_id, "cart cleared");
        self.present(cart).await
    }

    /// The user's cart, created on first access.
    async fn load(&self, user_id: Uuid) -> Result<Cart> {
        if let Some(cart) = self.store.find_cart(user_id).await? {
            return Ok(cart);
        }
        let cart = Cart::for_user(user_id);
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    async fn available(&self, product_id: Uuid) -> Result<Product> {
        match self.store.find_product(product_id).await? {
            Some(product) if product.is_active => Ok(product),
            _ => Err(MarketplaceError::not_found("Product")),
        }
    }

    /// Drop lines whose product is gone or inactive, persisting the pruned cart.
    async fn present(&self, mut cart: Cart) -> Result<CartView> {
        let ids: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, Product> = self
            .store
            .find_products(&ids)
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .map(|p| (p.id, p))
            .collect();
        let dropped = cart.retain_products(|id| products.contains_key(&id));
        if dropped > 0 {
            debug!(user_id = %cart.user_id, dropped, "pruned unavailable cart items");
            self.store.save_cart(&cart).await?;
        }
        let items: Vec<CartLine> = cart
            .items()
            .iter()
            .filter_map(|item| {
                let product = products.get(&item.product_id)?;
                Some(CartLine {
                    id: item.id,
                    product: product.view(),
                    quantity: item.quantity,
                    line_total: product.effective_price() * Decimal::from(item.quantity),
                })
            })
            .collect();
        Ok(CartView {
            id: cart.id,
            user: cart.user_id,
            total_items: items.iter().map(|l| l.quantity).sum(),
            subtotal: items.iter().map(|l| l.line_total).sum(),
            items,
            updated_at: cart.updated_at,
        })
    }
}
