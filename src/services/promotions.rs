//! Promotion campaigns and their effect on product pricing.
//!
//! A product carries at most one applied promotion. Applying a promotion
//! always discounts from the product's list price, so the latest application
//! wins and the list price is never lost.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::promotion::{validate_discount, validate_window};
use crate::domain::aggregates::{Product, Promotion, User};
use crate::domain::value_objects::{Capability, Category, DiscountType, PromotionKind};
use crate::services::require;
use crate::store::Store;
use crate::{MarketplaceError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionInput {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PromotionKind>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub categories: Option<Vec<Category>>,
    pub products: Option<Vec<Uuid>>,
    pub is_active: Option<bool>,
    pub usage_limit: Option<u32>,
}

impl PromotionInput {
    fn reprices(&self) -> bool {
        self.discount_type.is_some()
            || self.discount_value.is_some()
            || self.max_discount.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSelection {
    pub product_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct PromotionService {
    store: Arc<dyn Store>,
}

impl PromotionService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn create(&self, actor: &User, input: PromotionInput) -> Result<Promotion> {
        require(actor, Capability::ManagePromotions, "manage promotions")?;
        let (Some(name), Some(discount_value), Some(start_date), Some(end_date)) =
            (input.name.filter(|n| !n.trim().is_empty()), input.discount_value, input.start_date, input.end_date)
        else {
            return Err(MarketplaceError::validation("Name, discount value, start date and end date are required"));
        };
        let discount_type = input.discount_type.unwrap_or(DiscountType::Percentage);
        validate_window(start_date, end_date)?;
        validate_discount(discount_type, discount_value, input.max_discount)?;

        let categories = input.categories.unwrap_or_default();
        let mut affected: Vec<Uuid> = self.existing(&input.products.unwrap_or_default()).await?;
        if !categories.is_empty() {
            affected.extend(self.store.products_in_categories(&categories).await?.into_iter().map(|p| p.id));
        }

        let now = Utc::now();
        let mut promotion = Promotion {
            id: Uuid::now_v7(),
            name: name.trim().to_string(),
            description: input.description.unwrap_or_default(),
            kind: input.kind.unwrap_or_default(),
            discount_type,
            discount_value,
            max_discount: input.max_discount,
            start_date,
            end_date,
            categories,
            product_ids: vec![],
            is_active: input.is_active.unwrap_or(true),
            usage_count: 0,
            usage_limit: input.usage_limit,
            created_by: actor.id,
            created_at: now,
            updated_at: now,
        };
        promotion.attach_products(affected);
        self.store.insert_promotion(&promotion).await?;
        if promotion.is_active {
            self.apply_promotion_to_products(&promotion, &promotion.product_ids).await?;
        }
        info!(promotion_id = %promotion.id, products = promotion.product_ids.len(), "promotion created");
        Ok(promotion)
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<Promotion>> { self.store.list_promotions(active_only).await }

    pub async fn get(&self, id: Uuid) -> Result<Promotion> {
        self.store.find_promotion(id).await?.ok_or_else(|| MarketplaceError::not_found("Promotion"))
    }

    pub async fn update(&self, actor: &User, id: Uuid, input: PromotionInput) -> Result<Promotion> {
        require(actor, Capability::ManagePromotions, "manage promotions")?;
        let mut promotion = self.get(id).await?;
        let reprice = input.reprices();

        if let Some(name) = input.name {
            if name.trim().is_empty() { return Err(MarketplaceError::validation("Promotion name is required")); }
            promotion.name = name.trim().to_string();
        }
        if let Some(description) = input.description { promotion.description = description; }
        if let Some(kind) = input.kind { promotion.kind = kind; }
        if let Some(discount_type) = input.discount_type { promotion.discount_type = discount_type; }
        if let Some(value) = input.discount_value { promotion.discount_value = value; }
        if input.max_discount.is_some() { promotion.max_discount = input.max_discount; }
        if let Some(start) = input.start_date { promotion.start_date = start; }
        if let Some(end) = input.end_date { promotion.end_date = end; }
        if let Some(categories) = input.categories { promotion.categories = categories; }
        if let Some(limit) = input.usage_limit { promotion.usage_limit = Some(limit); }
        if let Some(active) = input.is_active { promotion.is_active = active; }
        validate_window(promotion.start_date, promotion.end_date)?;
        validate_discount(promotion.discount_type, promotion.discount_value, promotion.max_discount)?;

        let mut dropped = vec![];
        if let Some(products) = input.products {
            let keep = self.existing(&products).await?;
            dropped = promotion.product_ids.iter().copied().filter(|id| !keep.contains(id)).collect();
            promotion.product_ids = keep;
        }
        promotion.touch();
        self.store.update_promotion(&promotion).await?;
        self.release(id, &dropped).await?;
        self.sync_products(&promotion, reprice).await?;
        info!(promotion_id = %id, reprice, active = promotion.is_active, "promotion updated");
        Ok(promotion)
    }

    /// Flip the active flag; products follow through their `onSale` flag.
    pub async fn toggle(&self, actor: &User, id: Uuid) -> Result<Promotion> {
        require(actor, Capability::ManagePromotions, "manage promotions")?;
        let mut promotion = self.get(id).await?;
        promotion.is_active = !promotion.is_active;
        promotion.touch();
        self.store.update_promotion(&promotion).await?;
        self.sync_products(&promotion, false).await?;
        info!(promotion_id = %id, active = promotion.is_active, "promotion toggled");
        Ok(promotion)
    }

    pub async fn delete(&self, actor: &User, id: Uuid) -> Result<()> {
        require(actor, Capability::ManagePromotions, "manage promotions")?;
        let mut products = self.store.products_with_promotion(id).await?;
        for product in &mut products { product.clear_promotion(); }
        self.store.update_products(&products).await?;
        if !self.store.delete_promotion(id).await? {
            return Err(MarketplaceError::not_found("Promotion"));
        }
        info!(promotion_id = %id, reverted = products.len(), "promotion deleted");
        Ok(())
    }

    /// Attach more products to a promotion, discounting them if it is active.
    pub async fn apply_to_products(&self, actor: &User, id: Uuid, product_ids: &[Uuid]) -> Result<Promotion> {
        require(actor, Capability::ManagePromotions, "manage promotions")?;
        let mut promotion = self.get(id).await?;
        let ids = self.existing(product_ids).await?;
        if ids.is_empty() { return Err(MarketplaceError::not_found("Product")); }
        promotion.attach_products(ids.iter().copied());
        self.store.update_promotion(&promotion).await?;
        if promotion.is_active {
            self.apply_promotion_to_products(&promotion, &ids).await?;
        }
        info!(promotion_id = %id, products = ids.len(), "promotion applied to products");
        Ok(promotion)
    }

    /// Detach products and restore their list price.
    pub async fn remove_from_products(&self, actor: &User, id: Uuid, product_ids: &[Uuid]) -> Result<Promotion> {
        require(actor, Capability::ManagePromotions, "manage promotions")?;
        let mut promotion = self.get(id).await?;
        promotion.detach_products(product_ids);
        self.store.update_promotion(&promotion).await?;
        let released = self.release(id, product_ids).await?;
        info!(promotion_id = %id, released, "promotion removed from products");
        Ok(promotion)
    }

    /// Discount each product from its list price and mark it on sale.
    pub async fn apply_promotion_to_products(&self, promotion: &Promotion, product_ids: &[Uuid]) -> Result<Vec<Product>> {
        let mut products = self.store.find_products(product_ids).await?;
        for product in &mut products { product.apply_promotion(promotion); }
        self.store.update_products(&products).await?;
        Ok(products)
    }

    /// Bring the promotion's products in line with its current state. Products
    /// already discounted by another promotion are left alone.
    async fn sync_products(&self, promotion: &Promotion, reprice: bool) -> Result<()> {
        let mut products = self.store.find_products(&promotion.product_ids).await?;
        let mut carried = self.store.products_with_promotion(promotion.id).await?;
        carried.retain(|p| !promotion.covers(p.id));
        products.append(&mut carried);

        let mut changed = vec![];
        for mut product in products {
            let ours = product.promotion_id() == Some(promotion.id);
            match (promotion.is_active, ours) {
                (true, true) if reprice => product.apply_promotion(promotion),
                (true, true) => product.set_on_sale(true),
                (true, false) if product.promotion.is_none() => product.apply_promotion(promotion),
                (false, true) => product.set_on_sale(false),
                _ => continue,
            }
            changed.push(product);
        }
        self.store.update_products(&changed).await
    }

    /// Clear the promotion from those of `product_ids` that carry it.
    async fn release(&self, promotion_id: Uuid, product_ids: &[Uuid]) -> Result<usize> {
        if product_ids.is_empty() { return Ok(0); }
        let mut products = self.store.find_products(product_ids).await?;
        products.retain(|p| p.promotion_id() == Some(promotion_id));
        for product in &mut products { product.clear_promotion(); }
        self.store.update_products(&products).await?;
        Ok(products.len())
    }

    /// The subset of `ids` naming stored products, deduplicated, in request order.
    async fn existing(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if ids.is_empty() { return Ok(vec![]); }
        let found: HashSet<Uuid> = self.store.find_products(ids).await?.into_iter().map(|p| p.id).collect();
        let mut seen = HashSet::new();
        Ok(ids.iter().copied().filter(|id| found.contains(id) && seen.insert(*id)).collect())
    }
}
