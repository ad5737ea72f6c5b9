//! Product Aggregate
//!
//! `price` is the seller's list price and is never touched by promotions.
//! Discounts live in [`AppliedPromotion`]; what buyers pay is
//! [`Product::effective_price`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::promotion::Promotion;
use crate::domain::value_objects::Category;
use crate::{MarketplaceError, Result};

pub const MAX_IMAGES: usize = 5;

#[derive(Clone, Debug)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub category: Category,
    pub tags: Vec<String>,
    pub stock: u32,
    pub seller_id: Uuid,
    pub rating: Rating,
    pub on_sale: bool,
    pub promotion: Option<AppliedPromotion>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Rating {
    pub average: f64,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppliedPromotion {
    pub promotion_id: Uuid,
    pub sale_price: Decimal,
    pub discount_percentage: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: Category,
    pub stock: u32,
    pub images: Vec<String>,
    pub tags: Vec<String>,
}

impl Product {
    pub fn create(seller_id: Uuid, new: NewProduct) -> Result<Self> {
        if new.name.trim().is_empty() { return Err(MarketplaceError::validation("Product name is required")); }
        if new.description.trim().is_empty() { return Err(MarketplaceError::validation("Product description is required")); }
        validate_price(new.price)?;
        validate_images(&new.images)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            name: new.name.trim().to_string(),
            description: new.description.trim().to_string(),
            price: new.price,
            images: new.images,
            category: new.category,
            tags: new.tags,
            stock: new.stock,
            seller_id,
            rating: Rating::default(),
            on_sale: false,
            promotion: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn effective_price(&self) -> Decimal {
        match &self.promotion {
            Some(applied) if self.on_sale => applied.sale_price,
            _ => self.price,
        }
    }

    /// The list price, exposed only while a discount is in effect.
    pub fn original_price(&self) -> Option<Decimal> {
        self.is_discounted().then_some(self.price)
    }

    pub fn is_discounted(&self) -> bool { self.on_sale && self.promotion.is_some() }

    pub fn is_purchasable(&self, quantity: u32) -> bool { self.is_active && self.stock >= quantity }

    pub fn owned_by(&self, user_id: Uuid) -> bool { self.seller_id == user_id }

    pub fn reserve_stock(&mut self, quantity: u32) -> Result<()> {
        if !self.is_purchasable(quantity) {
            return Err(MarketplaceError::InsufficientStock { product: self.name.clone() });
        }
        self.stock -= quantity;
        self.touch();
        Ok(())
    }

    /// Discount from the list price. Replaces whatever promotion was applied before.
    pub fn apply_promotion(&mut self, promotion: &Promotion) {
        let priced = promotion.discount(self.price);
        self.promotion = Some(AppliedPromotion {
            promotion_id: promotion.id,
            sale_price: priced.sale_price,
            discount_percentage: priced.percentage,
            starts_at: promotion.start_date,
            ends_at: promotion.end_date,
        });
        self.on_sale = true;
        self.touch();
    }

    pub fn clear_promotion(&mut self) {
        self.promotion = None;
        self.on_sale = false;
        self.touch();
    }

    pub fn set_on_sale(&mut self, on_sale: bool) {
        self.on_sale = on_sale;
        self.touch();
    }

    pub fn promotion_id(&self) -> Option<Uuid> { self.promotion.as_ref().map(|p| p.promotion_id) }

    pub fn record_rating(&mut self, stars: u8) {
        let total = self.rating.average * f64::from(self.rating.count) + f64::from(stars);
        self.rating.count += 1;
        self.rating.average = total / f64::from(self.rating.count);
        self.touch();
    }

    pub fn view(&self) -> ProductView { ProductView::from(self) }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

pub fn validate_price(price: Decimal) -> Result<()> {
    if price.is_sign_negative() { return Err(MarketplaceError::validation("Price cannot be negative")); }
    Ok(())
}

pub fn validate_images(images: &[String]) -> Result<()> {
    if images.is_empty() { return Err(MarketplaceError::validation("At least one product image is required")); }
    if images.len() > MAX_IMAGES { return Err(MarketplaceError::validation(format!("At most {MAX_IMAGES} images are allowed"))); }
    if images.iter().any(|url| url.trim().is_empty()) { return Err(MarketplaceError::validation("Image URLs cannot be empty")); }
    Ok(())
}

/// Public representation: `price` is what the buyer pays.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub images: Vec<String>,
    pub category: Category,
    pub tags: Vec<String>,
    pub stock: u32,
    pub seller: Uuid,
    pub rating: Rating,
    pub on_sale: bool,
    pub sale_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub sale_start_date: Option<DateTime<Utc>>,
    pub sale_end_date: Option<DateTime<Utc>>,
    pub promotion: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        let applied = p.promotion.as_ref();
        Self {
            id: p.id,
            name: p.name.clone(),
            description: p.description.clone(),
            price: p.effective_price(),
            original_price: p.original_price(),
            images: p.images.clone(),
            category: p.category,
            tags: p.tags.clone(),
            stock: p.stock,
            seller: p.seller_id,
            rating: p.rating,
            on_sale: p.on_sale,
            sale_price: applied.map(|a| a.sale_price),
            discount_percentage: applied.map(|a| a.discount_percentage),
            sale_start_date: applied.map(|a| a.starts_at),
            sale_end_date: applied.map(|a| a.ends_at),
            promotion: applied.map(|a| a.promotion_id),
            is_active: p.is_active,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{DiscountType, PromotionKind};

    pub(crate) fn sample(price: i64, stock: u32) -> Product {
        Product::create(Uuid::now_v7(), NewProduct {
            name: "Desk Lamp".into(),
            description: "Warm light".into(),
            price: Decimal::new(price, 0),
            category: Category::HomeGarden,
            stock,
            images: vec!["https://img.example/lamp.jpg".into()],
            tags: vec![],
        })
        .unwrap()
    }

    fn promotion(value: i64) -> Promotion {
        let now = Utc::now();
        Promotion {
            id: Uuid::now_v7(),
            name: "Spring".into(),
            description: String::new(),
            kind: PromotionKind::Seasonal,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::new(value, 0),
            max_discount: None,
            start_date: now,
            end_date: now + chrono::Duration::days(7),
            categories: vec![],
            product_ids: vec![],
            is_active: true,
            usage_count: 0,
            usage_limit: None,
            created_by: Uuid::now_v7(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_requires_images() {
        let err = Product::create(Uuid::now_v7(), NewProduct {
            name: "Lamp".into(),
            description: "d".into(),
            price: Decimal::ONE,
            category: Category::Other,
            stock: 1,
            images: vec![],
            tags: vec![],
        });
        assert!(matches!(err, Err(MarketplaceError::Validation(_))));
    }

    #[test]
    fn test_twenty_percent_off() {
        let mut p = sample(1000, 5);
        p.apply_promotion(&promotion(20));
        let view = p.view();
        assert_eq!(view.price, Decimal::new(800, 0));
        assert!(view.on_sale);
        assert_eq!(view.original_price, Some(Decimal::new(1000, 0)));
    }

    #[test]
    fn test_second_promotion_discounts_list_price() {
        let mut p = sample(1000, 5);
        p.apply_promotion(&promotion(20));
        p.apply_promotion(&promotion(10));
        assert_eq!(p.effective_price(), Decimal::new(900, 0));
        assert_eq!(p.original_price(), Some(Decimal::new(1000, 0)));
    }

    #[test]
    fn test_toggle_and_clear() {
        let mut p = sample(1000, 5);
        p.apply_promotion(&promotion(20));
        p.set_on_sale(false);
        assert_eq!(p.effective_price(), Decimal::new(1000, 0));
        assert_eq!(p.original_price(), None);
        p.set_on_sale(true);
        assert_eq!(p.effective_price(), Decimal::new(800, 0));
        p.clear_promotion();
        assert!(!p.on_sale);
        assert_eq!(p.effective_price(), Decimal::new(1000, 0));
    }

    #[test]
    fn test_reserve_stock() {
        let mut p = sample(10, 1);
        assert!(matches!(p.reserve_stock(2), Err(MarketplaceError::InsufficientStock { .. })));
        assert_eq!(p.stock, 1);
        p.reserve_stock(1).unwrap();
        assert_eq!(p.stock, 0);
    }

    #[test]
    fn test_rating_average() {
        let mut p = sample(10, 1);
        p.record_rating(5);
        p.record_rating(3);
        assert_eq!(p.rating.count, 2);
        assert!((p.rating.average - 4.0).abs() < f64::EPSILON);
    }
}
