//! Product listing, browsing and reviews.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::product::{validate_images, validate_price};
use crate::domain::aggregates::{NewProduct, Product, ProductView, Review, User};
use crate::domain::value_objects::{Capability, Category};
use crate::services::{page_bounds, require, Pagination};
use crate::store::{ProductQuery, ProductSort, Store};
use crate::{MarketplaceError, Result};

/// Query-string filters as they arrive from clients.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilters {
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductFilters {
    pub fn into_query(self) -> Result<ProductQuery> {
        let (page, limit) = page_bounds(self.page, self.limit);
        let sort = match self.sort_by.as_deref().filter(|s| !s.is_empty()) {
            Some(field) => ProductSort::parse(field).ok_or_else(|| MarketplaceError::validation(format!("Cannot sort by {field}")))?,
            None => ProductSort::default(),
        };
        let descending = match self.order.as_deref() {
            None | Some("") | Some("desc") => true,
            Some("asc") => false,
            Some(other) => return Err(MarketplaceError::validation(format!("Invalid sort order: {other}"))),
        };
        Ok(ProductQuery {
            category: non_empty(self.category).map(|c| Category::from_str(&c)).transpose()?,
            min_price: parse_price("minPrice", self.min_price)?,
            max_price: parse_price("maxPrice", self.max_price)?,
            search: non_empty(self.search),
            sort,
            descending,
            page,
            limit,
            ..ProductQuery::default()
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_price(field: &str, raw: Option<String>) -> Result<Option<Decimal>> {
    non_empty(raw)
        .map(|v| Decimal::from_str(&v).map_err(|_| MarketplaceError::validation(format!("{field} must be a number"))))
        .transpose()
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: Category,
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<Category>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    /// Public listing; inactive products are never included.
    pub async fn list_products(&self, filters: ProductFilters) -> Result<ProductPage> {
        let query = filters.into_query()?;
        self.page(&query).await
    }

    pub async fn page(&self, query: &ProductQuery) -> Result<ProductPage> {
        let page = self.store.query_products(query).await?;
        Ok(ProductPage {
            products: page.items.iter().map(Product::view).collect(),
            pagination: Pagination::new(query.page, query.limit, page.total),
        })
    }

    pub async fn get_product(&self, id: Uuid) -> Result<ProductView> {
        match self.store.find_product(id).await? {
            Some(product) if product.is_active => Ok(product.view()),
            _ => Err(MarketplaceError::not_found("Product")),
        }
    }

    pub async fn seller_products(&self, seller: &User) -> Result<Vec<ProductView>> {
        Ok(self.store.products_by_seller(seller.id).await?.iter().map(Product::view).collect())
    }

    pub async fn create_product(&self, seller: &User, req: CreateProduct) -> Result<ProductView> {
        require(seller, Capability::ListProducts, "list products")?;
        let product = Product::create(seller.id, NewProduct {
            name: req.name,
            description: req.description,
            price: req.price,
            category: req.category,
            stock: req.stock,
            images: req.images,
            tags: req.tags,
        })?;
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id, seller_id = %seller.id, "product created");
        Ok(product.view())
    }

    pub async fn update_product(&self, actor: &User, id: Uuid, update: UpdateProduct) -> Result<ProductView> {
        let mut product = self.owned(actor, id, "update").await?;
        if let Some(name) = update.name {
            if name.trim().is_empty() { return Err(MarketplaceError::validation("Product name is required")); }
            product.name = name.trim().to_string();
        }
        if let Some(description) = update.description { product.description = description; }
        if let Some(price) = update.price {
            validate_price(price)?;
            product.price = price;
        }
        if let Some(category) = update.category { product.category = category; }
        if let Some(images) = update.images {
            validate_images(&images)?;
            product.images = images;
        }
        if let Some(tags) = update.tags { product.tags = tags; }
        if let Some(active) = update.is_active { product.is_active = active; }
        // A new list price invalidates the stored sale price.
        if update.price.is_some() {
            if let Some(promotion_id) = product.promotion_id() {
                if let Some(promotion) = self.store.find_promotion(promotion_id).await? {
                    let on_sale = product.on_sale;
                    product.apply_promotion(&promotion);
                    product.set_on_sale(on_sale);
                }
            }
        }
        product.touch();
        self.store.update_product(&product).await?;
        if let Some(stock) = update.stock {
            self.store.set_stock(id, stock).await?;
        }
        info!(product_id = %product.id, actor_id = %actor.id, "product updated");
        self.fresh(id).await
    }

    pub async fn delete_product(&self, actor: &User, id: Uuid) -> Result<()> {
        self.owned(actor, id, "delete").await?;
        self.store.delete_product(id).await?;
        info!(product_id = %id, actor_id = %actor.id, "product deleted");
        Ok(())
    }

    pub async fn add_review(&self, user: &User, product_id: Uuid, review: NewReview) -> Result<Review> {
        let mut product = match self.store.find_product(product_id).await? {
            Some(product) if product.is_active => product,
            _ => return Err(MarketplaceError::not_found("Product")),
        };
        if product.owned_by(user.id) {
            return Err(MarketplaceError::validation("You cannot review your own product"));
        }
        if self.store.find_review(product_id, user.id).await?.is_some() {
            return Err(MarketplaceError::validation("You have already reviewed this product"));
        }
        let review = Review::new(product_id, user.id, review.rating, review.comment)?;
        product.record_rating(review.rating);
        self.store.insert_review(&review, &product).await?;
        info!(product_id = %product_id, user_id = %user.id, rating = review.rating, "review added");
        Ok(review)
    }

    /// Load a product the actor may modify: its seller, or anyone with `ManageAnyProduct`.
    async fn owned(&self, actor: &User, id: Uuid, action: &str) -> Result<Product> {
        let product = self.store.find_product(id).await?.ok_or_else(|| MarketplaceError::not_found("Product"))?;
        if !product.owned_by(actor.id) && !actor.can(Capability::ManageAnyProduct) {
            tracing::warn!(product_id = %id, actor_id = %actor.id, "product {action} rejected");
            return Err(MarketplaceError::forbidden(format!("Not authorized to {action} this product")));
        }
        Ok(product)
    }

    async fn fresh(&self, id: Uuid) -> Result<ProductView> {
        let product = self.store.find_product(id).await?.ok_or_else(|| MarketplaceError::not_found("Product"))?;
        Ok(product.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Role;
    use crate::services::fixtures;

    fn request(price: i64) -> CreateProduct {
        CreateProduct {
            name: "Coffee Beans".into(),
            description: "Yirgacheffe, 1kg".into(),
            price: Decimal::new(price, 0),
            category: Category::Groceries,
            stock: 10,
            images: vec!["https://img.example/beans.jpg".into()],
            tags: vec!["coffee".into()],
        }
    }

    #[tokio::test]
    async fn test_create_requires_listing_capability() {
        let store = fixtures::store();
        let catalog = CatalogService::new(store.clone());
        let buyer = fixtures::user(&store, Role::Buyer).await;
        let seller = fixtures::user(&store, Role::Seller).await;
        assert!(matches!(catalog.create_product(&buyer, request(100)).await, Err(MarketplaceError::Forbidden(_))));
        let view = catalog.create_product(&seller, request(100)).await.unwrap();
        assert_eq!(view.seller, seller.id);
    }

    #[tokio::test]
    async fn test_update_authorization() {
        let store = fixtures::store();
        let catalog = CatalogService::new(store.clone());
        let owner = fixtures::user(&store, Role::Seller).await;
        let other = fixtures::user(&store, Role::Seller).await;
        let marketing = fixtures::user(&store, Role::MarketingTeam).await;
        let product = fixtures::product(&store, &owner, Category::Books, 50, 3).await;

        let update = UpdateProduct { stock: Some(7), ..Default::default() };
        assert!(matches!(catalog.update_product(&other, product.id, update.clone()).await, Err(MarketplaceError::Forbidden(_))));
        assert_eq!(catalog.update_product(&owner, product.id, update.clone()).await.unwrap().stock, 7);
        assert!(catalog.update_product(&marketing, product.id, update).await.is_ok());
        assert!(catalog.delete_product(&other, product.id).await.is_err());
        catalog.delete_product(&owner, product.id).await.unwrap();
        assert!(matches!(catalog.get_product(product.id).await, Err(MarketplaceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_listing_hides_inactive_and_filters() {
        let store = fixtures::store();
        let catalog = CatalogService::new(store.clone());
        let seller = fixtures::user(&store, Role::Seller).await;
        fixtures::product(&store, &seller, Category::Books, 20, 3).await;
        fixtures::product(&store, &seller, Category::Electronics, 900, 3).await;
        let hidden = fixtures::product(&store, &seller, Category::Books, 30, 3).await;
        catalog.update_product(&seller, hidden.id, UpdateProduct { is_active: Some(false), ..Default::default() }).await.unwrap();

        let all = catalog.list_products(ProductFilters::default()).await.unwrap();
        assert_eq!(all.pagination.total, 2);
        let books = catalog.list_products(ProductFilters { category: Some("Books".into()), ..Default::default() }).await.unwrap();
        assert_eq!(books.products.len(), 1);
        let cheap = catalog
            .list_products(ProductFilters { max_price: Some("100".into()), sort_by: Some("price".into()), order: Some("asc".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(cheap.products.len(), 1);
        assert!(matches!(catalog.get_product(hidden.id).await, Err(MarketplaceError::NotFound(_))));
        assert_eq!(catalog.seller_products(&seller).await.unwrap().len(), 3);
        assert!(catalog.list_products(ProductFilters { sort_by: Some("colour".into()), ..Default::default() }).await.is_err());
    }

    #[tokio::test]
    async fn test_search_and_price_range() {
        let store = fixtures::store();
        let catalog = CatalogService::new(store.clone());
        let seller = fixtures::user(&store, Role::Seller).await;
        catalog.create_product(&seller, request(100)).await.unwrap();
        let mug = CreateProduct {
            name: "Travel Mug".into(),
            description: "Keeps drinks HOT for hours".into(),
            price: Decimal::new(250, 0),
            category: Category::HomeGarden,
            stock: 4,
            images: vec!["https://img.example/mug.jpg".into()],
            tags: vec!["espresso".into()],
        };
        catalog.create_product(&seller, mug).await.unwrap();
        fixtures::product(&store, &seller, Category::Electronics, 900, 3).await;

        let search = |term: &str| ProductFilters { search: Some(term.into()), ..Default::default() };
        let by_tag = catalog.list_products(search("Espresso")).await.unwrap();
        assert_eq!(by_tag.products.len(), 1);
        assert_eq!(by_tag.products[0].name, "Travel Mug");
        let by_description = catalog.list_products(search("hot for")).await.unwrap();
        assert_eq!(by_description.products.len(), 1);
        assert_eq!(by_description.products[0].name, "Travel Mug");
        let by_category = catalog.list_products(search("garden")).await.unwrap();
        assert_eq!(by_category.products.len(), 1);
        assert!(catalog.list_products(search("tea")).await.unwrap().products.is_empty());

        let range = ProductFilters { min_price: Some("150".into()), max_price: Some("500".into()), ..Default::default() };
        let ranged = catalog.list_products(range).await.unwrap();
        assert_eq!(ranged.pagination.total, 1);
        assert_eq!(ranged.products[0].name, "Travel Mug");
        let bad = ProductFilters { min_price: Some("cheap".into()), ..Default::default() };
        assert!(matches!(catalog.list_products(bad).await, Err(MarketplaceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_one_review_per_user() {
        let store = fixtures::store();
        let catalog = CatalogService::new(store.clone());
        let seller = fixtures::user(&store, Role::Seller).await;
        let buyer = fixtures::user(&store, Role::Buyer).await;
        let product = fixtures::product(&store, &seller, Category::Fashion, 40, 3).await;

        catalog.add_review(&buyer, product.id, NewReview { rating: 4, comment: "Fits well".into() }).await.unwrap();
        assert!(catalog.add_review(&buyer, product.id, NewReview { rating: 5, comment: String::new() }).await.is_err());
        assert!(catalog.add_review(&seller, product.id, NewReview { rating: 5, comment: String::new() }).await.is_err());
        let view = catalog.get_product(product.id).await.unwrap();
        assert_eq!(view.rating.count, 1);
        let other = fixtures::user(&store, Role::Buyer).await;
        assert!(matches!(catalog.add_review(&other, product.id, NewReview { rating: 6, comment: String::new() }).await, Err(MarketplaceError::Validation(_))));
    }
}
