//! Persistence port.
//!
//! Services talk to a [`Store`]; `postgres` is the production implementation
//! and `memory` backs tests and database-less local runs.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Order, Product, Promotion, Review, Subscription, User};
use crate::domain::value_objects::{Category, OrderStatus, Role};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Price,
    Name,
    Rating,
    Stock,
}

impl ProductSort {
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "createdAt" | "created_at" | "newest" => Some(Self::CreatedAt),
            "price" => Some(Self::Price),
            "name" => Some(Self::Name),
            "rating" => Some(Self::Rating),
            "stock" => Some(Self::Stock),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProductQuery {
    pub category: Option<Category>,
    /// Bounds on the effective price.
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Case-insensitive match over name, description, category and tags.
    pub search: Option<String>,
    pub seller_id: Option<Uuid>,
    pub include_inactive: bool,
    pub sort: ProductSort,
    pub descending: bool,
    pub page: u32,
    pub limit: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: None,
            min_price: None,
            max_price: None,
            search: None,
            seller_id: None,
            include_inactive: false,
            sort: ProductSort::CreatedAt,
            descending: true,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ProductQuery {
    pub fn offset(&self) -> u64 { u64::from(self.page.max(1) - 1) * u64::from(self.limit) }
}

#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_sellers: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub pending_orders: u64,
    pub total_revenue: Decimal,
}

#[async_trait]
pub trait Store: Send + Sync {
    // users
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>>;
    async fn update_user(&self, user: &User) -> Result<()>;
    /// Removes the user and their products. `false` when no such user.
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
    async fn list_users(&self, role: Option<Role>, page: u32, limit: u32) -> Result<Page<User>>;
    async fn users_with_roles(&self, roles: &[Role]) -> Result<Vec<User>>;

    // products
    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;
    /// Writes every field except `stock` and `rating`, which only change
    /// through `set_stock`, `place_order` and `insert_review`.
    async fn update_product(&self, product: &Product) -> Result<()>;
    /// `update_product` for a batch, all or nothing.
    async fn update_products(&self, products: &[Product]) -> Result<()>;
    async fn set_stock(&self, id: Uuid, stock: u32) -> Result<()>;
    async fn delete_product(&self, id: Uuid) -> Result<bool>;
    async fn query_products(&self, query: &ProductQuery) -> Result<Page<Product>>;
    async fn products_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>>;
    /// Active products in any of `categories`.
    async fn products_in_categories(&self, categories: &[Category]) -> Result<Vec<Product>>;
    async fn products_with_promotion(&self, promotion_id: Uuid) -> Result<Vec<Product>>;

    // reviews
    async fn find_review(&self, product_id: Uuid, user_id: Uuid) -> Result<Option<Review>>;
    /// Stores the review together with the product's updated rating.
    async fn insert_review(&self, review: &Review, product: &Product) -> Result<()>;

    // carts
    async fn find_cart(&self, user_id: Uuid) -> Result<Option<Cart>>;
    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    // orders
    async fn order_number_exists(&self, order_number: &str) -> Result<bool>;
    /// In one atomic step: decrement each item's stock (failing with
    /// `InsufficientStock` if any product is inactive or short), insert the
    /// order, bump usage of promotions attached to its products, and clear
    /// the buyer's cart when `clear_cart` is set. Nothing is written on failure.
    async fn place_order(&self, order: &Order, clear_cart: bool) -> Result<()>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn update_order(&self, order: &Order) -> Result<()>;
    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
    /// Orders containing at least one of `product_ids`, newest first.
    async fn orders_with_products(&self, product_ids: &[Uuid], statuses: Option<&[OrderStatus]>) -> Result<Vec<Order>>;
    async fn list_orders(&self, status: Option<OrderStatus>, page: u32, limit: u32) -> Result<Page<Order>>;

    // promotions
    async fn insert_promotion(&self, promotion: &Promotion) -> Result<()>;
    async fn find_promotion(&self, id: Uuid) -> Result<Option<Promotion>>;
    async fn update_promotion(&self, promotion: &Promotion) -> Result<()>;
    async fn delete_promotion(&self, id: Uuid) -> Result<bool>;
    async fn list_promotions(&self, active_only: bool) -> Result<Vec<Promotion>>;

    // subscriptions
    async fn find_subscription(&self, email: &str) -> Result<Option<Subscription>>;
    async fn save_subscription(&self, subscription: &Subscription) -> Result<()>;

    async fn dashboard_stats(&self) -> Result<DashboardStats>;
}
