//! Application services.
//!
//! Each service owns an `Arc<dyn Store>` and enforces authorization through
//! the acting [`User`]'s capabilities before touching storage.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::TokenService;
use crate::config::Config;
use crate::domain::aggregates::User;
use crate::domain::value_objects::Capability;
use crate::notify::Notifier;
use crate::store::{Store, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::{MarketplaceError, Result};

pub mod accounts;
pub mod admin;
pub mod carts;
pub mod catalog;
pub mod orders;
pub mod promotions;
pub mod subscriptions;

pub use accounts::AccountService;
pub use admin::AdminService;
pub use carts::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use promotions::PromotionService;
pub use subscriptions::SubscriptionService;

/// Every service wired against one store and notifier.
#[derive(Clone)]
pub struct Services {
    pub accounts: AccountService,
    pub admin: AdminService,
    pub carts: CartService,
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub promotions: PromotionService,
    pub subscriptions: SubscriptionService,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, tokens: Arc<TokenService>, config: &Config) -> Self {
        Self {
            accounts: AccountService::new(store.clone(), tokens),
            admin: AdminService::new(store.clone()),
            carts: CartService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            orders: OrderService::new(store.clone(), notifier, config.default_country.clone()),
            promotions: PromotionService::new(store.clone()),
            subscriptions: SubscriptionService::new(store),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 { 0 } else { total.div_ceil(u64::from(limit)) };
        Self { page, limit, total, pages }
    }
}

/// Clamp caller-supplied paging to `1..` pages of `1..=MAX_PAGE_SIZE` rows.
pub fn page_bounds(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    (page.unwrap_or(1).max(1), limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE))
}

pub(crate) fn require(actor: &User, capability: Capability, action: &str) -> Result<()> {
    if actor.can(capability) { return Ok(()); }
    tracing::warn!(user_id = %actor.id, role = %actor.role, ?capability, "forbidden: {action}");
    Err(MarketplaceError::forbidden(format!("User role {} is not authorized to {action}", actor.role)))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::aggregates::{NewProduct, Product};
    use crate::domain::value_objects::{Category, Role};
    use crate::store::MemoryStore;

    pub fn store() -> Arc<dyn Store> { Arc::new(MemoryStore::new()) }

    pub async fn user(store: &Arc<dyn Store>, role: Role) -> User {
        let user = User::register(format!("{role} user"), format!("{}@example.com", uuid::Uuid::now_v7()), None, role);
        store.insert_user(&user).await.unwrap();
        user
    }

    pub async fn product(store: &Arc<dyn Store>, seller: &User, category: Category, price: i64, stock: u32) -> Product {
        let product = Product::create(seller.id, NewProduct {
            name: format!("{category} item"),
            description: "Sample listing".into(),
            price: Decimal::new(price, 0),
            category,
            stock,
            images: vec!["https://img.example/1.jpg".into()],
            tags: vec!["sample".into()],
        })
        .unwrap();
        store.insert_product(&product).await.unwrap();
        product
    }

    #[test]
    fn test_pagination() {
        assert_eq!(Pagination::new(1, 12, 25).pages, 3);
        assert_eq!(Pagination::new(1, 12, 0).pages, 0);
        assert_eq!(page_bounds(None, Some(500)), (1, MAX_PAGE_SIZE));
        assert_eq!(page_bounds(Some(0), Some(0)), (1, 1));
    }
}
