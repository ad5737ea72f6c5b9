//! Back-office operations and the public top-seller ranking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{Order, Product, ProductView, User};
use crate::domain::value_objects::{Capability, OrderStatus, Role};
use crate::services::catalog::ProductPage;
use crate::services::{page_bounds, require, Pagination};
use crate::store::{DashboardStats, ProductQuery, Store};
use crate::{MarketplaceError, Result};

pub const DEFAULT_TOP_SELLERS: usize = 10;

/// Order states that count towards a seller's ranking.
const RANKED_STATUSES: &[OrderStatus] = &[OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered];

const SELLER_ROLES: &[Role] = &[Role::Individual, Role::Seller, Role::ProductProvider];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub role: Option<Role>,
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub is_verified: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSeller {
    pub id: Uuid,
    pub name: String,
    pub company_name: Option<String>,
    pub logo: Option<String>,
    pub is_verified: bool,
    pub product_count: u32,
    pub average_rating: f64,
    pub order_count: u32,
}

impl TopSeller {
    fn score(&self) -> f64 {
        f64::from(self.order_count) * 10.0 + self.average_rating * 2.0 + f64::from(self.product_count)
    }
}

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn stats(&self, actor: &User) -> Result<DashboardStats> {
        require(actor, Capability::ViewDashboard, "view the dashboard")?;
        self.store.dashboard_stats().await
    }

    pub async fn list_users(&self, actor: &User, params: ListParams) -> Result<UserPage> {
        require(actor, Capability::ManageUsers, "manage users")?;
        let (page, limit) = page_bounds(params.page, params.limit);
        let found = self.store.list_users(params.role, page, limit).await?;
        Ok(UserPage { users: found.items, pagination: Pagination::new(page, limit, found.total) })
    }

    pub async fn update_user(&self, actor: &User, id: Uuid, update: UserUpdate) -> Result<User> {
        require(actor, Capability::ManageUsers, "manage users")?;
        let mut user = self.store.find_user(id).await?.ok_or_else(|| MarketplaceError::not_found("User"))?;
        if user.id == actor.id && (update.role.is_some_and(|r| r != user.role) || update.is_active == Some(false)) {
            return Err(MarketplaceError::validation("You cannot change your own role or deactivate yourself"));
        }
        if let Some(role) = update.role { user.role = role; }
        if let Some(verified) = update.is_verified { user.is_verified = verified; }
        if let Some(active) = update.is_active { user.is_active = active; }
        user.touch();
        self.store.update_user(&user).await?;
        info!(user_id = %id, role = %user.role, active = user.is_active, actor_id = %actor.id, "user updated by admin");
        Ok(user)
    }

    /// Deleting a user also deletes their products.
    pub async fn delete_user(&self, actor: &User, id: Uuid) -> Result<()> {
        require(actor, Capability::ManageUsers, "manage users")?;
        if id == actor.id { return Err(MarketplaceError::validation("You cannot delete your own account")); }
        if !self.store.delete_user(id).await? { return Err(MarketplaceError::not_found("User")); }
        info!(user_id = %id, actor_id = %actor.id, "user deleted");
        Ok(())
    }

    /// Every product, active or not.
    pub async fn list_products(&self, actor: &User, params: ListParams) -> Result<ProductPage> {
        require(actor, Capability::ViewDashboard, "view the dashboard")?;
        let (page, limit) = page_bounds(params.page, params.limit);
        let query = ProductQuery { include_inactive: true, page, limit, ..ProductQuery::default() };
        let found = self.store.query_products(&query).await?;
        Ok(ProductPage { products: found.items.iter().map(Product::view).collect(), pagination: Pagination::new(page, limit, found.total) })
    }

    pub async fn set_product_status(&self, actor: &User, id: Uuid, is_active: bool) -> Result<ProductView> {
        require(actor, Capability::ManageAnyProduct, "manage products")?;
        let mut product = self.store.find_product(id).await?.ok_or_else(|| MarketplaceError::not_found("Product"))?;
        product.is_active = is_active;
        product.touch();
        self.store.update_product(&product).await?;
        info!(product_id = %id, is_active, actor_id = %actor.id, "product status changed");
        let stored = self.store.find_product(id).await?.ok_or_else(|| MarketplaceError::not_found("Product"))?;
        Ok(stored.view())
    }

    pub async fn delete_product(&self, actor: &User, id: Uuid) -> Result<()> {
        require(actor, Capability::ManageAnyProduct, "manage products")?;
        if !self.store.delete_product(id).await? { return Err(MarketplaceError::not_found("Product")); }
        info!(product_id = %id, actor_id = %actor.id, "product deleted by admin");
        Ok(())
    }

    pub async fn list_orders(&self, actor: &User, params: ListParams) -> Result<OrderPage> {
        require(actor, Capability::ViewAllOrders, "view all orders")?;
        let (page, limit) = page_bounds(params.page, params.limit);
        let found = self.store.list_orders(params.status, page, limit).await?;
        Ok(OrderPage { orders: found.items, pagination: Pagination::new(page, limit, found.total) })
    }

    /// Verified sellers first, backfilled with unverified ones when there are
    /// fewer than `limit`. Ranked by `orders * 10 + average rating * 2 + products`.
    pub async fn top_sellers(&self, limit: usize) -> Result<Vec<TopSeller>> {
        let (mut verified, unverified): (Vec<User>, Vec<User>) =
            self.store.users_with_roles(SELLER_ROLES).await?.into_iter().filter(|u| u.is_active).partition(|u| u.is_verified);
        if verified.len() < limit {
            verified.extend(unverified);
        }

        let mut ranked = Vec::with_capacity(verified.len());
        for seller in verified {
            let products: Vec<Product> = self.store.products_by_seller(seller.id).await?.into_iter().filter(|p| p.is_active).collect();
            if products.is_empty() { continue; }
            let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
            let order_count = self.store.orders_with_products(&ids, Some(RANKED_STATUSES)).await?.len();
            ranked.push(TopSeller {
                id: seller.id,
                name: seller.name,
                company_name: seller.company_name,
                logo: seller.logo,
                is_verified: seller.is_verified,
                product_count: u32::try_from(products.len()).unwrap_or(u32::MAX),
                average_rating: weighted_rating(&products),
                order_count: u32::try_from(order_count).unwrap_or(u32::MAX),
            });
        }
        ranked.sort_by(|a, b| b.score().total_cmp(&a.score()));
        ranked.truncate(limit);
        Ok(ranked)
    }
}

/// Average rating across products, weighted by each product's review count.
fn weighted_rating(products: &[Product]) -> f64 {
    let reviews: u32 = products.iter().map(|p| p.rating.count).sum();
    if reviews == 0 { return 0.0; }
    let total: f64 = products.iter().map(|p| p.rating.average * f64::from(p.rating.count)).sum();
    (total / f64::from(reviews) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ShippingAddress;
    use crate::domain::value_objects::{Category, PaymentMethod};
    use crate::notify::LogNotifier;
    use crate::services::fixtures;
    use crate::services::orders::{CreateOrder, LineRequest, OrderService, StatusUpdate};
    use rust_decimal::Decimal;

    async fn buy(orders: &OrderService, buyer: &User, product: Uuid) -> Order {
        let req = CreateOrder {
            shipping_address: Some(ShippingAddress { street: "s".into(), city: "c".into(), phone: "p".into(), ..Default::default() }),
            payment_method: Some(PaymentMethod::MobileMoney),
            shipping_cost: Some(Decimal::ZERO),
            use_cart: false,
            items: vec![LineRequest { product_id: product, quantity: 1 }],
        };
        orders.create_order(buyer, req).await.unwrap()
    }

    #[tokio::test]
    async fn test_capabilities_gate_admin_operations() {
        let store = fixtures::store();
        let admin = AdminService::new(store.clone());
        let support = fixtures::user(&store, Role::CustomerSupport).await;
        let seller = fixtures::user(&store, Role::Seller).await;
        assert!(admin.stats(&support).await.is_ok());
        assert!(admin.list_orders(&support, ListParams::default()).await.is_ok());
        assert!(matches!(admin.list_users(&support, ListParams::default()).await, Err(MarketplaceError::Forbidden(_))));
        assert!(matches!(admin.stats(&seller).await, Err(MarketplaceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_user_management() {
        let store = fixtures::store();
        let admin = AdminService::new(store.clone());
        let boss = fixtures::user(&store, Role::Admin).await;
        let seller = fixtures::user(&store, Role::Seller).await;
        let product = fixtures::product(&store, &seller, Category::Books, 10, 1).await;

        let verified = admin.update_user(&boss, seller.id, UserUpdate { is_verified: Some(true), ..Default::default() }).await.unwrap();
        assert!(verified.is_verified);
        let sellers = admin.list_users(&boss, ListParams { role: Some(Role::Seller), ..Default::default() }).await.unwrap();
        assert_eq!(sellers.pagination.total, 1);
        assert!(admin.delete_user(&boss, boss.id).await.is_err());

        admin.delete_user(&boss, seller.id).await.unwrap();
        assert!(store.find_product(product.id).await.unwrap().is_none());
        assert!(matches!(admin.delete_user(&boss, seller.id).await, Err(MarketplaceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_product_moderation() {
        let store = fixtures::store();
        let admin = AdminService::new(store.clone());
        let boss = fixtures::user(&store, Role::SuperAdmin).await;
        let seller = fixtures::user(&store, Role::Seller).await;
        let product = fixtures::product(&store, &seller, Category::Books, 10, 1).await;

        admin.set_product_status(&boss, product.id, false).await.unwrap();
        let listed = admin.list_products(&boss, ListParams::default()).await.unwrap();
        assert_eq!(listed.products.len(), 1);
        assert!(!listed.products[0].is_active);
        admin.delete_product(&boss, product.id).await.unwrap();
        assert!(admin.delete_product(&boss, product.id).await.is_err());
    }

    #[tokio::test]
    async fn test_top_sellers_ranking() {
        let store = fixtures::store();
        let admin = AdminService::new(store.clone());
        let orders = OrderService::new(store.clone(), Arc::new(LogNotifier), "Ethiopia");
        let buyer = fixtures::user(&store, Role::Buyer).await;
        let busy = fixtures::user(&store, Role::Seller).await;
        let quiet = fixtures::user(&store, Role::ProductProvider).await;
        let _no_products = fixtures::user(&store, Role::Individual).await;

        let hit = fixtures::product(&store, &busy, Category::Books, 10, 10).await;
        fixtures::product(&store, &quiet, Category::Books, 10, 10).await;
        fixtures::product(&store, &quiet, Category::Books, 10, 10).await;
        let order = buy(&orders, &buyer, hit.id).await;
        buy(&orders, &buyer, hit.id).await;
        let boss = fixtures::user(&store, Role::Admin).await;
        orders.update_status(&boss, order.id, StatusUpdate { order_status: Some(OrderStatus::Processing), ..Default::default() }).await.unwrap();

        let top = admin.top_sellers(DEFAULT_TOP_SELLERS).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, busy.id);
        assert_eq!(top[0].order_count, 1);
        assert_eq!(top[1].product_count, 2);
        let json = serde_json::to_value(&top[0]).unwrap();
        assert!(json.get("score").is_none());
        assert_eq!(admin.top_sellers(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_verified_sellers_fill_first() {
        let store = fixtures::store();
        let admin = AdminService::new(store.clone());
        let boss = fixtures::user(&store, Role::Admin).await;
        let verified = fixtures::user(&store, Role::Seller).await;
        let unverified = fixtures::user(&store, Role::Seller).await;
        admin.update_user(&boss, verified.id, UserUpdate { is_verified: Some(true), ..Default::default() }).await.unwrap();
        fixtures::product(&store, &verified, Category::Books, 10, 1).await;
        for _ in 0..3 { fixtures::product(&store, &unverified, Category::Books, 10, 1).await; }

        let top = admin.top_sellers(1).await.unwrap();
        assert_eq!(top[0].id, verified.id);
        assert_eq!(admin.top_sellers(2).await.unwrap()[0].id, unverified.id);
    }

    #[tokio::test]
    async fn test_weighted_rating() {
        let store = fixtures::store();
        let seller = fixtures::user(&store, Role::Seller).await;
        let mut popular = fixtures::product(&store, &seller, Category::Books, 10, 1).await;
        let mut niche = fixtures::product(&store, &seller, Category::Books, 10, 1).await;
        assert_eq!(weighted_rating(&[popular.clone(), niche.clone()]), 0.0);
        for _ in 0..3 { popular.record_rating(5); }
        niche.record_rating(1);
        assert_eq!(weighted_rating(&[popular, niche]), 4.0);
    }
}
