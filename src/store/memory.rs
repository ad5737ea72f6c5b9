//! In-memory [`Store`]. One lock guards every table, so `place_order` is atomic.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DashboardStats, Page, ProductQuery, ProductSort, Store};
use crate::domain::aggregates::{Cart, Order, Product, Promotion, Review, Subscription, User};
use crate::domain::value_objects::{Category, OrderStatus, Role};
use crate::{MarketplaceError, Result};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    reviews: Vec<Review>,
    carts: HashMap<Uuid, Cart>,
    orders: Vec<Order>,
    promotions: HashMap<Uuid, Promotion>,
    subscriptions: HashMap<String, Subscription>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Page<T> {
    let total = items.len() as u64;
    let skip = (page.max(1) as usize - 1) * limit as usize;
    Page { items: items.into_iter().skip(skip).take(limit as usize).collect(), total }
}

fn matches_search(product: &Product, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    product.name.to_lowercase().contains(&needle)
        || product.description.to_lowercase().contains(&needle)
        || product.category.as_str().to_lowercase().contains(&needle)
        || product.tags.iter().any(|t| t.to_lowercase().contains(&needle))
}

fn compare_products(a: &Product, b: &Product, sort: ProductSort) -> Ordering {
    match sort {
        ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        ProductSort::Price => a.effective_price().cmp(&b.effective_price()),
        ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        ProductSort::Rating => a.rating.average.partial_cmp(&b.rating.average).unwrap_or(Ordering::Equal),
        ProductSort::Stock => a.stock.cmp(&b.stock),
    }
}

/// Copy `product` over `slot`, keeping the stored stock and rating.
fn overwrite(slot: &mut Product, product: &Product) {
    let stock = slot.stock;
    let rating = slot.rating;
    *slot = product.clone();
    slot.stock = stock;
    slot.rating = rating;
}

fn newest_first(orders: &mut [Order]) { orders.sort_by(|a, b| b.created_at.cmp(&a.created_at)); }

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(MarketplaceError::Conflict("User already exists".into()));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.users.get(id).cloned()).collect())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables.write().await;
        let slot = t.users.get_mut(&user.id).ok_or_else(|| MarketplaceError::not_found("User"))?;
        *slot = user.clone();
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut t = self.tables.write().await;
        if t.users.remove(&id).is_none() { return Ok(false); }
        t.products.retain(|_, p| p.seller_id != id);
        t.carts.remove(&id);
        Ok(true)
    }

    async fn list_users(&self, role: Option<Role>, page: u32, limit: u32) -> Result<Page<User>> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t.users.values().filter(|u| role.map_or(true, |r| u.role == r)).cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(users, page, limit))
    }

    async fn users_with_roles(&self, roles: &[Role]) -> Result<Vec<User>> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t.users.values().filter(|u| roles.contains(&u.role)).cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        self.tables.write().await.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.products.get(id).cloned()).collect())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut t = self.tables.write().await;
        let slot = t.products.get_mut(&product.id).ok_or_else(|| MarketplaceError::not_found("Product"))?;
        overwrite(slot, product);
        Ok(())
    }

    async fn update_products(&self, products: &[Product]) -> Result<()> {
        let mut t = self.tables.write().await;
        if let Some(missing) = products.iter().find(|p| !t.products.contains_key(&p.id)) {
            tracing::warn!(product_id = %missing.id, "update of unknown product");
            return Err(MarketplaceError::not_found("Product"));
        }
        for product in products {
            if let Some(slot) = t.products.get_mut(&product.id) {
                overwrite(slot, product);
            }
        }
        Ok(())
    }

    async fn set_stock(&self, id: Uuid, stock: u32) -> Result<()> {
        let mut t = self.tables.write().await;
        let slot = t.products.get_mut(&id).ok_or_else(|| MarketplaceError::not_found("Product"))?;
        slot.stock = stock;
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.products.remove(&id).is_some())
    }

    async fn query_products(&self, q: &ProductQuery) -> Result<Page<Product>> {
        let t = self.tables.read().await;
        let mut products: Vec<Product> = t
            .products
            .values()
            .filter(|p| q.include_inactive || p.is_active)
            .filter(|p| q.category.map_or(true, |c| p.category == c))
            .filter(|p| q.seller_id.map_or(true, |s| p.seller_id == s))
            .filter(|p| q.min_price.map_or(true, |min| p.effective_price() >= min))
            .filter(|p| q.max_price.map_or(true, |max| p.effective_price() <= max))
            .filter(|p| q.search.as_deref().map_or(true, |s| matches_search(p, s)))
            .cloned()
            .collect();
        products.sort_by(|a, b| {
            let ord = compare_products(a, b, q.sort);
            if q.descending { ord.reverse() } else { ord }
        });
        Ok(paginate(products, q.page, q.limit))
    }

    async fn products_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>> {
        let t = self.tables.read().await;
        let mut products: Vec<Product> = t.products.values().filter(|p| p.seller_id == seller_id).cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn products_in_categories(&self, categories: &[Category]) -> Result<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(t.products.values().filter(|p| p.is_active && categories.contains(&p.category)).cloned().collect())
    }

    async fn products_with_promotion(&self, promotion_id: Uuid) -> Result<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(t.products.values().filter(|p| p.promotion_id() == Some(promotion_id)).cloned().collect())
    }

    async fn find_review(&self, product_id: Uuid, user_id: Uuid) -> Result<Option<Review>> {
        let t = self.tables.read().await;
        Ok(t.reviews.iter().find(|r| r.product_id == product_id && r.user_id == user_id).cloned())
    }

    async fn insert_review(&self, review: &Review, product: &Product) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.reviews.iter().any(|r| r.product_id == review.product_id && r.user_id == review.user_id) {
            return Err(MarketplaceError::Conflict("You have already reviewed this product".into()));
        }
        let slot = t.products.get_mut(&product.id).ok_or_else(|| MarketplaceError::not_found("Product"))?;
        slot.rating = product.rating;
        slot.updated_at = product.updated_at;
        t.reviews.push(review.clone());
        Ok(())
    }

    async fn find_cart(&self, user_id: Uuid) -> Result<Option<Cart>> {
        Ok(self.tables.read().await.carts.get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.tables.write().await.carts.insert(cart.user_id, cart.clone());
        Ok(())
    }

    async fn order_number_exists(&self, order_number: &str) -> Result<bool> {
        Ok(self.tables.read().await.orders.iter().any(|o| o.order_number == order_number))
    }

    async fn place_order(&self, order: &Order, clear_cart: bool) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(MarketplaceError::Conflict(format!("Order number {} already exists", order.order_number)));
        }

        let mut staged: HashMap<Uuid, Product> = HashMap::new();
        for item in &order.items {
            let product = match staged.entry(item.product_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(t.products.get(&item.product_id).cloned().ok_or_else(|| MarketplaceError::not_found("Product"))?),
            };
            product.reserve_stock(item.quantity)?;
        }

        let promotions: HashSet<Uuid> = staged.values().filter(|p| p.is_discounted()).filter_map(Product::promotion_id).collect();
        for id in promotions {
            if let Some(promotion) = t.promotions.get_mut(&id) {
                promotion.usage_count += 1;
            }
        }
        for (id, product) in staged {
            t.products.insert(id, product);
        }
        t.orders.push(order.clone());
        if clear_cart {
            if let Some(cart) = t.carts.get_mut(&order.user_id) {
                cart.clear();
            }
        }
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let mut t = self.tables.write().await;
        let slot = t.orders.iter_mut().find(|o| o.id == order.id).ok_or_else(|| MarketplaceError::not_found("Order"))?;
        *slot = order.clone();
        Ok(())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let t = self.tables.read().await;
        let mut orders: Vec<Order> = t.orders.iter().filter(|o| o.user_id == user_id).cloned().collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn orders_with_products(&self, product_ids: &[Uuid], statuses: Option<&[OrderStatus]>) -> Result<Vec<Order>> {
        let t = self.tables.read().await;
        let mut orders: Vec<Order> = t
            .orders
            .iter()
            .filter(|o| statuses.map_or(true, |s| s.contains(&o.order_status)))
            .filter(|o| o.items.iter().any(|i| product_ids.contains(&i.product_id)))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_orders(&self, status: Option<OrderStatus>, page: u32, limit: u32) -> Result<Page<Order>> {
        let t = self.tables.read().await;
        let mut orders: Vec<Order> = t.orders.iter().filter(|o| status.map_or(true, |s| o.order_status == s)).cloned().collect();
        newest_first(&mut orders);
        Ok(paginate(orders, page, limit))
    }

    async fn insert_promotion(&self, promotion: &Promotion) -> Result<()> {
        self.tables.write().await.promotions.insert(promotion.id, promotion.clone());
        Ok(())
    }

    async fn find_promotion(&self, id: Uuid) -> Result<Option<Promotion>> {
        Ok(self.tables.read().await.promotions.get(&id).cloned())
    }

    async fn update_promotion(&self, promotion: &Promotion) -> Result<()> {
        let mut t = self.tables.write().await;
        let slot = t.promotions.get_mut(&promotion.id).ok_or_else(|| MarketplaceError::not_found("Promotion"))?;
        *slot = promotion.clone();
        Ok(())
    }

    async fn delete_promotion(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.promotions.remove(&id).is_some())
    }

    async fn list_promotions(&self, active_only: bool) -> Result<Vec<Promotion>> {
        let t = self.tables.read().await;
        let mut promotions: Vec<Promotion> = t.promotions.values().filter(|p| !active_only || p.is_active).cloned().collect();
        promotions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(promotions)
    }

    async fn find_subscription(&self, email: &str) -> Result<Option<Subscription>> {
        Ok(self.tables.read().await.subscriptions.get(email).cloned())
    }

    async fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.tables.write().await.subscriptions.insert(subscription.email.clone(), subscription.clone());
        Ok(())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let t = self.tables.read().await;
        let live = t.orders.iter().filter(|o| o.order_status != OrderStatus::Cancelled);
        Ok(DashboardStats {
            total_users: t.users.len() as u64,
            total_sellers: t.users.values().filter(|u| u.role.is_seller()).count() as u64,
            total_products: t.products.len() as u64,
            total_orders: t.orders.len() as u64,
            pending_orders: t.orders.iter().filter(|o| o.order_status == OrderStatus::Pending).count() as u64,
            total_revenue: live.map(|o| o.total_amount).sum::<Decimal>(),
        })
    }
}
