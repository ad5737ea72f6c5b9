//! PostgreSQL [`Store`] backed by sqlx.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{DashboardStats, Page, ProductQuery, ProductSort, Store};
use crate::domain::aggregates::{
    AppliedPromotion, Cart, CartItem, Order, OrderItem, Product, Promotion, Rating, Review, ShippingAddress, Subscription, User,
};
use crate::domain::value_objects::{Category, OrderStatus, Role, UnknownVariant};
use crate::{MarketplaceError, Result};

const EFFECTIVE_PRICE: &str = "(CASE WHEN on_sale AND sale_price IS NOT NULL THEN sale_price ELSE price END)";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self { Self { pool } }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id).or_default().push(OrderItem {
                product_id: item.product_id,
                quantity: to_u32(item.quantity)?,
                price: item.price,
            });
        }
        rows.into_iter().map(|row| {
            let items = grouped.remove(&row.id).unwrap_or_default();
            row.into_order(items)
        }).collect()
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn parse<T: FromStr<Err = UnknownVariant>>(raw: &str) -> Result<T> {
    raw.parse().map_err(|e: UnknownVariant| MarketplaceError::Storage(e.to_string()))
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| MarketplaceError::Storage(format!("Unexpected negative value {value}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| MarketplaceError::validation(format!("Value {value} is out of range")))
}

fn unique_violation(e: sqlx::Error, message: impl Into<String>) -> MarketplaceError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => MarketplaceError::Conflict(message.into()),
        _ => e.into(),
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: Option<String>,
    role: String,
    is_verified: bool,
    is_active: bool,
    google_id: Option<String>,
    facebook_id: Option<String>,
    phone: Option<String>,
    company_name: Option<String>,
    logo: Option<String>,
    documents: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = MarketplaceError;
    fn try_from(r: UserRow) -> Result<Self> {
        Ok(User {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            role: parse(&r.role)?,
            is_verified: r.is_verified,
            is_active: r.is_active,
            google_id: r.google_id,
            facebook_id: r.facebook_id,
            phone: r.phone,
            company_name: r.company_name,
            logo: r.logo,
            documents: r.documents,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn users(rows: Vec<UserRow>) -> Result<Vec<User>> { rows.into_iter().map(User::try_from).collect() }

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    images: Vec<String>,
    category: String,
    tags: Vec<String>,
    stock: i32,
    seller_id: Uuid,
    rating_average: f64,
    rating_count: i32,
    on_sale: bool,
    promotion_id: Option<Uuid>,
    sale_price: Option<Decimal>,
    discount_percentage: Option<Decimal>,
    sale_start_date: Option<DateTime<Utc>>,
    sale_end_date: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = MarketplaceError;
    fn try_from(r: ProductRow) -> Result<Self> {
        let promotion = match (r.promotion_id, r.sale_price, r.discount_percentage, r.sale_start_date, r.sale_end_date) {
            (Some(promotion_id), Some(sale_price), Some(discount_percentage), Some(starts_at), Some(ends_at)) => {
                Some(AppliedPromotion { promotion_id, sale_price, discount_percentage, starts_at, ends_at })
            }
            _ => None,
        };
        Ok(Product {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            images: r.images,
            category: parse(&r.category)?,
            tags: r.tags,
            stock: to_u32(r.stock)?,
            seller_id: r.seller_id,
            rating: Rating { average: r.rating_average, count: to_u32(r.rating_count)? },
            on_sale: r.on_sale,
            promotion,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn products(rows: Vec<ProductRow>) -> Result<Vec<Product>> { rows.into_iter().map(Product::try_from).collect() }

const PRODUCT_INSERT: &str = "INSERT INTO products (id, name, description, price, images, category, tags, stock, seller_id, \
    rating_average, rating_count, on_sale, promotion_id, sale_price, discount_percentage, sale_start_date, sale_end_date, \
    is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)";

const PRODUCT_UPDATE: &str = "UPDATE products SET name = $2, description = $3, price = $4, images = $5, category = $6, tags = $7, \
    seller_id = $8, on_sale = $9, promotion_id = $10, sale_price = $11, discount_percentage = $12, sale_start_date = $13, \
    sale_end_date = $14, is_active = $15, updated_at = $16 WHERE id = $1";

fn bind_product_insert(p: &Product) -> Result<Query<'static, Postgres, PgArguments>> {
    let applied = p.promotion.as_ref();
    Ok(sqlx::query(PRODUCT_INSERT)
        .bind(p.id)
        .bind(p.name.clone())
        .bind(p.description.clone())
        .bind(p.price)
        .bind(p.images.clone())
        .bind(p.category.as_str())
        .bind(p.tags.clone())
        .bind(to_i32(p.stock)?)
        .bind(p.seller_id)
        .bind(p.rating.average)
        .bind(to_i32(p.rating.count)?)
        .bind(p.on_sale)
        .bind(applied.map(|a| a.promotion_id))
        .bind(applied.map(|a| a.sale_price))
        .bind(applied.map(|a| a.discount_percentage))
        .bind(applied.map(|a| a.starts_at))
        .bind(applied.map(|a| a.ends_at))
        .bind(p.is_active)
        .bind(p.created_at)
        .bind(p.updated_at))
}

/// Binds for `PRODUCT_UPDATE`. Stock and rating are left to their own statements.
fn bind_product_update(p: &Product) -> Query<'static, Postgres, PgArguments> {
    let applied = p.promotion.as_ref();
    sqlx::query(PRODUCT_UPDATE)
        .bind(p.id)
        .bind(p.name.clone())
        .bind(p.description.clone())
        .bind(p.price)
        .bind(p.images.clone())
        .bind(p.category.as_str())
        .bind(p.tags.clone())
        .bind(p.seller_id)
        .bind(p.on_sale)
        .bind(applied.map(|a| a.promotion_id))
        .bind(applied.map(|a| a.sale_price))
        .bind(applied.map(|a| a.discount_percentage))
        .bind(applied.map(|a| a.starts_at))
        .bind(applied.map(|a| a.ends_at))
        .bind(p.is_active)
        .bind(p.updated_at)
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if !q.include_inactive { qb.push(" AND is_active"); }
    if let Some(category) = q.category { qb.push(" AND category = ").push_bind(category.as_str()); }
    if let Some(seller) = q.seller_id { qb.push(" AND seller_id = ").push_bind(seller); }
    if let Some(min) = q.min_price { qb.push(" AND ").push(EFFECTIVE_PRICE).push(" >= ").push_bind(min); }
    if let Some(max) = q.max_price { qb.push(" AND ").push(EFFECTIVE_PRICE).push(" <= ").push_bind(max); }
    if let Some(search) = q.search.as_deref() {
        let pattern = format!("%{}%", search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR description ILIKE ").push_bind(pattern.clone());
        qb.push(" OR category ILIKE ").push_bind(pattern.clone());
        qb.push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE ").push_bind(pattern).push("))");
    }
}

fn sort_column(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::CreatedAt => "created_at",
        ProductSort::Price => EFFECTIVE_PRICE,
        ProductSort::Name => "lower(name)",
        ProductSort::Rating => "rating_average",
        ProductSort::Stock => "stock",
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(r: ReviewRow) -> Self {
        Review {
            id: r.id,
            product_id: r.product_id,
            user_id: r.user_id,
            rating: u8::try_from(r.rating).unwrap_or(0),
            comment: r.comment,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    payment_status: String,
    order_status: String,
    total_amount: Decimal,
    shipping_cost: Decimal,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            items,
            shipping_address: self.shipping_address.0,
            payment_method: parse(&self.payment_method)?,
            payment_status: parse(&self.payment_status)?,
            order_status: parse(&self.order_status)?,
            total_amount: self.total_amount,
            shipping_cost: self.shipping_cost,
            tracking_number: self.tracking_number,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    price: Decimal,
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    name: String,
    description: String,
    kind: String,
    discount_type: String,
    discount_value: Decimal,
    max_discount: Option<Decimal>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    categories: Vec<String>,
    product_ids: Vec<Uuid>,
    is_active: bool,
    usage_count: i32,
    usage_limit: Option<i32>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = MarketplaceError;
    fn try_from(r: PromotionRow) -> Result<Self> {
        Ok(Promotion {
            id: r.id,
            name: r.name,
            description: r.description,
            kind: parse(&r.kind)?,
            discount_type: parse(&r.discount_type)?,
            discount_value: r.discount_value,
            max_discount: r.max_discount,
            start_date: r.start_date,
            end_date: r.end_date,
            categories: r.categories.iter().map(|c| parse::<Category>(c)).collect::<Result<_>>()?,
            product_ids: r.product_ids,
            is_active: r.is_active,
            usage_count: to_u32(r.usage_count)?,
            usage_limit: r.usage_limit.map(to_u32).transpose()?,
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const PROMOTION_INSERT: &str = "INSERT INTO promotions (id, name, description, kind, discount_type, discount_value, max_discount, \
    start_date, end_date, categories, product_ids, is_active, usage_count, usage_limit, created_by, created_at, updated_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)";

const PROMOTION_UPDATE: &str = "UPDATE promotions SET name = $2, description = $3, kind = $4, discount_type = $5, \
    discount_value = $6, max_discount = $7, start_date = $8, end_date = $9, categories = $10, product_ids = $11, is_active = $12, \
    usage_count = $13, usage_limit = $14, created_by = $15, created_at = $16, updated_at = $17 WHERE id = $1";

fn bind_promotion(sql: &'static str, p: &Promotion) -> Result<Query<'static, Postgres, PgArguments>> {
    Ok(sqlx::query(sql)
        .bind(p.id)
        .bind(p.name.clone())
        .bind(p.description.clone())
        .bind(p.kind.as_str())
        .bind(p.discount_type.as_str())
        .bind(p.discount_value)
        .bind(p.max_discount)
        .bind(p.start_date)
        .bind(p.end_date)
        .bind(p.categories.iter().map(|c| c.as_str().to_string()).collect::<Vec<_>>())
        .bind(p.product_ids.clone())
        .bind(p.is_active)
        .bind(to_i32(p.usage_count)?)
        .bind(p.usage_limit.map(to_i32).transpose()?)
        .bind(p.created_by)
        .bind(p.created_at)
        .bind(p.updated_at))
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    email: String,
    is_active: bool,
    subscribed_at: DateTime<Utc>,
    unsubscribed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(r: SubscriptionRow) -> Self {
        Subscription {
            id: r.id,
            email: r.email,
            is_active: r.is_active,
            subscribed_at: r.subscribed_at,
            unsubscribed_at: r.unsubscribed_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total_users: i64,
    total_sellers: i64,
    total_products: i64,
    total_orders: i64,
    pending_orders: i64,
    total_revenue: Decimal,
}

fn seller_roles() -> Vec<String> {
    Role::ALL.iter().filter(|r| r.is_seller()).map(|r| r.as_str().to_string()).collect()
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, u: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, is_verified, is_active, google_id, facebook_id, phone, \
             company_name, logo, documents, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(u.id).bind(&u.name).bind(&u.email).bind(&u.password_hash).bind(u.role.as_str())
        .bind(u.is_verified).bind(u.is_active).bind(&u.google_id).bind(&u.facebook_id).bind(&u.phone)
        .bind(&u.company_name).bind(&u.logo).bind(&u.documents).bind(u.created_at).bind(u.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "User already exists"))?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email).fetch_optional(&self.pool).await?.map(User::try_from).transpose()
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        users(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ANY($1)").bind(ids.to_vec()).fetch_all(&self.pool).await?)
    }

    async fn update_user(&self, u: &User) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET name = $2, email = $3, password_hash = $4, role = $5, is_verified = $6, is_active = $7, google_id = $8, \
             facebook_id = $9, phone = $10, company_name = $11, logo = $12, documents = $13, updated_at = $14 WHERE id = $1",
        )
        .bind(u.id).bind(&u.name).bind(&u.email).bind(&u.password_hash).bind(u.role.as_str())
        .bind(u.is_verified).bind(u.is_active).bind(&u.google_id).bind(&u.facebook_id).bind(&u.phone)
        .bind(&u.company_name).bind(&u.logo).bind(&u.documents).bind(u.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Email already in use"))?;
        if result.rows_affected() == 0 { return Err(MarketplaceError::not_found("User")); }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        // products, carts and reviews cascade
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, role: Option<Role>, page: u32, limit: u32) -> Result<Page<User>> {
        let role = role.map(|r| r.as_str());
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR role = $1)")
            .bind(role).fetch_one(&self.pool).await?;
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE ($1::text IS NULL OR role = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(role)
        .bind(i64::from(limit))
        .bind(i64::from(page.max(1) - 1) * i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(Page { items: users(rows)?, total: total as u64 })
    }

    async fn users_with_roles(&self, roles: &[Role]) -> Result<Vec<User>> {
        let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        users(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE role = ANY($1) ORDER BY created_at").bind(roles).fetch_all(&self.pool).await?)
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        bind_product_insert(product)?.execute(&self.pool).await?;
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        products(sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)").bind(ids.to_vec()).fetch_all(&self.pool).await?)
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let result = bind_product_update(product).execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(MarketplaceError::not_found("Product")); }
        Ok(())
    }

    async fn update_products(&self, batch: &[Product]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for product in batch {
            let result = bind_product_update(product).execute(&mut *tx).await?;
            if result.rows_affected() == 0 { return Err(MarketplaceError::not_found("Product")); }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_stock(&self, id: Uuid, stock: u32) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(to_i32(stock)?)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 { return Err(MarketplaceError::not_found("Product")); }
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_products(&self, q: &ProductQuery) -> Result<Page<Product>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, q);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM products");
        push_product_filters(&mut select, q);
        select
            .push(" ORDER BY ")
            .push(sort_column(q.sort))
            .push(if q.descending { " DESC" } else { " ASC" })
            .push(", id LIMIT ")
            .push_bind(i64::from(q.limit))
            .push(" OFFSET ")
            .push_bind(q.offset() as i64);
        let rows: Vec<ProductRow> = select.build_query_as().fetch_all(&self.pool).await?;
        Ok(Page { items: products(rows)?, total: total as u64 })
    }

    async fn products_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>> {
        products(
            sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE seller_id = $1 ORDER BY created_at DESC")
                .bind(seller_id).fetch_all(&self.pool).await?,
        )
    }

    async fn products_in_categories(&self, categories: &[Category]) -> Result<Vec<Product>> {
        let categories: Vec<String> = categories.iter().map(|c| c.as_str().to_string()).collect();
        products(
            sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE is_active AND category = ANY($1)")
                .bind(categories).fetch_all(&self.pool).await?,
        )
    }

    async fn products_with_promotion(&self, promotion_id: Uuid) -> Result<Vec<Product>> {
        products(
            sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE promotion_id = $1")
                .bind(promotion_id).fetch_all(&self.pool).await?,
        )
    }

    async fn find_review(&self, product_id: Uuid, user_id: Uuid) -> Result<Option<Review>> {
        Ok(sqlx::query_as::<_, ReviewRow>("SELECT * FROM reviews WHERE product_id = $1 AND user_id = $2")
            .bind(product_id).bind(user_id).fetch_optional(&self.pool).await?.map(Review::from))
    }

    async fn insert_review(&self, review: &Review, product: &Product) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO reviews (id, product_id, user_id, rating, comment, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(review.id).bind(review.product_id).bind(review.user_id).bind(i16::from(review.rating))
            .bind(&review.comment).bind(review.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_violation(e, "You have already reviewed this product"))?;
        sqlx::query("UPDATE products SET rating_average = $2, rating_count = $3, updated_at = $4 WHERE id = $1")
            .bind(product.id).bind(product.rating.average).bind(to_i32(product.rating.count)?).bind(product.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_cart(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let Some(cart) = sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE user_id = $1").bind(user_id).fetch_optional(&self.pool).await?
        else {
            return Ok(None);
        };
        let items = sqlx::query_as::<_, CartItemRow>("SELECT id, product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY position")
            .bind(cart.id)
            .fetch_all(&self.pool)
            .await?;
        Ok(Some(Cart {
            id: cart.id,
            user_id: cart.user_id,
            items: items
                .into_iter()
                .map(|i| -> Result<CartItem> { Ok(CartItem { id: i.id, product_id: i.product_id, quantity: to_u32(i.quantity)? }) })
                .collect::<Result<_>>()?,
            created_at: cart.created_at,
            updated_at: cart.updated_at,
        }))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let cart_id: Uuid = sqlx::query_scalar(
            "INSERT INTO carts (id, user_id, created_at, updated_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET updated_at = EXCLUDED.updated_at RETURNING id",
        )
        .bind(cart.id).bind(cart.user_id).bind(cart.created_at).bind(cart.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(&mut *tx).await?;
        for (position, item) in cart.items.iter().enumerate() {
            sqlx::query("INSERT INTO cart_items (id, cart_id, product_id, quantity, position) VALUES ($1, $2, $3, $4, $5)")
                .bind(item.id).bind(cart_id).bind(item.product_id).bind(to_i32(item.quantity)?).bind(position as i32)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn order_number_exists(&self, order_number: &str) -> Result<bool> {
        Ok(sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_number = $1)")
            .bind(order_number).fetch_one(&self.pool).await?)
    }

    async fn place_order(&self, order: &Order, clear_cart: bool) -> Result<()> {
        // Dropping `tx` on any early return rolls back every write below.
        let mut tx = self.pool.begin().await?;
        for item in &order.items {
            let reserved = sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND is_active AND stock >= $2")
                .bind(item.product_id)
                .bind(to_i32(item.quantity)?)
                .execute(&mut *tx)
                .await?;
            if reserved.rows_affected() == 0 {
                let name: Option<String> = sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
                    .bind(item.product_id).fetch_optional(&mut *tx).await?;
                return Err(MarketplaceError::InsufficientStock { product: name.unwrap_or_else(|| item.product_id.to_string()) });
            }
        }

        sqlx::query(
            "INSERT INTO orders (id, order_number, user_id, shipping_address, payment_method, payment_status, order_status, \
             total_amount, shipping_cost, tracking_number, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(order.id).bind(&order.order_number).bind(order.user_id).bind(Json(order.shipping_address.clone()))
        .bind(order.payment_method.as_str()).bind(order.payment_status.as_str()).bind(order.order_status.as_str())
        .bind(order.total_amount).bind(order.shipping_cost).bind(&order.tracking_number).bind(order.created_at).bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, format!("Order number {} already exists", order.order_number)))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query("INSERT INTO order_items (order_id, position, product_id, quantity, price) VALUES ($1, $2, $3, $4, $5)")
                .bind(order.id).bind(position as i32).bind(item.product_id).bind(to_i32(item.quantity)?).bind(item.price)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "UPDATE promotions SET usage_count = usage_count + 1 WHERE id IN \
             (SELECT DISTINCT promotion_id FROM products WHERE id = ANY($1) AND on_sale AND promotion_id IS NOT NULL)",
        )
        .bind(order.product_ids())
        .execute(&mut *tx)
        .await?;

        if clear_cart {
            sqlx::query("DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)")
                .bind(order.user_id).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        Ok(self.hydrate_orders(vec![row]).await?.pop())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $2, order_status = $3, tracking_number = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(order.id).bind(order.payment_status.as_str()).bind(order.order_status.as_str())
        .bind(&order.tracking_number).bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 { return Err(MarketplaceError::not_found("Order")); }
        Ok(())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id).fetch_all(&self.pool).await?;
        self.hydrate_orders(rows).await
    }

    async fn orders_with_products(&self, product_ids: &[Uuid], statuses: Option<&[OrderStatus]>) -> Result<Vec<Order>> {
        let statuses: Option<Vec<String>> = statuses.map(|s| s.iter().map(|st| st.as_str().to_string()).collect());
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT o.* FROM orders o WHERE EXISTS \
             (SELECT 1 FROM order_items i WHERE i.order_id = o.id AND i.product_id = ANY($1)) \
             AND ($2::text[] IS NULL OR o.order_status = ANY($2)) ORDER BY o.created_at DESC",
        )
        .bind(product_ids.to_vec())
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_orders(rows).await
    }

    async fn list_orders(&self, status: Option<OrderStatus>, page: u32, limit: u32) -> Result<Page<Order>> {
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR order_status = $1)")
            .bind(status).fetch_one(&self.pool).await?;
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE ($1::text IS NULL OR order_status = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(status)
        .bind(i64::from(limit))
        .bind(i64::from(page.max(1) - 1) * i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(Page { items: self.hydrate_orders(rows).await?, total: total as u64 })
    }

    async fn insert_promotion(&self, promotion: &Promotion) -> Result<()> {
        bind_promotion(PROMOTION_INSERT, promotion)?.execute(&self.pool).await?;
        Ok(())
    }

    async fn find_promotion(&self, id: Uuid) -> Result<Option<Promotion>> {
        sqlx::query_as::<_, PromotionRow>("SELECT * FROM promotions WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?.map(Promotion::try_from).transpose()
    }

    async fn update_promotion(&self, promotion: &Promotion) -> Result<()> {
        let result = bind_promotion(PROMOTION_UPDATE, promotion)?.execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(MarketplaceError::not_found("Promotion")); }
        Ok(())
    }

    async fn delete_promotion(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM promotions WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_promotions(&self, active_only: bool) -> Result<Vec<Promotion>> {
        sqlx::query_as::<_, PromotionRow>("SELECT * FROM promotions WHERE (NOT $1 OR is_active) ORDER BY created_at DESC")
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Promotion::try_from)
            .collect()
    }

    async fn find_subscription(&self, email: &str) -> Result<Option<Subscription>> {
        Ok(sqlx::query_as::<_, SubscriptionRow>("SELECT * FROM subscriptions WHERE email = $1")
            .bind(email).fetch_optional(&self.pool).await?.map(Subscription::from))
    }

    async fn save_subscription(&self, s: &Subscription) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscriptions (id, email, is_active, subscribed_at, unsubscribed_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (email) DO UPDATE SET is_active = EXCLUDED.is_active, subscribed_at = EXCLUDED.subscribed_at, \
             unsubscribed_at = EXCLUDED.unsubscribed_at, updated_at = EXCLUDED.updated_at",
        )
        .bind(s.id).bind(&s.email).bind(s.is_active).bind(s.subscribed_at).bind(s.unsubscribed_at).bind(s.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT (SELECT COUNT(*) FROM users) AS total_users, \
             (SELECT COUNT(*) FROM users WHERE role = ANY($1)) AS total_sellers, \
             (SELECT COUNT(*) FROM products) AS total_products, \
             (SELECT COUNT(*) FROM orders) AS total_orders, \
             (SELECT COUNT(*) FROM orders WHERE order_status = 'pending') AS pending_orders, \
             (SELECT COALESCE(SUM(total_amount), 0) FROM orders WHERE order_status <> 'cancelled') AS total_revenue",
        )
        .bind(seller_roles())
        .fetch_one(&self.pool)
        .await?;
        Ok(DashboardStats {
            total_users: row.total_users as u64,
            total_sellers: row.total_sellers as u64,
            total_products: row.total_products as u64,
            total_orders: row.total_orders as u64,
            pending_orders: row.pending_orders as u64,
            total_revenue: row.total_revenue,
        })
    }
}
