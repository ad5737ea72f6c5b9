//! HTTP surface.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::TokenService;
use crate::config::Config;
use crate::notify::Notifier;
use crate::services::Services;
use crate::store::Store;

pub mod error;
pub mod extract;

mod admin;
mod auth;
mod cart;
mod orders;
mod products;
mod promotions;
mod subscriptions;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: &Config) -> Self {
        let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.jwt_expiry_days));
        Self { services: Services::new(store, notifier, tokens.clone(), config), tokens }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> { Json(Envelope { success: true, data }) }

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) { (StatusCode::CREATED, ok(data)) }

pub fn done(message: &str) -> Json<Value> { Json(json!({ "success": true, "message": message })) }

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/products", get(products::list).post(products::create))
        .route("/products/mine", get(products::mine))
        .route("/products/:id", get(products::get_one).put(products::update).delete(products::delete))
        .route("/products/:id/reviews", post(products::review))
        .route("/cart", get(cart::get_cart).post(cart::add).delete(cart::clear))
        .route("/cart/:item_id", put(cart::update).delete(cart::remove))
        .route("/orders", post(orders::create))
        .route("/orders/my-orders", get(orders::mine))
        .route("/orders/seller-orders", get(orders::for_seller))
        .route("/orders/:id", get(orders::get_one))
        .route("/orders/:id/status", put(orders::update_status))
        .route("/promotions", get(promotions::list).post(promotions::create))
        .route("/promotions/:id", get(promotions::get_one).put(promotions::update).delete(promotions::delete))
        .route("/promotions/:id/toggle", patch(promotions::toggle))
        .route("/promotions/:id/apply", post(promotions::apply))
        .route("/promotions/:id/remove-products", post(promotions::remove_products))
        .route("/admin/top-sellers", get(admin::top_sellers))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/:id", put(admin::update_user).delete(admin::delete_user))
        .route("/admin/products", get(admin::products))
        .route("/admin/products/:id", axum::routing::delete(admin::delete_product))
        .route("/admin/products/:id/status", put(admin::product_status))
        .route("/admin/orders", get(admin::orders))
        .route("/subscriptions/subscribe", post(subscriptions::subscribe))
        .route("/subscriptions/unsubscribe", post(subscriptions::unsubscribe));

    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "dahi-marketplace"})) }))
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
