use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::{AuthUser, Body, Id, Params};
use crate::api::{done, ok, AppState};
use crate::services::admin::{ListParams, UserUpdate, DEFAULT_TOP_SELLERS};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct TopSellersQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStatus {
    pub is_active: bool,
}

pub async fn top_sellers(State(s): State<AppState>, Params(q): Params<TopSellersQuery>) -> Result<impl IntoResponse> {
    let limit = q.limit.unwrap_or(DEFAULT_TOP_SELLERS).clamp(1, 100);
    Ok(ok(s.services.admin.top_sellers(limit).await?))
}

pub async fn stats(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.admin.stats(&user).await?))
}

pub async fn users(State(s): State<AppState>, AuthUser(user): AuthUser, Params(params): Params<ListParams>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.admin.list_users(&user, params).await?))
}

pub async fn update_user(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>, Body(req): Body<UserUpdate>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.admin.update_user(&user, id, req).await?))
}

pub async fn delete_user(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>) -> Result<impl IntoResponse> {
    s.services.admin.delete_user(&user, id).await?;
    Ok(done("User deleted"))
}

pub async fn products(State(s): State<AppState>, AuthUser(user): AuthUser, Params(params): Params<ListParams>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.admin.list_products(&user, params).await?))
}

pub async fn product_status(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>, Body(req): Body<ProductStatus>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.admin.set_product_status(&user, id, req.is_active).await?))
}

pub async fn delete_product(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>) -> Result<impl IntoResponse> {
    s.services.admin.delete_product(&user, id).await?;
    Ok(done("Product deleted"))
}

pub async fn orders(State(s): State<AppState>, AuthUser(user): AuthUser, Params(params): Params<ListParams>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.admin.list_orders(&user, params).await?))
}
