use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::{AuthUser, Body, Id, Params};
use crate::api::{created, done, ok, AppState};
use crate::services::promotions::{ProductSelection, PromotionInput};
use crate::Result;

#[derive(Debug, Default, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub active: bool,
}

pub async fn list(State(s): State<AppState>, Params(filter): Params<ListFilter>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.promotions.list(filter.active).await?))
}

pub async fn get_one(State(s): State<AppState>, Id(id): Id<Uuid>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.promotions.get(id).await?))
}

pub async fn create(State(s): State<AppState>, AuthUser(user): AuthUser, Body(req): Body<PromotionInput>) -> Result<impl IntoResponse> {
    Ok(created(s.services.promotions.create(&user, req).await?))
}

pub async fn update(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>, Body(req): Body<PromotionInput>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.promotions.update(&user, id, req).await?))
}

pub async fn toggle(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.promotions.toggle(&user, id).await?))
}

pub async fn delete(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>) -> Result<impl IntoResponse> {
    s.services.promotions.delete(&user, id).await?;
    Ok(done("Promotion deleted"))
}

pub async fn apply(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>, Body(req): Body<ProductSelection>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.promotions.apply_to_products(&user, id, &req.product_ids).await?))
}

pub async fn remove_products(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>, Body(req): Body<ProductSelection>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.promotions.remove_from_products(&user, id, &req.product_ids).await?))
}
