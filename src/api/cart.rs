use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::{AuthUser, Body, Id};
use crate::api::{ok, AppState};
use crate::services::carts::AddToCart;
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: u32,
}

pub async fn get_cart(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.carts.get(user.id).await?))
}

pub async fn add(State(s): State<AppState>, AuthUser(user): AuthUser, Body(req): Body<AddToCart>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.carts.add(user.id, req).await?))
}

pub async fn update(State(s): State<AppState>, AuthUser(user): AuthUser, Id(item_id): Id<Uuid>, Body(req): Body<QuantityUpdate>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.carts.update(user.id, item_id, req.quantity).await?))
}

pub async fn remove(State(s): State<AppState>, AuthUser(user): AuthUser, Id(item_id): Id<Uuid>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.carts.remove(user.id, item_id).await?))
}

pub async fn clear(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.carts.clear(user.id).await?))
}
