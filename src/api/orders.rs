use axum::{extract::State, response::IntoResponse};
use uuid::Uuid;

use crate::api::extract::{AuthUser, Body, Id};
use crate::api::{created, ok, AppState};
use crate::services::orders::{CreateOrder, StatusUpdate};
use crate::Result;

pub async fn create(State(s): State<AppState>, AuthUser(user): AuthUser, Body(req): Body<CreateOrder>) -> Result<impl IntoResponse> {
    Ok(created(s.services.orders.create_order(&user, req).await?))
}

pub async fn mine(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.orders.my_orders(&user).await?))
}

pub async fn for_seller(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.orders.seller_orders(&user).await?))
}

pub async fn get_one(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.orders.get_order(&user, id).await?))
}

pub async fn update_status(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>, Body(req): Body<StatusUpdate>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.orders.update_status(&user, id, req).await?))
}
