use axum::{extract::State, response::IntoResponse};
use uuid::Uuid;

use crate::api::extract::{AuthUser, Body, Id, Params};
use crate::api::{created, done, ok, AppState};
use crate::services::catalog::{CreateProduct, NewReview, ProductFilters, UpdateProduct};
use crate::Result;

pub async fn list(State(s): State<AppState>, Params(filters): Params<ProductFilters>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.catalog.list_products(filters).await?))
}

pub async fn get_one(State(s): State<AppState>, Id(id): Id<Uuid>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.catalog.get_product(id).await?))
}

pub async fn mine(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<impl IntoResponse> {
    Ok(ok(s.services.catalog.seller_products(&user).await?))
}

pub async fn create(State(s): State<AppState>, AuthUser(user): AuthUser, Body(req): Body<CreateProduct>) -> Result<impl IntoResponse> {
    Ok(created(s.services.catalog.create_product(&user, req).await?))
}

pub async fn update(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>, Body(req): Body<UpdateProduct>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.catalog.update_product(&user, id, req).await?))
}

pub async fn delete(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>) -> Result<impl IntoResponse> {
    s.services.catalog.delete_product(&user, id).await?;
    Ok(done("Product deleted"))
}

pub async fn review(State(s): State<AppState>, AuthUser(user): AuthUser, Id(id): Id<Uuid>, Body(req): Body<NewReview>) -> Result<impl IntoResponse> {
    Ok(created(s.services.catalog.add_review(&user, id, req).await?))
}
