use axum::{extract::State, response::IntoResponse};

use crate::api::extract::{AuthUser, Body};
use crate::api::{created, ok, AppState};
use crate::services::accounts::{LoginRequest, ProfileUpdate, RegisterRequest};
use crate::Result;

pub async fn register(State(s): State<AppState>, Body(req): Body<RegisterRequest>) -> Result<impl IntoResponse> {
    Ok(created(s.services.accounts.register(req).await?))
}

pub async fn login(State(s): State<AppState>, Body(req): Body<LoginRequest>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.accounts.login(req).await?))
}

pub async fn me(AuthUser(user): AuthUser) -> impl IntoResponse { ok(user) }

pub async fn update_profile(State(s): State<AppState>, AuthUser(user): AuthUser, Body(update): Body<ProfileUpdate>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.accounts.update_profile(user.id, update).await?))
}

