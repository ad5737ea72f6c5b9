use axum::{extract::State, response::IntoResponse};

use crate::api::extract::Body;
use crate::api::{created, ok, AppState};
use crate::services::subscriptions::SubscriptionRequest;
use crate::Result;

pub async fn subscribe(State(s): State<AppState>, Body(req): Body<SubscriptionRequest>) -> Result<impl IntoResponse> {
    Ok(created(s.services.subscriptions.subscribe(req).await?))
}

pub async fn unsubscribe(State(s): State<AppState>, Body(req): Body<SubscriptionRequest>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.subscriptions.unsubscribe(req).await?))
}
