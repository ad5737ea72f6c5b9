//! Request extractors.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};

use crate::api::AppState;
use crate::domain::aggregates::User;
use crate::MarketplaceError;

/// JSON body whose rejections use the standard error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(MarketplaceError))]
pub struct Body<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(MarketplaceError))]
pub struct Params<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(MarketplaceError))]
pub struct Id<T>(pub T);

/// The authenticated, active caller.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = MarketplaceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| MarketplaceError::Unauthorized("Not authorized, no token".into()))?;
        let claims = state.tokens.verify(token.trim())?;
        let user = match state.services.accounts.me(claims.user_id()?).await {
            Ok(user) => user,
            Err(MarketplaceError::NotFound(_)) => return Err(MarketplaceError::Unauthorized("Not authorized, user not found".into())),
            Err(e) => return Err(e),
        };
        if !user.is_active {
            return Err(MarketplaceError::Unauthorized("Account is deactivated".into()));
        }
        Ok(AuthUser(user))
    }
}
