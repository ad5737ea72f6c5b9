//! Registration, login and profile maintenance.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{hash_password, verify_password, TokenService};
use crate::domain::aggregates::user::{normalize_email, User};
use crate::domain::value_objects::Role;
use crate::store::Store;
use crate::{MarketplaceError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub logo: Option<String>,
    pub documents: Option<Vec<String>>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    tokens: Arc<TokenService>,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, tokens: Arc<TokenService>) -> Self { Self { store, tokens } }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse> {
        req.validate()?;
        let role = req.role.unwrap_or_default();
        if !Role::SELF_ASSIGNABLE.contains(&role) {
            warn!(%role, "registration with privileged role rejected");
            return Err(MarketplaceError::validation(format!("Role {role} cannot be chosen at registration")));
        }
        if self.store.find_user_by_email(&normalize_email(&req.email)).await?.is_some() {
            return Err(MarketplaceError::Conflict("User already exists".into()));
        }
        let hash = hash_password(&req.password)?;
        let mut user = User::register(req.name.trim(), &req.email, Some(hash), role);
        user.phone = req.phone;
        user.company_name = req.company_name;
        self.store.insert_user(&user).await?;
        info!(user_id = %user.id, %role, "user registered");
        self.respond(user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
        let invalid = || MarketplaceError::Unauthorized("Invalid email or password".into());
        let user = self.store.find_user_by_email(&normalize_email(&req.email)).await?.ok_or_else(invalid)?;
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !verify_password(&req.password, hash) {
            warn!(user_id = %user.id, "failed login");
            return Err(invalid());
        }
        if !user.is_active {
            return Err(MarketplaceError::forbidden("Account is deactivated"));
        }
        info!(user_id = %user.id, "user logged in");
        self.respond(user)
    }

    pub async fn me(&self, user_id: Uuid) -> Result<User> {
        self.store.find_user(user_id).await?.ok_or_else(|| MarketplaceError::not_found("User"))
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<User> {
        let mut user = self.me(user_id).await?;
        if let Some(name) = update.name {
            if name.trim().is_empty() { return Err(MarketplaceError::validation("Name is required")); }
            user.name = name.trim().to_string();
        }
        if update.phone.is_some() { user.phone = update.phone; }
        if update.company_name.is_some() { user.company_name = update.company_name; }
        if update.logo.is_some() { user.logo = update.logo; }
        if let Some(documents) = update.documents { user.documents = documents; }
        if let Some(password) = update.password { user.password_hash = Some(hash_password(&password)?); }
        user.touch();
        self.store.update_user(&user).await?;
        info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    fn respond(&self, user: User) -> Result<AuthResponse> {
        let token = self.tokens.issue(user.id, user.role)?;
        Ok(AuthResponse { token, user })
    }
}
