//! da-hi Marketplace
//!
//! Multi-seller marketplace backend.
//!
//! ## Features
//! - Product catalog with search, filters and pagination
//! - Per-user shopping cart
//! - Checkout with atomic stock reservation and order numbering
//! - Seller order fulfillment
//! - Time-boxed promotions
//! - Admin dashboards and top-seller ranking

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod notify;
pub mod services;
pub mod store;

use domain::value_objects::{OrderStatus, UnknownVariant};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum MarketplaceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient stock for product: {product}")]
    InsufficientStock { product: String },

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("{0}")]
    Conflict(String),

    #[error("Could not allocate a unique order number")]
    OrderNumberExhausted,

    #[error("Token error: {0}")]
    Token(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl MarketplaceError {
    pub fn validation(message: impl Into<String>) -> Self { Self::Validation(message.into()) }
    pub fn forbidden(message: impl Into<String>) -> Self { Self::Forbidden(message.into()) }
    pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self { Self::Storage(e.to_string()) }
}

impl From<sqlx::migrate::MigrateError> for MarketplaceError {
    fn from(e: sqlx::migrate::MigrateError) -> Self { Self::Storage(e.to_string()) }
}

impl From<validator::ValidationErrors> for MarketplaceError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

impl From<UnknownVariant> for MarketplaceError {
    fn from(e: UnknownVariant) -> Self { Self::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, MarketplaceError>;
