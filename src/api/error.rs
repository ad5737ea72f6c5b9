//! Error responses: `{"success": false, "message": "..."}`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::MarketplaceError;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl MarketplaceError {
    pub fn status(&self) -> StatusCode {
        match self {
            MarketplaceError::Validation(_)
            | MarketplaceError::InsufficientStock { .. }
            | MarketplaceError::InvalidTransition { .. }
            | MarketplaceError::Conflict(_) => StatusCode::BAD_REQUEST,
            MarketplaceError::Unauthorized(_) | MarketplaceError::Token(_) => StatusCode::UNAUTHORIZED,
            MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::OrderNumberExhausted | MarketplaceError::Notification(_) | MarketplaceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(ErrorResponse { success: false, message: self.to_string() })).into_response()
    }
}

impl From<JsonRejection> for MarketplaceError {
    fn from(rejection: JsonRejection) -> Self { MarketplaceError::Validation(rejection.body_text()) }
}

impl From<QueryRejection> for MarketplaceError {
    fn from(rejection: QueryRejection) -> Self { MarketplaceError::Validation(rejection.body_text()) }
}

impl From<PathRejection> for MarketplaceError {
    fn from(rejection: PathRejection) -> Self { MarketplaceError::Validation(rejection.body_text()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OrderStatus;

    #[test]
    fn test_status_mapping() {
        assert_eq!(MarketplaceError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            MarketplaceError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Pending }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(MarketplaceError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(MarketplaceError::not_found("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(MarketplaceError::OrderNumberExhausted.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = MarketplaceError::not_found("Product").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Product not found");
    }
}
