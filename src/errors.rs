use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "code": "stock_conflict",
    "message": "Basket quantities exceed available stock for products [1001]",
    "details": {"conflicts": [{"product_id": 1001, "requested": 35, "available": 29}]},
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Machine-readable error code callers can branch on
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Structured payload (offending ids, quantities, missing fields)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

/// Coarse error taxonomy used for logging and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, rejected before touching persistent state
    Validation,
    /// Operation invalid for the entity's current state
    StateConflict,
    /// Stock related failures
    ResourceExhausted,
    NotFound,
    Internal,
}

/// A basket line whose quantity cannot be reserved against live stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockShortfall {
    pub product_id: i32,
    pub requested: i32,
    pub available: i32,
}

/// Checkout session fields that must be set before settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionField {
    ShippingAddress,
    Payment,
}

impl std::fmt::Display for SessionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShippingAddress => f.write_str("shipping address"),
            Self::Payment => f.write_str("payment"),
        }
    }
}

fn join_fields(fields: &[SessionField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_ids(conflicts: &[StockShortfall]) -> String {
    conflicts
        .iter()
        .map(|c| c.product_id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    // Validation
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: i32, quantity: i32 },

    #[error("Shipping address must not be empty")]
    EmptyAddress,

    #[error("Basket is empty")]
    EmptyBasket,

    #[error("Validation error: {0}")]
    ValidationError(String),

    // State conflicts
    #[error("Product {product_id} is already in the basket")]
    DuplicateItem { product_id: i32 },

    #[error("Customer {customer_id} already has an active checkout session")]
    SessionAlreadyExists { customer_id: i32 },

    #[error("Customer {customer_id} has no active checkout session")]
    NoActiveSession { customer_id: i32 },

    #[error("Customer {customer_id} has no checkout session to abort")]
    NoSessionToAbort { customer_id: i32 },

    #[error("Basket cannot be changed while checkout is in progress for customer {customer_id}")]
    CheckoutInProgress { customer_id: i32 },

    #[error("Checkout is incomplete: missing {}", join_fields(.missing))]
    CheckoutIncomplete { missing: Vec<SessionField> },

    #[error("Payment {payment_id} is already paid")]
    AlreadyPaid { payment_id: i32 },

    #[error("Payment {payment_id} is already refunded")]
    AlreadyRefunded { payment_id: i32 },

    #[error("Payment {payment_id} has not been paid")]
    NotPaid { payment_id: i32 },

    #[error("Card {card_id} is already recorded against payment {payment_id}")]
    TransactionAlreadyRecorded { card_id: i32, payment_id: i32 },

    #[error("Checkout session of customer {customer_id} already has a payment or has ended")]
    PaymentAlreadyAttached { customer_id: i32 },

    #[error("Payment {payment_id} does not belong to customer {customer_id}")]
    PaymentNotOwned { payment_id: i32, customer_id: i32 },

    // Resource exhausted
    #[error("Product {product_id} is out of stock")]
    OutOfStock { product_id: i32 },

    #[error("Requested {requested} of product {product_id} but only {available} in stock")]
    ExceedsStock {
        product_id: i32,
        requested: i32,
        available: i32,
    },

    #[error("Basket quantities exceed available stock for products [{}]", join_ids(.conflicts))]
    StockConflict { conflicts: Vec<StockShortfall> },

    #[error("Stock for product {product_id} cannot cover a decrease of {requested}")]
    InsufficientStock { product_id: i32, requested: i32 },

    // Not found
    #[error("Product {product_id} not found")]
    ProductNotFound { product_id: i32 },

    #[error("Product {product_id} is not in the basket")]
    BasketItemNotFound { product_id: i32 },

    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: i32 },

    #[error("Payment {payment_id} not found")]
    PaymentNotFound { payment_id: i32 },

    #[error("No stored card matches the supplied card details")]
    CardNotFound,

    // Internal
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Classifies the error into the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidQuantity { .. }
            | Self::EmptyAddress
            | Self::EmptyBasket
            | Self::ValidationError(_)
            | Self::CheckoutIncomplete { .. } => ErrorKind::Validation,
            Self::DuplicateItem { .. }
            | Self::SessionAlreadyExists { .. }
            | Self::NoActiveSession { .. }
            | Self::NoSessionToAbort { .. }
            | Self::CheckoutInProgress { .. }
            | Self::AlreadyPaid { .. }
            | Self::AlreadyRefunded { .. }
            | Self::NotPaid { .. }
            | Self::TransactionAlreadyRecorded { .. }
            | Self::PaymentAlreadyAttached { .. }
            | Self::PaymentNotOwned { .. } => ErrorKind::StateConflict,
            Self::OutOfStock { .. }
            | Self::ExceedsStock { .. }
            | Self::StockConflict { .. }
            | Self::InsufficientStock { .. } => ErrorKind::ResourceExhausted,
            Self::ProductNotFound { .. }
            | Self::BasketItemNotFound { .. }
            | Self::OrderNotFound { .. }
            | Self::PaymentNotFound { .. }
            | Self::CardNotFound => ErrorKind::NotFound,
            Self::DatabaseError(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::EmptyAddress => "empty_address",
            Self::EmptyBasket => "empty_basket",
            Self::ValidationError(_) => "validation_error",
            Self::DuplicateItem { .. } => "duplicate_item",
            Self::SessionAlreadyExists { .. } => "session_already_exists",
            Self::NoActiveSession { .. } => "no_active_session",
            Self::NoSessionToAbort { .. } => "no_session_to_abort",
            Self::CheckoutInProgress { .. } => "checkout_in_progress",
            Self::CheckoutIncomplete { .. } => "checkout_incomplete",
            Self::AlreadyPaid { .. } => "already_paid",
            Self::AlreadyRefunded { .. } => "already_refunded",
            Self::NotPaid { .. } => "not_paid",
            Self::TransactionAlreadyRecorded { .. } => "transaction_already_recorded",
            Self::PaymentAlreadyAttached { .. } => "payment_already_attached",
            Self::PaymentNotOwned { .. } => "payment_not_owned",
            Self::OutOfStock { .. } => "out_of_stock",
            Self::ExceedsStock { .. } => "exceeds_stock",
            Self::StockConflict { .. } => "stock_conflict",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::ProductNotFound { .. } => "product_not_found",
            Self::BasketItemNotFound { .. } => "basket_item_not_found",
            Self::OrderNotFound { .. } => "order_not_found",
            Self::PaymentNotFound { .. } => "payment_not_found",
            Self::CardNotFound => "card_not_found",
            Self::DatabaseError(_) => "database_error",
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CheckoutInProgress { .. } | Self::PaymentNotOwned { .. } => {
                StatusCode::FORBIDDEN
            }
            Self::NoActiveSession { .. } | Self::NoSessionToAbort { .. } => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            _ => match self.kind() {
                ErrorKind::Validation | ErrorKind::ResourceExhausted => StatusCode::BAD_REQUEST,
                ErrorKind::StateConflict => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Structured payload rendered into `ErrorResponse::details`.
    pub fn details(&self) -> Option<serde_json::Value> {
        let value = match self {
            Self::InvalidQuantity {
                product_id,
                quantity,
            } => json!({ "product_id": product_id, "quantity": quantity }),
            Self::DuplicateItem { product_id }
            | Self::OutOfStock { product_id }
            | Self::ProductNotFound { product_id }
            | Self::BasketItemNotFound { product_id } => json!({ "product_id": product_id }),
            Self::ExceedsStock {
                product_id,
                requested,
                available,
            } => json!({
                "product_id": product_id,
                "requested": requested,
                "available": available,
            }),
            Self::InsufficientStock {
                product_id,
                requested,
            } => json!({ "product_id": product_id, "requested": requested }),
            Self::StockConflict { conflicts } => json!({ "conflicts": conflicts }),
            Self::CheckoutIncomplete { missing } => json!({ "missing": missing }),
            Self::TransactionAlreadyRecorded {
                card_id,
                payment_id,
            } => json!({ "card_id": card_id, "payment_id": payment_id }),
            Self::AlreadyPaid { payment_id }
            | Self::AlreadyRefunded { payment_id }
            | Self::NotPaid { payment_id }
            | Self::PaymentNotFound { payment_id }
            | Self::PaymentNotOwned { payment_id, .. } => json!({ "payment_id": payment_id }),
            Self::OrderNotFound { order_id } => json!({ "order_id": order_id }),
            _ => return None,
        };
        Some(value)
    }

    /// Translates a unique-constraint violation into the given error,
    /// passing every other database error through untouched.
    pub fn on_unique_violation(err: DbErr, conflict: ServiceError) -> ServiceError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => conflict,
            _ => ServiceError::DatabaseError(err),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.kind() == ErrorKind::Internal {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::ServiceError(service_error) => return service_error.into_response(),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
        };

        let error_response = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            code: code.to_string(),
            message,
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id_and_details() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::StockConflict {
                    conflicts: vec![StockShortfall {
                        product_id: 1001,
                        requested: 35,
                        available: 29,
                    }],
                }
                .into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.code, "stock_conflict");
        assert!(payload.message.contains("1001"));
        let details = payload.details.unwrap();
        assert_eq!(details["conflicts"][0]["available"], 29);
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::DuplicateItem { product_id: 1 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::SessionAlreadyExists { customer_id: 1 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::CheckoutInProgress { customer_id: 1 }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::EmptyBasket.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::StockConflict { conflicts: vec![] }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::CheckoutIncomplete {
                missing: vec![SessionField::Payment]
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::CardNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::NoActiveSession { customer_id: 1 }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::TransactionAlreadyRecorded {
                card_id: 1,
                payment_id: 2
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::PaymentAlreadyAttached { customer_id: 1 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            ServiceError::ExceedsStock {
                product_id: 1,
                requested: 5,
                available: 2
            }
            .kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(
            ServiceError::AlreadyPaid { payment_id: 3 }.kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(ServiceError::EmptyAddress.kind(), ErrorKind::Validation);
        assert_eq!(
            ServiceError::OrderNotFound { order_id: 9 }.kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn incomplete_checkout_names_missing_fields() {
        let err = ServiceError::CheckoutIncomplete {
            missing: vec![SessionField::ShippingAddress, SessionField::Payment],
        };
        assert_eq!(
            err.to_string(),
            "Checkout is incomplete: missing shipping address, payment"
        );
        assert_eq!(
            err.details().unwrap()["missing"],
            json!(["shipping_address", "payment"])
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("relation missing".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::CardNotFound.response_message(),
            "No stored card matches the supplied card details"
        );
    }
}
