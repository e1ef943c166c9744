//! Customer identification for the HTTP surface.
//!
//! Login and token issuance live outside this service; the edge proxy
//! authenticates the caller and forwards their id in [`CUSTOMER_ID_HEADER`].
//! Every basket, checkout, payment and order operation is scoped to that id.

use crate::errors::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

/// Header carrying the authenticated customer's id.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// The caller of a customer-scoped endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthenticatedCustomer {
    pub customer_id: i32,
}

impl AuthenticatedCustomer {
    /// Parses a raw header value into a customer id. Only positive ids are accepted.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let customer_id = raw
            .trim()
            .parse::<i32>()
            .map_err(|_| ApiError::Unauthorized("Invalid customer id".to_string()))?;
        if customer_id <= 0 {
            return Err(ApiError::Unauthorized("Invalid customer id".to_string()));
        }
        Ok(Self { customer_id })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCustomer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CUSTOMER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing customer identity".to_string()))?;
        let raw = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Invalid customer id".to_string()))?;

        let customer = Self::parse(raw)?;
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<AuthenticatedCustomer, ApiError> {
        let mut builder = Request::builder().uri("/api/v1/basket");
        if let Some(value) = header {
            builder = builder.header(CUSTOMER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthenticatedCustomer::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_customer_from_header() {
        let customer = extract(Some(" 42 ")).await.unwrap();
        assert_eq!(customer.customer_id, 42);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        assert_matches!(extract(None).await, Err(ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn rejects_malformed_and_non_positive_ids() {
        for raw in ["abc", "0", "-3", ""] {
            assert_matches!(extract(Some(raw)).await, Err(ApiError::Unauthorized(_)));
        }
    }
}
