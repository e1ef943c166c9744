use crate::handlers::common::{
    accepted_response, created_response, map_service_error, success_response, validate_input,
};
use crate::{
    auth::AuthenticatedCustomer,
    entities::{CardDetails, PaymentMethod},
    errors::ApiError,
    services::commerce::PaymentSelection,
    AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(get_checkout).post(start_checkout).delete(abort_checkout),
        )
        .route("/shipping-address", post(set_shipping_address))
        .route("/payment", post(set_payment))
        .route("/payment/digital", post(process_digital_payment))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ShippingAddressRequest {
    #[validate(length(max = 500))]
    pub shipping_address: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPaymentRequest {
    pub method: PaymentMethod,
}

/// Start checkout from the current basket
async fn start_checkout(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .checkout
        .start_checkout(customer.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(view))
}

/// Get the active checkout session
async fn get_checkout(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .checkout
        .get_checkout(customer.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(view))
}

/// Abort checkout and return its items to the basket
async fn abort_checkout(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let restored = state
        .services
        .checkout
        .abort_checkout(customer.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({ "restored": restored })))
}

async fn set_shipping_address(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<ShippingAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let session = state
        .services
        .checkout
        .set_shipping_address(customer.customer_id, &payload.shipping_address)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(session))
}

/// Choose cash on delivery or digital payment
async fn set_payment(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<SetPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let selection = state
        .services
        .payments
        .set_payment(customer.customer_id, payload.method)
        .await
        .map_err(map_service_error)?;

    Ok(match selection {
        PaymentSelection::Attached { .. } => created_response(selection),
        PaymentSelection::CardDetailsRequired { .. } => accepted_response(selection),
        PaymentSelection::Changed { .. } | PaymentSelection::Unchanged { .. } => {
            success_response(selection)
        }
    })
}

/// Pay with a stored card
async fn process_digital_payment(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<CardDetails>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let receipt = state
        .services
        .payments
        .process_digital_payment(customer.customer_id, &payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(receipt))
}
