use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{
    auth::AuthenticatedCustomer, entities::CardDetails, errors::ApiError, AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

/// Creates the router for payment endpoints
pub fn payments_routes() -> Router<AppState> {
    Router::new()
        .route("/cards", post(register_card))
        .route("/:id", get(get_payment))
        .route("/:id/pay", post(make_payment))
        .route("/:id/refund", post(refund_payment))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterCardRequest {
    pub holder_name: String,
    #[serde(flatten)]
    pub card: CardDetails,
}

async fn get_payment(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(payment_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .services
        .payments
        .get_payment(customer.customer_id, payment_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(payment))
}

/// Mark a pending payment as paid
async fn make_payment(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(payment_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .services
        .payments
        .make_payment(customer.customer_id, payment_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(payment))
}

/// Refund a paid payment
async fn refund_payment(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(payment_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .services
        .payments
        .refund_payment(customer.customer_id, payment_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(payment))
}

/// Store a card for later digital payments
async fn register_card(
    State(state): State<AppState>,
    _customer: AuthenticatedCustomer,
    Json(payload): Json<RegisterCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state
        .services
        .payments
        .register_card(&payload.holder_name, &payload.card)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(card))
}
