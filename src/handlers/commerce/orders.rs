use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{auth::AuthenticatedCustomer, errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order))
}

/// Settle the active checkout into an order
async fn create_order(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .checkout
        .complete_checkout(customer.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

async fn list_orders(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(customer.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

async fn get_order(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(order_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(customer.customer_id, order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}
