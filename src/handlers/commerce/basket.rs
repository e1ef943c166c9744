use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response,
};
use crate::{
    auth::AuthenticatedCustomer, errors::ApiError, services::commerce::QuantityAdjustment,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

/// Creates the router for basket endpoints
pub fn basket_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_basket).delete(clear_basket))
        .route("/items", post(add_item))
        .route("/items/:product_id", delete(remove_item).patch(update_item))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: i32,
    pub quantity: Option<i32>,
}

/// Either a one-step `action` or an absolute `quantity`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub action: Option<QuantityAdjustment>,
    pub quantity: Option<i32>,
}

/// Get the basket, reconciled against live stock
async fn get_basket(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .basket
        .get_basket(customer.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(view))
}

/// Add a product to the basket
async fn add_item(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .basket
        .add_product(customer.customer_id, payload.product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(item))
}

/// Increment, decrement or set a line's quantity
async fn update_item(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(product_id): Path<i32>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let basket = &state.services.basket;
    let updated = match (payload.action, payload.quantity) {
        (Some(action), None) => {
            basket
                .adjust_quantity(customer.customer_id, product_id, action)
                .await
        }
        (None, Some(quantity)) => {
            basket
                .set_quantity(customer.customer_id, product_id, quantity)
                .await
        }
        _ => {
            return Err(ApiError::ValidationError(
                "Provide exactly one of `action` or `quantity`".to_string(),
            ))
        }
    }
    .map_err(map_service_error)?;

    Ok(match updated {
        Some(item) => success_response(item),
        None => success_response(json!({ "product_id": product_id, "removed": true })),
    })
}

/// Remove a product from the basket
async fn remove_item(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(product_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .basket
        .remove_product(customer.customer_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Empty the basket
async fn clear_basket(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .services
        .basket
        .clear_basket(customer.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(json!({ "removed": removed })))
}
