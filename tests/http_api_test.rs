mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

const CUSTOMER: i32 = 51;

async fn post_as_customer(
    app: &TestApp,
    uri: &str,
    body: Option<Value>,
) -> axum::response::Response {
    app.request(Method::POST, uri, body, Some(CUSTOMER)).await
}

async fn app_with_products() -> TestApp {
    let app = TestApp::new().await;
    app.seed_product(1000, dec!(2.50), 100).await;
    app.seed_product(1001, dec!(1.25), 29).await;
    app
}

#[tokio::test]
async fn health_endpoint_reports_database() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["checks"]["database"], "healthy");
}

#[tokio::test]
async fn customer_routes_require_identity() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/v1/basket", None, None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(missing).await;
    assert_eq!(body["code"], "unauthorized");

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(-4))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn basket_endpoints() {
    let app = app_with_products().await;

    let added = app
        .request(
            Method::POST,
            "/api/v1/basket/items",
            Some(json!({ "product_id": 1000, "quantity": 2 })),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(added.status(), StatusCode::CREATED);

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/basket/items",
            Some(json!({ "product_id": 1000 })),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(duplicate).await["code"], "duplicate_item");

    let unknown = app
        .request(
            Method::POST,
            "/api/v1/basket/items",
            Some(json!({ "product_id": 9999 })),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let zero = app
        .request(
            Method::POST,
            "/api/v1/basket/items",
            Some(json!({ "product_id": 1001, "quantity": 0 })),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    let incremented = app
        .request(
            Method::PATCH,
            "/api/v1/basket/items/1000",
            Some(json!({ "action": "increment" })),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(incremented.status(), StatusCode::OK);
    assert_eq!(response_json(incremented).await["quantity"], 3);

    let ambiguous = app
        .request(
            Method::PATCH,
            "/api/v1/basket/items/1000",
            Some(json!({ "action": "increment", "quantity": 5 })),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(ambiguous.status(), StatusCode::BAD_REQUEST);

    let basket = app
        .request(Method::GET, "/api/v1/basket", None, Some(CUSTOMER))
        .await;
    assert_eq!(basket.status(), StatusCode::OK);
    let body = response_json(basket).await;
    assert_eq!(body["basket"][0]["product_id"], 1000);
    assert_eq!(body["basket"][0]["quantity"], 3);
    assert_eq!(body["changes"], json!([]));

    let removed = app
        .request(Method::DELETE, "/api/v1/basket/items/1000", None, Some(CUSTOMER))
        .await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    let again = app
        .request(Method::DELETE, "/api/v1/basket/items/1000", None, Some(CUSTOMER))
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_to_order_over_http() {
    let app = app_with_products().await;

    assert_eq!(
        post_as_customer(&app, "/api/v1/checkout", None).await.status(),
        StatusCode::BAD_REQUEST
    );

    post_as_customer(
        &app,
        "/api/v1/basket/items",
        Some(json!({ "product_id": 1000, "quantity": 10 })),
    )
    .await;
    post_as_customer(
        &app,
        "/api/v1/basket/items",
        Some(json!({ "product_id": 1001, "quantity": 11 })),
    )
    .await;

    let started = post_as_customer(&app, "/api/v1/checkout", None).await;
    assert_eq!(started.status(), StatusCode::CREATED);
    let session = response_json(started).await;
    assert_eq!(session["customer_id"], CUSTOMER);
    assert_eq!(session["items"].as_array().map(Vec::len), Some(2));

    let frozen = post_as_customer(&app, "/api/v1/basket/items", Some(json!({ "product_id": 1000 }))).await;
    assert_eq!(frozen.status(), StatusCode::FORBIDDEN);

    let digital = post_as_customer(&app, "/api/v1/checkout/payment", Some(json!({ "method": "digital" }))).await;
    assert_eq!(digital.status(), StatusCode::ACCEPTED);
    let body = response_json(digital).await;
    assert_eq!(body["outcome"], "card_details_required");
    assert_eq!(body["nextApi"], "/api/v1/checkout/payment/digital");

    let incomplete = post_as_customer(&app, "/api/v1/orders", None).await;
    assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(incomplete).await["details"]["missing"],
        json!(["shipping_address", "payment"])
    );

    let address = post_as_customer(
        &app,
        "/api/v1/checkout/shipping-address",
        Some(json!({ "shipping_address": "12 Orchard Lane" })),
    )
    .await;
    assert_eq!(address.status(), StatusCode::OK);

    let cod = post_as_customer(&app, "/api/v1/checkout/payment", Some(json!({ "method": "cod" }))).await;
    assert_eq!(cod.status(), StatusCode::CREATED);
    let payment_id = response_json(cod).await["payment"]["payment_id"]
        .as_i64()
        .expect("payment id");

    let order = post_as_customer(&app, "/api/v1/orders", None).await;
    assert_eq!(order.status(), StatusCode::CREATED);
    let order = response_json(order).await;
    assert_eq!(order["order_status"], "processing");
    let order_id = order["order_id"].as_i64().expect("order id");

    assert_eq!(post_as_customer(&app, "/api/v1/orders", None).await.status(), StatusCode::NOT_FOUND);

    let listed = app
        .request(Method::GET, "/api/v1/orders", None, Some(CUSTOMER))
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(response_json(listed).await.as_array().map(Vec::len), Some(1));

    let fetched = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            None,
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(response_json(fetched).await["items"].as_array().map(Vec::len), Some(2));

    let missing = app
        .request(Method::GET, "/api/v1/orders/9999", None, Some(CUSTOMER))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let pay_uri = format!("/api/v1/payments/{payment_id}/pay");
    let paid = app
        .request(Method::POST, &pay_uri, None, Some(CUSTOMER))
        .await;
    assert_eq!(paid.status(), StatusCode::OK);
    assert_eq!(response_json(paid).await["status"], "paid");
    let twice = app
        .request(Method::POST, &pay_uri, None, Some(CUSTOMER))
        .await;
    assert_eq!(twice.status(), StatusCode::CONFLICT);

    let stranger = app
        .request(Method::POST, &pay_uri, None, Some(CUSTOMER + 1))
        .await;
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn digital_payment_over_http() {
    let app = app_with_products().await;

    let card = app
        .request(
            Method::POST,
            "/api/v1/payments/cards",
            Some(json!({
                "holder_name": "Ada Grower",
                "card_number": "4111111111111111",
                "card_type": "credit",
                "cvv": "123",
                "expiry_date": "12/30",
                "brand": "visa",
            })),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(card.status(), StatusCode::CREATED);
    let card = response_json(card).await;
    assert_eq!(card["last_four"], "1111");
    assert!(card.get("cvv").is_none());

    app.request(
        Method::POST,
        "/api/v1/basket/items",
        Some(json!({ "product_id": 1000, "quantity": 4 })),
        Some(CUSTOMER),
    )
    .await;
    app.request(Method::POST, "/api/v1/checkout", None, Some(CUSTOMER))
        .await;

    let details = json!({
        "card_number": "4111111111111111",
        "card_type": "credit",
        "cvv": "123",
        "expiry_date": "12/30",
        "brand": "visa",
    });
    let receipt = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment/digital",
            Some(details.clone()),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(receipt.status(), StatusCode::CREATED);
    let receipt = response_json(receipt).await;
    assert_eq!(receipt["payment"]["method"], "digital");
    assert_eq!(receipt["payment"]["status"], "pending");

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment/digital",
            Some(details),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let bad_card = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment/digital",
            Some(json!({
                "card_number": "1",
                "card_type": "credit",
                "cvv": "123",
                "expiry_date": "12/30",
                "brand": "visa",
            })),
            Some(CUSTOMER),
        )
        .await;
    assert_eq!(bad_card.status(), StatusCode::BAD_REQUEST);

    let aborted = app
        .request(Method::DELETE, "/api/v1/checkout", None, Some(CUSTOMER))
        .await;
    assert_eq!(aborted.status(), StatusCode::OK);
    let nothing = app
        .request(Method::DELETE, "/api/v1/checkout", None, Some(CUSTOMER))
        .await;
    assert_eq!(nothing.status(), StatusCode::NOT_FOUND);
}
