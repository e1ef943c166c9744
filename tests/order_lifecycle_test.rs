mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, Utc};
use common::{ShortestDelivery, TestApp};
use farmstand_api::{
    entities::{customer_order, OrderStatus, PaymentMethod},
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::{DeliverySimulator, DeliveryWindow, OrderDetails, OrderService},
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;

const CUSTOMER: i32 = 41;

async fn settle_order(app: &TestApp, product_id: i32) -> OrderDetails {
    let services = app.services();
    services
        .basket
        .add_product(CUSTOMER, product_id, Some(2))
        .await
        .unwrap();
    services.checkout.start_checkout(CUSTOMER).await.unwrap();
    services
        .checkout
        .set_shipping_address(CUSTOMER, "12 Orchard Lane")
        .await
        .unwrap();
    services
        .payments
        .set_payment(CUSTOMER, PaymentMethod::Cod)
        .await
        .unwrap();
    services.checkout.complete_checkout(CUSTOMER).await.unwrap()
}

fn hours_after(order: &OrderDetails, hours: i64) -> DateTime<Utc> {
    order.order.created_at + Duration::hours(hours)
}

/// An order service publishing to a channel the test can drain.
fn observed_orders(app: &TestApp) -> (OrderService, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(16);
    let simulator = Arc::new(DeliverySimulator::new(
        DeliveryWindow::default(),
        Arc::new(ShortestDelivery),
    ));
    let service = OrderService::new(
        app.state.db.clone(),
        Arc::new(EventSender::new(tx)),
        simulator,
    );
    (service, rx)
}

fn drain(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn milestones_follow_the_configured_window() {
    let app = TestApp::new().await;
    app.seed_product(1000, dec!(2.50), 100).await;
    let order = settle_order(&app, 1000).await;

    assert_eq!(order.out_for_delivery_date, Some(hours_after(&order, 12)));
    assert_eq!(order.delivery_date, Some(hours_after(&order, 16)));
    assert_eq!(order.order.estimated_delivery_date, None);
}

#[tokio::test]
async fn order_stays_processing_before_first_milestone() {
    let app = TestApp::new().await;
    app.seed_product(1000, dec!(2.50), 100).await;
    let order = settle_order(&app, 1000).await;

    let fetched = app
        .services()
        .orders
        .get_order_at(CUSTOMER, order.order.order_id, hours_after(&order, 11))
        .await
        .unwrap();
    assert_eq!(fetched.order.order_status, OrderStatus::Processing);
    assert_eq!(fetched.order.estimated_delivery_date, None);
}

#[tokio::test]
async fn order_goes_out_for_delivery_then_delivered() {
    let app = TestApp::new().await;
    app.seed_product(1000, dec!(2.50), 100).await;
    let order = settle_order(&app, 1000).await;
    let orders = &app.services().orders;
    let delivery = order.delivery_date;

    let out = orders
        .get_order_at(CUSTOMER, order.order.order_id, hours_after(&order, 13))
        .await
        .unwrap();
    assert_eq!(out.order.order_status, OrderStatus::OutForDelivery);
    assert_eq!(out.order.estimated_delivery_date, delivery);

    let done = orders
        .get_order_at(CUSTOMER, order.order.order_id, hours_after(&order, 20))
        .await
        .unwrap();
    assert_eq!(done.order.order_status, OrderStatus::Delivered);
    assert_eq!(done.order.estimated_delivery_date, delivery);
}

#[tokio::test]
async fn overdue_order_jumps_straight_to_delivered() {
    let app = TestApp::new().await;
    app.seed_product(1000, dec!(2.50), 100).await;
    let order = settle_order(&app, 1000).await;
    let (orders, mut rx) = observed_orders(&app);

    let listed = orders
        .list_orders_at(CUSTOMER, hours_after(&order, 48))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].order_status, OrderStatus::Delivered);
    assert_eq!(listed[0].estimated_delivery_date, order.delivery_date);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_matches!(
        events[0],
        Event::OrderStatusChanged {
            old_status: OrderStatus::Processing,
            new_status: OrderStatus::Delivered,
            ..
        }
    );

    // Terminal now; a later read changes nothing.
    orders
        .list_orders_at(CUSTOMER, hours_after(&order, 96))
        .await
        .unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn cancelled_orders_are_left_alone() {
    let app = TestApp::new().await;
    app.seed_product(1000, dec!(2.50), 100).await;
    let order = settle_order(&app, 1000).await;

    customer_order::ActiveModel {
        order_id: Set(order.order.order_id),
        order_status: Set(OrderStatus::Cancelled),
        ..Default::default()
    }
    .update(&*app.state.db)
    .await
    .unwrap();

    let fetched = app
        .services()
        .orders
        .get_order_at(CUSTOMER, order.order.order_id, hours_after(&order, 48))
        .await
        .unwrap();
    assert_eq!(fetched.order.order_status, OrderStatus::Cancelled);
    assert_eq!(fetched.order.estimated_delivery_date, None);
}

#[tokio::test]
async fn orders_are_listed_newest_first() {
    let app = TestApp::new().await;
    app.seed_product(1000, dec!(2.50), 100).await;
    app.seed_product(1001, dec!(1.25), 100).await;
    let first = settle_order(&app, 1000).await;
    let second = settle_order(&app, 1001).await;

    let listed = app
        .services()
        .orders
        .list_orders_at(CUSTOMER, first.order.created_at)
        .await
        .unwrap();
    let ids: Vec<i32> = listed.iter().map(|o| o.order_id).collect();
    assert_eq!(ids, vec![second.order.order_id, first.order.order_id]);
}

#[tokio::test]
async fn orders_of_other_customers_are_not_found() {
    let app = TestApp::new().await;
    app.seed_product(1000, dec!(2.50), 100).await;
    let order = settle_order(&app, 1000).await;

    assert_matches!(
        app.services()
            .orders
            .get_order(CUSTOMER + 1, order.order.order_id)
            .await,
        Err(ServiceError::OrderNotFound { .. })
    );
    assert!(app
        .services()
        .orders
        .list_orders(CUSTOMER + 1)
        .await
        .unwrap()
        .is_empty());
}
