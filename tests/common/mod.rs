#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use farmstand_api::{
    auth::CUSTOMER_ID_HEADER,
    config::AppConfig,
    db,
    entities::{product, CardDetails, CardSummary, Product, ProductModel},
    events::{self, EventSender},
    handlers::AppServices,
    services::commerce::{DeliveryRng, DeliverySimulator, DeliveryWindow},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Always picks the shortest offset, so milestones are
/// `placed + 12h` and `placed + 16h` with the default window.
pub struct ShortestDelivery;

impl DeliveryRng for ShortestDelivery {
    fn hours_between(&self, min: i64, _max: i64) -> i64 {
        min
    }
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::connect(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx, Vec::new()));

        let simulator = Arc::new(DeliverySimulator::new(
            DeliveryWindow::default(),
            Arc::new(ShortestDelivery),
        ));
        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), simulator);

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            router: farmstand_api::app(state.clone()),
            state,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Inserts a catalog product with a fixed id.
    pub async fn seed_product(
        &self,
        product_id: i32,
        unit_price: Decimal,
        stock_quantity: i32,
    ) -> ProductModel {
        let now = Utc::now();
        product::ActiveModel {
            product_id: Set(product_id),
            store_id: Set(1),
            name: Set(format!("Product {}", product_id)),
            category: Set("vegetables".to_string()),
            unit_price: Set(unit_price),
            stock_quantity: Set(stock_quantity),
            average_rating: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }

    pub async fn stock_of(&self, product_id: i32) -> i32 {
        Product::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("load product")
            .expect("product exists")
            .stock_quantity
    }

    /// Overwrites a product's stock behind the basket's back.
    pub async fn set_stock(&self, product_id: i32, stock_quantity: i32) {
        product::ActiveModel {
            product_id: Set(product_id),
            stock_quantity: Set(stock_quantity),
            ..Default::default()
        }
        .update(&*self.state.db)
        .await
        .expect("update stock");
    }

    pub async fn seed_card(&self) -> (CardSummary, CardDetails) {
        let card = visa();
        let summary = self
            .services()
            .payments
            .register_card("Ada Grower", &card)
            .await
            .expect("seed card for tests");
        (summary, card)
    }

    /// Send a request against the router, optionally as a customer.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        customer_id: Option<i32>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(id) = customer_id {
            builder = builder.header(CUSTOMER_ID_HEADER, id.to_string());
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn visa() -> CardDetails {
    CardDetails {
        card_number: "4111111111111111".to_string(),
        card_type: "credit".to_string(),
        cvv: "123".to_string(),
        expiry_date: "12/30".to_string(),
        brand: "visa".to_string(),
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
