use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use fulfillment_api::{
    auth::{Actor, AuthService, Role},
    config::AppConfig,
    db,
    entities::{product, user},
    events,
    handlers::AppServices,
    AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application backed by a SQLite
/// database. Each instance gets its own schema.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    auth: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
    db_file: Option<std::path::PathBuf>,
}

impl TestApp {
    /// Construct a new test application with fresh in-memory database state.
    ///
    /// Pricing parameters reproduce the canonical workflow numbers:
    /// 7.5% tax, 5.00 flat shipping, 10.00 return fee.
    pub async fn new() -> Self {
        // In-memory SQLite lives per connection; a second pooled connection
        // would see an empty schema.
        Self::build("sqlite::memory:".to_string(), 1, None).await
    }

    /// Construct a test application over a file-backed database with
    /// several pooled connections, for tests that race concurrent writers.
    #[allow(dead_code)]
    pub async fn new_shared() -> Self {
        let db_file =
            std::env::temp_dir().join(format!("fulfillment-test-{}.sqlite", Uuid::new_v4()));
        let url = format!("sqlite://{}?mode=rwc", db_file.display());
        Self::build(url, 5, Some(db_file)).await
    }

    async fn build(
        database_url: String,
        max_connections: u32,
        db_file: Option<std::path::PathBuf>,
    ) -> Self {
        let mut cfg = AppConfig::new(
            database_url,
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
        );
        cfg.environment = "test".to_string();
        cfg.db_max_connections = max_connections;
        cfg.db_min_connections = 1;
        cfg.tax_rate = dec!(0.075);
        cfg.shipping_flat_rate = dec!(5.00);
        cfg.return_fee_amount = dec!(10.00);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_sender, event_rx) = events::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth = Arc::new(AuthService::new(&cfg.jwt_secret));
        let services = AppServices::new(db_arc.clone(), event_sender.clone(), &cfg);

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            auth: auth.clone(),
            services,
        };

        let router = fulfillment_api::app_router(state.clone());

        Self {
            state,
            router,
            auth,
            _event_task: event_task,
            db_file,
        }
    }

    /// Seeds a product with the given price and stock.
    pub async fn seed_product(&self, sku: &str, unit_price: Decimal, stock: i32) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Product {sku}")),
            sku: Set(sku.to_string()),
            unit_price: Set(unit_price),
            stock: Set(stock),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    /// Seeds a user row with the given role and returns an [`Actor`] for it.
    pub async fn seed_user(&self, name: &str, role: Role) -> Actor {
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            role: Set(role.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user");

        Actor::new(model.id, role)
    }

    /// An actor that exists only as a token subject, with no user row.
    pub fn actor(&self, role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), role)
    }

    pub fn token_for(&self, actor: Actor) -> String {
        self.auth.issue_token(actor, 3600).expect("issue token")
    }

    /// Sends an authenticated request through the full router stack.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        actor: Actor,
        body: Option<Value>,
    ) -> Response {
        let token = self.token_for(actor);
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response")
    }

    /// Sends a request with no Authorization header.
    pub async fn request_unauthenticated(&self, method: Method, path: &str) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(path)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response")
    }

    /// Reads a product row back, e.g. to assert on stock levels.
    pub async fn product(&self, id: Uuid) -> product::Model {
        product::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("query product")
            .expect("product exists")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(path) = self.db_file.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// A valid shipping address for order creation requests.
pub fn shipping_address() -> fulfillment_api::services::orders::ShippingAddress {
    fulfillment_api::services::orders::ShippingAddress {
        name: "Jordan Walker".to_string(),
        phone: "+15550100".to_string(),
        street: "12 Elm Street".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        postal_code: "62701".to_string(),
        country: "US".to_string(),
    }
}

/// Builds a single-product order request.
pub fn order_request(
    product_id: Uuid,
    quantity: i32,
    payment_method: fulfillment_api::entities::order::PaymentMethod,
) -> fulfillment_api::services::orders::CreateOrderRequest {
    fulfillment_api::services::orders::CreateOrderRequest {
        line_items: vec![fulfillment_api::services::orders::CreateOrderItemRequest {
            product_id,
            quantity,
            size: None,
            color: None,
        }],
        shipping_address: shipping_address(),
        payment_method,
        special_instructions: None,
        customer_id: None,
    }
}

/// Deserializes a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
