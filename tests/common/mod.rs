use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use fieldserve_api::{
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    services::employees::CreateEmployeeRequest,
    AppState,
};

/// Helper harness for spinning up an application state backed by an
/// in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        // Minimal configuration suitable for tests. A single pooled
        // connection keeps the in-memory database alive and consistent.
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .merge(fieldserve_api::handlers::health::routes())
            .nest("/api/v1", fieldserve_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

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

    /// Register an engineer through the service layer and return their id.
    pub async fn seed_engineer(&self, code: &str, name: &str, areas: &[&str]) -> Uuid {
        let created = self
            .state
            .services
            .employees
            .create_employee(CreateEmployeeRequest {
                employee_code: code.to_string(),
                name: name.to_string(),
                manager: None,
                phone: "+91-9800000000".to_string(),
                email: format!("{}@fieldserve.test", code.to_lowercase()),
                expertise_areas: areas.iter().map(|a| a.to_string()).collect(),
            })
            .await
            .expect("seed engineer for tests");
        created.id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Decode a response body into JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// A booking payload with the given service line items
/// (service name, category slug, unit price).
pub fn order_payload(items: &[(&str, &str, &str)]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|(name, category, price)| {
            serde_json::json!({
                "service_id": Uuid::new_v4().to_string(),
                "service_name": name,
                "category_id": category,
                "quantity": 1,
                "unit_price": price,
            })
        })
        .collect();

    serde_json::json!({
        "customer_name": "Asha Verma",
        "customer_phone": "+91-9800000001",
        "customer_email": "asha@example.com",
        "address": {
            "house": "14B",
            "area": "Indiranagar",
            "city": "Bengaluru",
            "state": "Karnataka",
            "pincode": "560038",
        },
        "items": items,
    })
}

/// A cancellation/postponement reason that clears the ten-word gate.
pub const LONG_REASON: &str =
    "the customer called this morning and asked us to drop the whole booking";
