use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use shopster_api::{
    auth::issue_token,
    config::AppConfig,
    db,
    entities::{category, product, user, CategoryModel, ProductModel},
    events::{self, EventSender, PostCommitHook},
    services::notifications::{EmailNotifier, LogMailer},
    AppState,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Harness spinning up the full router against an in-memory SQLite
/// database, with the event processor running.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "test".to_string(),
        );
        // In-memory SQLite: one connection, or each pooled connection
        // would see its own empty database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::create_schema(&pool)
            .await
            .expect("failed to create schema");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let hooks: Vec<Arc<dyn PostCommitHook>> = vec![Arc::new(EmailNotifier::new(
            db_arc.clone(),
            Arc::new(LogMailer),
            "http://localhost:3000/reset-password".to_string(),
        ))];
        let event_task = tokio::spawn(events::process_events(event_rx, hooks));

        let state = Arc::new(AppState::new(db_arc, cfg, event_sender));
        let router = shopster_api::app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Insert a user row and mint a matching bearer token.
    pub async fn seed_user(&self, email: &str, staff: bool) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let now = Utc::now();
        user::ActiveModel {
            id: Set(id),
            email: Set(email.to_lowercase()),
            password_hash: Set(Some("argon2-not-used-in-tests".to_string())),
            full_name: Set("Test User".to_string()),
            is_staff: Set(staff),
            is_active: Set(true),
            requires_account_activation: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user");

        let token = issue_token(TEST_JWT_SECRET, id, email, staff, 3600).expect("issue token");
        (id, token)
    }

    pub async fn seed_category(&self, name: &str) -> CategoryModel {
        let now = Utc::now();
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(name.to_lowercase().replace(' ', "-")),
            description: Set(String::new()),
            meta_title: Set(None),
            meta_description: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed category")
    }

    pub async fn seed_product(
        &self,
        category_id: Uuid,
        name: &str,
        sku: &str,
        price: Decimal,
    ) -> ProductModel {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(category_id),
            name: Set(name.to_string()),
            slug: Set(name.to_lowercase().replace(' ', "-")),
            sku: Set(sku.to_string()),
            short_description: Set(String::new()),
            description: Set(String::new()),
            meta_title: Set(None),
            meta_description: Set(None),
            meta_keywords: Set(None),
            price: Set(price),
            currency: Set("RUB".to_string()),
            stock: Set(100),
            is_active: Set(true),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {tok}"));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
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

/// Collect a response body into JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body is not valid json")
}

/// Parse a JSON string field as a decimal amount.
pub fn decimal_field(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("amount serialized as string")
        .parse()
        .expect("amount parses as decimal")
}
