use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use botica_api::{
    auth::{self, AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::user,
    events::{self, EventSender},
    handlers::AppServices,
    notifications::NotificationHub,
    AppState,
};

/// Harness that spins up the full application state against a throwaway
/// SQLite database, with one seeded staff member per role.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    db_file: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_file = format!("botica_test_{}.db", Uuid::new_v4().simple());
        let _ = std::fs::remove_file(&db_file);

        let cfg = AppConfig {
            database_url: format!("sqlite://{db_file}?mode=rwc"),
            jwt_secret: "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            jwt_expiration: 3600,
            refresh_token_expiration: 86_400,
            host: "127.0.0.1".to_string(),
            port: 18_080,
            ws_port: 18_081,
            environment: "test".to_string(),
            log_level: "warn".to_string(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            cors_allow_any_origin: true,
            otp_ttl_secs: 600,
            expiring_window_days: 30,
        };

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let hub = Arc::new(NotificationHub::new());
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            db_arc.clone(),
            hub.clone(),
        ));

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            "botica-api".to_string(),
            "botica-clients".to_string(),
            Duration::from_secs(cfg.jwt_expiration as u64),
            Duration::from_secs(cfg.refresh_token_expiration as u64),
            Duration::from_secs(cfg.otp_ttl_secs),
            true,
        );
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            hub.clone(),
            cfg.expiring_window_days,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            hub,
            auth: auth_service.clone(),
            services,
        };

        let auth_for_layer = auth_service.clone();
        let api_router = botica_api::api_v1_routes().layer(middleware::from_fn_with_state(
            auth_for_layer,
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: Request<Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ));

        let router = Router::new()
            .nest("/api/v1", api_router)
            .nest(
                "/auth",
                botica_api::auth::auth_routes().with_state(auth_service),
            )
            .with_state(state.clone());

        Self {
            router,
            state,
            db_file,
            _event_task: event_task,
        }
    }

    /// Insert a staff member directly and mint a token pair for them.
    pub async fn seed_user(&self, username: &str, role: &str) -> (user::Model, String) {
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            password_hash: Set(auth::hash_password("Sup3rSecret").expect("hash password")),
            full_name: Set(format!("Test {username}")),
            role: Set(role.to_string()),
            is_active: Set(true),
            is_verified: Set(true),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user");

        let tokens = self
            .state
            .auth
            .generate_token(&model)
            .await
            .expect("mint token for seeded user");
        (model, tokens.access_token)
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
            builder = builder.header("authorization", format!("Bearer {}", tok));
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
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Deserialize a response body into JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .expect("read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse response body as json")
}
