//! Botica API Library
//!
//! This crate provides the core functionality for the Botica pharmacy API
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub hub: Arc<notifications::NotificationHub>,
    pub auth: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Versioned API surface. Every router group below carries its own
/// permission gate; the auth middleware itself is layered per group by
/// [`AuthRouterExt`].
pub fn api_v1_routes() -> Router<AppState> {
    // User management
    let users_read = Router::new()
        .route("/users", get(handlers::users::list_users))
        .route("/users/:id", get(handlers::users::get_user))
        .with_permission(perm::USERS_READ);

    let users_manage = Router::new()
        .route("/users", post(handlers::users::create_user))
        .route("/users/:id", put(handlers::users::update_user))
        .route(
            "/users/:id/deactivate",
            post(handlers::users::deactivate_user),
        )
        .route(
            "/users/:id/reactivate",
            post(handlers::users::reactivate_user),
        )
        .with_permission(perm::USERS_MANAGE);

    // Self-service endpoints only need a valid token.
    let users_self = Router::new()
        .route("/users/me", get(handlers::users::get_me))
        .route("/users/me/password", post(handlers::users::change_password))
        .with_auth();

    // Catalog and batches
    let catalog_read = Router::new()
        .route("/categories", get(handlers::catalog::list_categories))
        .route("/products", get(handlers::catalog::list_products))
        .route("/products/:id", get(handlers::catalog::get_product))
        .route(
            "/products/:id/batches",
            get(handlers::batches::list_product_batches),
        )
        .route("/batches/expiring", get(handlers::batches::expiring_batches))
        .route("/batches/:id", get(handlers::batches::get_batch))
        .with_permission(perm::PRODUCTS_READ);

    let catalog_manage = Router::new()
        .route("/categories", post(handlers::catalog::create_category))
        .route("/categories/:id", delete(handlers::catalog::delete_category))
        .route("/products", post(handlers::catalog::create_product))
        .route("/products/:id", put(handlers::catalog::update_product))
        .route(
            "/products/:id/archive",
            post(handlers::catalog::archive_product),
        )
        .with_permission(perm::PRODUCTS_MANAGE);

    let batches_manage = Router::new()
        .route("/batches", post(handlers::batches::receive_batch))
        .route("/batches/:id", put(handlers::batches::adjust_batch))
        .route("/batches/:id", delete(handlers::batches::delete_batch))
        .with_permission(perm::BATCHES_MANAGE);

    // Order request workflow
    let orders_read = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .with_permission(perm::ORDERS_READ);

    let orders_create = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .with_permission(perm::ORDERS_CREATE);

    let orders_review = Router::new()
        .route("/orders/:id/approve", post(handlers::orders::approve_order))
        .route("/orders/:id/reject", post(handlers::orders::reject_order))
        .with_permission(perm::ORDERS_REVIEW);

    let orders_dispense = Router::new()
        .route(
            "/orders/:id/dispense",
            post(handlers::orders::dispense_order),
        )
        .with_permission(perm::ORDERS_DISPENSE);

    let orders_cancel = Router::new()
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .with_permission(perm::ORDERS_CANCEL);

    // Point of sale
    let pos_create = Router::new()
        .route("/pos/checkout", post(handlers::pos::checkout))
        .with_permission(perm::POS_CREATE);

    let pos_read = Router::new()
        .route("/pos/transactions", get(handlers::pos::list_transactions))
        .route(
            "/pos/transactions/:id",
            get(handlers::pos::get_transaction),
        )
        .with_permission(perm::POS_READ);

    let payments = Router::new()
        .route(
            "/orders/:id/payment",
            post(handlers::pos::record_order_payment),
        )
        .with_permission(perm::PAYMENTS_MANAGE);

    // Patients
    let patients_read = Router::new()
        .route("/patients", get(handlers::patients::list_patients))
        .route("/patients/:id", get(handlers::patients::get_patient))
        .with_permission(perm::PATIENTS_READ);

    let patients_manage = Router::new()
        .route("/patients", post(handlers::patients::create_patient))
        .route("/patients/:id", put(handlers::patients::update_patient))
        .route("/patients/:id", delete(handlers::patients::delete_patient))
        .with_permission(perm::PATIENTS_MANAGE);

    // Notifications (literal paths registered before the capture routes)
    let notifications_routes = Router::new()
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/notifications/stream",
            get(handlers::notifications::stream_notifications),
        )
        .route(
            "/notifications/unread-count",
            get(handlers::notifications::unread_count),
        )
        .route(
            "/notifications/read-all",
            post(handlers::notifications::mark_all_read),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::notifications::mark_read),
        )
        .route(
            "/notifications/:id",
            delete(handlers::notifications::delete_notification),
        )
        .with_permission(perm::NOTIFICATIONS_READ);

    // Dashboard analytics
    let analytics = Router::new()
        .route("/analytics/dashboard", get(handlers::analytics::dashboard))
        .route("/analytics/sales", get(handlers::analytics::sales_metrics))
        .route(
            "/analytics/sales/trend",
            get(handlers::analytics::sales_trend),
        )
        .route(
            "/analytics/top-products",
            get(handlers::analytics::top_products),
        )
        .route(
            "/analytics/expiry-alerts",
            get(handlers::analytics::expiry_alerts),
        )
        .route("/analytics/low-stock", get(handlers::analytics::low_stock))
        .route(
            "/analytics/orders",
            get(handlers::analytics::order_status_counts),
        )
        .with_permission(perm::ANALYTICS_READ);

    // Audit trail
    let audit = Router::new()
        .route("/audit-logs", get(handlers::audit::list_audit_logs))
        .with_permission(perm::AUDIT_READ);

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Users API
        .merge(users_self)
        .merge(users_read)
        .merge(users_manage)
        // Catalog API
        .merge(catalog_read)
        .merge(catalog_manage)
        .merge(batches_manage)
        // Order request API
        .merge(orders_read)
        .merge(orders_create)
        .merge(orders_review)
        .merge(orders_dispense)
        .merge(orders_cancel)
        // Point-of-sale API
        .merge(pos_create)
        .merge(pos_read)
        .merge(payments)
        // Patients API
        .merge(patients_read)
        .merge(patients_manage)
        // Notifications API
        .merge(notifications_routes)
        // Analytics API
        .merge(analytics)
        // Audit API
        .merge(audit)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "botica-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "database": db_status,
        "connected_stream_users": state.hub.connected_users(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 20);
        assert!(query.search.is_none());
    }

    #[test]
    fn api_response_success_shape() {
        let response = ApiResponse::success(json!({"ok": true}));
        assert!(response.success);
        assert!(response.data.is_some());
        assert!(response.errors.is_none());
    }

    #[test]
    fn api_response_validation_errors() {
        let response: ApiResponse<Value> =
            ApiResponse::validation_errors(vec!["quantity must be positive".into()]);
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("Validation failed"));
        assert_eq!(response.errors.unwrap().len(), 1);
    }
}
