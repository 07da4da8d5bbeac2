use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifications::NotificationHub;
use crate::services;

pub mod analytics;
pub mod audit;
pub mod batches;
pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod patients;
pub mod pos;
pub mod users;

/// Shared service instances handed to every handler through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<services::users::UserService>,
    pub catalog: Arc<services::catalog::CatalogService>,
    pub batches: Arc<services::batches::BatchService>,
    pub orders: Arc<services::orders::OrderService>,
    pub pos: Arc<services::pos::PosService>,
    pub patients: Arc<services::patients::PatientService>,
    pub notifications: Arc<services::notifications::NotificationService>,
    pub analytics: Arc<services::analytics::AnalyticsService>,
    pub audit: Arc<services::audit::AuditService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        hub: Arc<NotificationHub>,
        expiring_window_days: i64,
    ) -> Self {
        Self {
            users: Arc::new(services::users::UserService::new(
                db.clone(),
                Some(event_sender.clone()),
            )),
            catalog: Arc::new(services::catalog::CatalogService::new(db.clone())),
            batches: Arc::new(services::batches::BatchService::new(
                db.clone(),
                expiring_window_days,
            )),
            orders: Arc::new(services::orders::OrderService::new(
                db.clone(),
                Some(event_sender.clone()),
            )),
            pos: Arc::new(services::pos::PosService::new(
                db.clone(),
                Some(event_sender),
            )),
            patients: Arc::new(services::patients::PatientService::new(db.clone())),
            notifications: Arc::new(services::notifications::NotificationService::new(
                db.clone(),
                hub,
            )),
            analytics: Arc::new(services::analytics::AnalyticsService::new(
                db.clone(),
                expiring_window_days,
            )),
            audit: Arc::new(services::audit::AuditService::new(db)),
        }
    }
}
