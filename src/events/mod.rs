use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::rbac;
use crate::notifications::NotificationHub;
use crate::services::notifications::{NotificationKind, NotificationService};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order request lifecycle
    OrderRequestCreated {
        order_id: Uuid,
        requester_id: Uuid,
        requester_name: String,
    },
    OrderRequestApproved {
        order_id: Uuid,
        requester_id: Uuid,
        reviewer_id: Uuid,
    },
    OrderRequestRejected {
        order_id: Uuid,
        requester_id: Uuid,
        reviewer_id: Uuid,
        reason: Option<String>,
    },
    OrderRequestDispensed {
        order_id: Uuid,
        requester_id: Uuid,
        pharmacist_id: Uuid,
    },
    OrderRequestCancelled {
        order_id: Uuid,
        requester_id: Uuid,
        requester_name: String,
    },

    // Inventory events
    LowStock {
        product_id: Uuid,
        product_name: String,
        on_hand: i32,
        reorder_level: i32,
    },
    BatchExpiring {
        batch_id: Uuid,
        product_id: Uuid,
        product_name: String,
        batch_number: String,
        expiry_date: NaiveDate,
    },

    // Point of sale events
    WalkInCompleted {
        transaction_id: Uuid,
        receipt_number: String,
        total_amount: Decimal,
    },

    // User events
    UserCreated(Uuid),
    UserDeactivated(Uuid),

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

// Consumes events off the channel, persisting notifications and pushing
// them to connected clients. Failures are logged and never stop the loop.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    db: Arc<DatabaseConnection>,
    hub: Arc<NotificationHub>,
) {
    info!("Starting event processing loop");
    let notifications = NotificationService::new(db, hub);

    while let Some(event) = rx.recv().await {
        if let Err(e) = dispatch_event(&notifications, &event).await {
            error!(?event, error = %e, "Failed to handle event");
        }
    }

    info!("Event processing loop stopped");
}

async fn dispatch_event(
    notifications: &NotificationService,
    event: &Event,
) -> Result<(), crate::errors::ServiceError> {
    match event {
        Event::OrderRequestCreated {
            order_id,
            requester_name,
            ..
        } => {
            notifications
                .notify_role(
                    rbac::ROLE_PHARMACIST,
                    NotificationKind::Order,
                    "New order request",
                    &format!(
                        "{} submitted order request {} for review",
                        requester_name, order_id
                    ),
                )
                .await?;
        }
        Event::OrderRequestApproved {
            order_id,
            requester_id,
            ..
        } => {
            notifications
                .notify_user(
                    *requester_id,
                    NotificationKind::Order,
                    "Order request approved",
                    &format!("Order request {} was approved and is being prepared", order_id),
                )
                .await?;
        }
        Event::OrderRequestRejected {
            order_id,
            requester_id,
            reason,
            ..
        } => {
            let body = match reason {
                Some(reason) => format!("Order request {} was rejected: {}", order_id, reason),
                None => format!("Order request {} was rejected", order_id),
            };
            notifications
                .notify_user(*requester_id, NotificationKind::Order, "Order request rejected", &body)
                .await?;
        }
        Event::OrderRequestDispensed {
            order_id,
            requester_id,
            ..
        } => {
            notifications
                .notify_user(
                    *requester_id,
                    NotificationKind::Order,
                    "Order dispensed",
                    &format!("Order request {} has been dispensed and is ready for pickup", order_id),
                )
                .await?;
        }
        Event::OrderRequestCancelled {
            order_id,
            requester_name,
            ..
        } => {
            notifications
                .notify_role(
                    rbac::ROLE_PHARMACIST,
                    NotificationKind::Order,
                    "Order request cancelled",
                    &format!("{} cancelled order request {}", requester_name, order_id),
                )
                .await?;
        }
        Event::LowStock {
            product_name,
            on_hand,
            reorder_level,
            ..
        } => {
            notifications
                .notify_role(
                    rbac::ROLE_PHARMACIST,
                    NotificationKind::Stock,
                    "Low stock",
                    &format!(
                        "{} is down to {} units (reorder level {})",
                        product_name, on_hand, reorder_level
                    ),
                )
                .await?;
        }
        Event::BatchExpiring {
            product_name,
            batch_number,
            expiry_date,
            ..
        } => {
            notifications
                .notify_role(
                    rbac::ROLE_PHARMACIST,
                    NotificationKind::Expiry,
                    "Batch expiring",
                    &format!(
                        "{} batch {} expires on {}",
                        product_name, batch_number, expiry_date
                    ),
                )
                .await?;
        }
        Event::WalkInCompleted {
            receipt_number,
            total_amount,
            ..
        } => {
            // Receipts need no push notification; the sale is in the audit
            // trail and the dashboard.
            info!(receipt = %receipt_number, total = %total_amount, "walk-in sale completed");
        }
        Event::UserCreated(user_id) => {
            info!(user_id = %user_id, "user account created");
        }
        Event::UserDeactivated(user_id) => {
            info!(user_id = %user_id, "user account deactivated");
        }
        Event::Generic { message, .. } => {
            info!(message = %message, "generic event");
        }
    }

    Ok(())
}
