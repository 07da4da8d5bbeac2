use crate::{
    db::DbPool,
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::order_request::{self, Entity as OrderRequestEntity},
    entities::patient::Entity as PatientEntity,
    entities::product::{self, Entity as ProductEntity},
    entities::user::Entity as UserEntity,
    errors::ServiceError,
    events::{Event, EventSender},
    services::batches,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Order request lifecycle states.
pub mod status {
    pub const PENDING: &str = "pending";
    pub const APPROVED: &str = "approved";
    pub const REJECTED: &str = "rejected";
    pub const COMPLETED: &str = "completed";
    pub const CANCELLED: &str = "cancelled";
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateOrderRequest {
    pub patient_id: Option<Uuid>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "An order needs at least one item"))]
    #[validate]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct RejectOrderRequest {
    #[validate(length(min = 1, max = 500, message = "A rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub quantity_dispensed: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub status: String,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub requester_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

/// Service for the nurse/medtech order request workflow.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                error!(error = %e, "failed to queue event");
            }
        }
    }

    /// Creates a pending order request with its items.
    #[instrument(skip(self, request), fields(requester_id = %requester_id))]
    pub async fn create_order(
        &self,
        requester_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;

        let requester = UserEntity::find_by_id(requester_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", requester_id)))?;

        if let Some(patient_id) = request.patient_id {
            PatientEntity::find_by_id(patient_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Patient {} not found", patient_id))
                })?;
        }

        // Reject duplicate products up front; they would make dispensing
        // deduct twice from the same line.
        let mut seen = std::collections::HashSet::new();
        for item in &request.items {
            if !seen.insert(item.product_id) {
                return Err(ServiceError::InvalidInput(format!(
                    "Product {} appears more than once",
                    item.product_id
                )));
            }
        }

        let product_ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(db)
            .await?;
        let products_by_id: HashMap<Uuid, &product::Model> =
            products.iter().map(|p| (p.id, p)).collect();
        for item in &request.items {
            let product = products_by_id.get(&item.product_id).ok_or_else(|| {
                ServiceError::InvalidInput(format!("Product {} does not exist", item.product_id))
            })?;
            if !product.is_active {
                return Err(ServiceError::InvalidOperation(format!(
                    "Product '{}' is archived",
                    product.name
                )));
            }
        }

        let txn = db.begin().await?;
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        order_request::ActiveModel {
            id: Set(order_id),
            requester_id: Set(requester_id),
            patient_id: Set(request.patient_id),
            status: Set(status::PENDING.to_string()),
            notes: Set(request.notes),
            rejection_reason: Set(None),
            reviewed_by: Set(None),
            dispensed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        for item in &request.items {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                quantity_dispensed: Set(0),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(order_id = %order_id, items = request.items.len(), "order request created");
        self.send_event(Event::OrderRequestCreated {
            order_id,
            requester_id,
            requester_name: requester.full_name,
        })
        .await;

        self.get_order(order_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderRequestEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        self.build_response(order).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = OrderRequestEntity::find();
        if let Some(status) = &filter.status {
            query = query.filter(order_request::Column::Status.eq(status.as_str()));
        }
        if let Some(requester_id) = filter.requester_id {
            query = query.filter(order_request::Column::RequesterId.eq(requester_id));
        }
        if let Some(patient_id) = filter.patient_id {
            query = query.filter(order_request::Column::PatientId.eq(patient_id));
        }

        let total = query.clone().count(db).await?;
        let models = query
            .order_by_desc(order_request::Column::CreatedAt)
            .limit(per_page)
            .offset((page - 1) * per_page)
            .all(db)
            .await?;

        let mut orders = Vec::with_capacity(models.len());
        for model in models {
            orders.push(self.build_response(model).await?);
        }

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Approves a pending order.
    #[instrument(skip(self))]
    pub async fn approve_order(
        &self,
        order_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = self.find_order(order_id).await?;
        require_status(&order, status::PENDING)?;

        let requester_id = order.requester_id;
        let mut active: order_request::ActiveModel = order.into();
        active.status = Set(status::APPROVED.to_string());
        active.reviewed_by = Set(Some(reviewer_id));
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await?;

        info!(order_id = %order_id, reviewer_id = %reviewer_id, "order approved");
        self.send_event(Event::OrderRequestApproved {
            order_id,
            requester_id,
            reviewer_id,
        })
        .await;

        self.get_order(order_id).await
    }

    /// Rejects a pending order with a reason.
    #[instrument(skip(self, request))]
    pub async fn reject_order(
        &self,
        order_id: Uuid,
        reviewer_id: Uuid,
        request: RejectOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let order = self.find_order(order_id).await?;
        require_status(&order, status::PENDING)?;

        let requester_id = order.requester_id;
        let mut active: order_request::ActiveModel = order.into();
        active.status = Set(status::REJECTED.to_string());
        active.reviewed_by = Set(Some(reviewer_id));
        active.rejection_reason = Set(Some(request.reason.clone()));
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await?;

        info!(order_id = %order_id, reviewer_id = %reviewer_id, "order rejected");
        self.send_event(Event::OrderRequestRejected {
            order_id,
            requester_id,
            reviewer_id,
            reason: Some(request.reason),
        })
        .await;

        self.get_order(order_id).await
    }

    /// Dispenses an approved order, deducting stock first-expiry-first-out.
    /// The whole order succeeds or fails as one transaction; a single item
    /// short on usable stock rolls everything back.
    #[instrument(skip(self))]
    pub async fn dispense_order(
        &self,
        order_id: Uuid,
        pharmacist_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = self.find_order(order_id).await?;
        require_status(&order, status::APPROVED)?;

        let requester_id = order.requester_id;
        let today = Utc::now().date_naive();

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        let txn = db.begin().await?;

        for item in &items {
            let draws = batches::deduct_fefo(&txn, item.product_id, item.quantity, today).await?;
            let dispensed: i32 = draws.iter().map(|d| d.quantity).sum();

            let mut active: order_item::ActiveModel = item.clone().into();
            active.quantity_dispensed = Set(dispensed);
            active.update(&txn).await?;
        }

        let now = Utc::now();
        let mut active: order_request::ActiveModel = order.into();
        active.status = Set(status::COMPLETED.to_string());
        active.dispensed_at = Set(Some(now));
        active.updated_at = Set(Some(now));
        active.update(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, pharmacist_id = %pharmacist_id, "order dispensed");
        self.send_event(Event::OrderRequestDispensed {
            order_id,
            requester_id,
            pharmacist_id,
        })
        .await;

        self.check_low_stock(items.iter().map(|i| i.product_id)).await;

        self.get_order(order_id).await
    }

    /// Cancels a pending order. Only the requester (or an admin) may cancel.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        caller_id: Uuid,
        caller_is_admin: bool,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = self.find_order(order_id).await?;
        require_status(&order, status::PENDING)?;

        if order.requester_id != caller_id && !caller_is_admin {
            return Err(ServiceError::Forbidden(
                "Only the requester can cancel this order".to_string(),
            ));
        }

        let requester = UserEntity::find_by_id(order.requester_id).one(db).await?;
        let requester_name = requester
            .map(|u| u.full_name)
            .unwrap_or_else(|| "unknown".to_string());
        let requester_id = order.requester_id;

        let mut active: order_request::ActiveModel = order.into();
        active.status = Set(status::CANCELLED.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await?;

        info!(order_id = %order_id, "order cancelled");
        self.send_event(Event::OrderRequestCancelled {
            order_id,
            requester_id,
            requester_name,
        })
        .await;

        self.get_order(order_id).await
    }

    async fn find_order(&self, order_id: Uuid) -> Result<order_request::Model, ServiceError> {
        let db = &*self.db_pool;
        OrderRequestEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn build_response(
        &self,
        order: order_request::Model,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(db)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?;
        let names: HashMap<Uuid, String> =
            products.into_iter().map(|p| (p.id, p.name)).collect();

        let items = items
            .into_iter()
            .map(|i| OrderItemResponse {
                id: i.id,
                product_id: i.product_id,
                product_name: names
                    .get(&i.product_id)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                quantity: i.quantity,
                quantity_dispensed: i.quantity_dispensed,
            })
            .collect();

        Ok(OrderResponse {
            id: order.id,
            requester_id: order.requester_id,
            patient_id: order.patient_id,
            status: order.status,
            notes: order.notes,
            rejection_reason: order.rejection_reason,
            reviewed_by: order.reviewed_by,
            dispensed_at: order.dispensed_at,
            items,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }

    /// Emits low stock events for any of the products now at or below their
    /// reorder level. Best effort; never fails the calling operation.
    async fn check_low_stock(&self, product_ids: impl Iterator<Item = Uuid>) {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        for product_id in product_ids {
            let product = match ProductEntity::find_by_id(product_id).one(db).await {
                Ok(Some(product)) => product,
                _ => continue,
            };
            let usable = match batches::usable_stock(db, product_id, today).await {
                Ok(usable) => usable,
                Err(_) => continue,
            };
            if usable <= product.reorder_level as i64 {
                self.send_event(Event::LowStock {
                    product_id,
                    product_name: product.name,
                    on_hand: usable as i32,
                    reorder_level: product.reorder_level,
                })
                .await;
            }
        }
    }
}

fn require_status(order: &order_request::Model, expected: &str) -> Result<(), ServiceError> {
    if order.status != expected {
        return Err(ServiceError::InvalidOperation(format!(
            "Order is {}, expected {}",
            order.status, expected
        )));
    }
    Ok(())
}
