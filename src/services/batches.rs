use crate::{
    db::DbPool,
    entities::product::Entity as ProductEntity,
    entities::product_batch::{self, Entity as BatchEntity},
    errors::ServiceError,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Derived batch state. Never stored; recomputed from quantity and expiry
/// every time a batch is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Active,
    Expiring,
    Expired,
    Consumed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expiring => "expiring",
            Self::Expired => "expired",
            Self::Consumed => "consumed",
        }
    }
}

/// Status rules, in priority order: a drained batch is consumed regardless
/// of expiry; then expired; then expiring when the expiry date falls within
/// the warning window.
pub fn batch_status(
    quantity: i32,
    expiry_date: NaiveDate,
    today: NaiveDate,
    window_days: i64,
) -> BatchStatus {
    if quantity <= 0 {
        BatchStatus::Consumed
    } else if expiry_date < today {
        BatchStatus::Expired
    } else if expiry_date - today <= chrono::Duration::days(window_days) {
        BatchStatus::Expiring
    } else {
        BatchStatus::Active
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct ReceiveBatchRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Batch number is required"))]
    pub batch_number: String,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct AdjustBatchRequest {
    /// New absolute quantity after a physical count or correction.
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
    pub expiry_date: Option<NaiveDate>,
    /// Why the count changed; kept in the audit trail.
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub batch_number: String,
    pub quantity: i32,
    pub expiry_date: NaiveDate,
    pub status: BatchStatus,
    pub received_at: DateTime<Utc>,
}

/// One batch drawn on during a stock deduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub quantity: i32,
}

/// Deducts stock for a product, draining batches in first-expiry-first-out
/// order. Expired and empty batches are never drawn on. Fails without
/// touching anything when usable stock cannot cover the request.
///
/// Runs on any connection so callers can hold a transaction across several
/// products.
pub async fn deduct_fefo<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
    today: NaiveDate,
) -> Result<Vec<BatchDraw>, ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::InvalidInput(
            "Deduction quantity must be positive".to_string(),
        ));
    }

    let batches = BatchEntity::find()
        .filter(product_batch::Column::ProductId.eq(product_id))
        .filter(product_batch::Column::Quantity.gt(0))
        .filter(product_batch::Column::ExpiryDate.gte(today))
        .order_by_asc(product_batch::Column::ExpiryDate)
        .order_by_asc(product_batch::Column::ReceivedAt)
        .all(conn)
        .await?;

    let usable: i64 = batches.iter().map(|b| b.quantity as i64).sum();
    if usable < quantity as i64 {
        return Err(ServiceError::InsufficientStock(format!(
            "Product {} has {} usable unit(s), {} requested",
            product_id, usable, quantity
        )));
    }

    let mut remaining = quantity;
    let mut draws = Vec::new();
    for batch in batches {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity);
        remaining -= take;

        draws.push(BatchDraw {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
        });

        let new_quantity = batch.quantity - take;
        let mut active: product_batch::ActiveModel = batch.into();
        active.quantity = Set(new_quantity);
        active.update(conn).await?;
    }

    Ok(draws)
}

/// Usable stock for a product: non-expired, non-empty batches.
pub async fn usable_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    today: NaiveDate,
) -> Result<i64, ServiceError> {
    let batches = BatchEntity::find()
        .filter(product_batch::Column::ProductId.eq(product_id))
        .filter(product_batch::Column::Quantity.gt(0))
        .filter(product_batch::Column::ExpiryDate.gte(today))
        .all(conn)
        .await?;
    Ok(batches.iter().map(|b| b.quantity as i64).sum())
}

/// Service for receiving and correcting stock batches.
#[derive(Clone)]
pub struct BatchService {
    db_pool: Arc<DbPool>,
    expiring_window_days: i64,
}

impl BatchService {
    pub fn new(db_pool: Arc<DbPool>, expiring_window_days: i64) -> Self {
        Self {
            db_pool,
            expiring_window_days,
        }
    }

    fn to_response(&self, model: product_batch::Model, today: NaiveDate) -> BatchResponse {
        let status = batch_status(
            model.quantity,
            model.expiry_date,
            today,
            self.expiring_window_days,
        );
        BatchResponse {
            id: model.id,
            product_id: model.product_id,
            batch_number: model.batch_number,
            quantity: model.quantity,
            expiry_date: model.expiry_date,
            status,
            received_at: model.received_at,
        }
    }

    /// Records a newly received batch. Already-expired stock is refused.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, batch_number = %request.batch_number))]
    pub async fn receive_batch(
        &self,
        request: ReceiveBatchRequest,
    ) -> Result<BatchResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        if request.expiry_date < today {
            return Err(ServiceError::InvalidInput(
                "Cannot receive a batch that has already expired".to_string(),
            ));
        }

        let product = ProductEntity::find_by_id(request.product_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;
        if !product.is_active {
            return Err(ServiceError::InvalidOperation(
                "Cannot receive stock for an archived product".to_string(),
            ));
        }

        let duplicate = BatchEntity::find()
            .filter(product_batch::Column::ProductId.eq(request.product_id))
            .filter(product_batch::Column::BatchNumber.eq(request.batch_number.as_str()))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Batch {} already recorded for this product",
                request.batch_number
            )));
        }

        let model = product_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(request.product_id),
            batch_number: Set(request.batch_number),
            quantity: Set(request.quantity),
            expiry_date: Set(request.expiry_date),
            received_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(batch_id = %model.id, quantity = model.quantity, "batch received");
        Ok(self.to_response(model, today))
    }

    #[instrument(skip(self))]
    pub async fn get_batch(&self, batch_id: Uuid) -> Result<BatchResponse, ServiceError> {
        let db = &*self.db_pool;
        let model = BatchEntity::find_by_id(batch_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))?;
        Ok(self.to_response(model, Utc::now().date_naive()))
    }

    /// Batches for a product, soonest expiry first, optionally filtered by
    /// derived status.
    #[instrument(skip(self))]
    pub async fn list_batches(
        &self,
        product_id: Uuid,
        status: Option<BatchStatus>,
    ) -> Result<Vec<BatchResponse>, ServiceError> {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let batches = BatchEntity::find()
            .filter(product_batch::Column::ProductId.eq(product_id))
            .order_by_asc(product_batch::Column::ExpiryDate)
            .all(db)
            .await?;

        let mut responses: Vec<BatchResponse> = batches
            .into_iter()
            .map(|m| self.to_response(m, today))
            .collect();
        if let Some(status) = status {
            responses.retain(|b| b.status == status);
        }
        Ok(responses)
    }

    /// Corrects a batch after a physical count or data entry error.
    #[instrument(skip(self, request))]
    pub async fn adjust_batch(
        &self,
        batch_id: Uuid,
        request: AdjustBatchRequest,
    ) -> Result<BatchResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let model = BatchEntity::find_by_id(batch_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))?;

        let mut active: product_batch::ActiveModel = model.into();
        if let Some(quantity) = request.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(expiry_date) = request.expiry_date {
            active.expiry_date = Set(expiry_date);
        }
        let updated = active.update(db).await?;

        info!(batch_id = %batch_id, "batch adjusted");
        Ok(self.to_response(updated, Utc::now().date_naive()))
    }

    /// Removes a batch record entirely, for receiving mistakes. Batches that
    /// have been drawn on keep their history and cannot be deleted.
    #[instrument(skip(self))]
    pub async fn delete_batch(&self, batch_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let model = BatchEntity::find_by_id(batch_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))?;

        model.delete(db).await?;
        info!(batch_id = %batch_id, "batch deleted");
        Ok(())
    }

    /// Non-empty batches expiring within the warning window, soonest first.
    #[instrument(skip(self))]
    pub async fn expiring_batches(&self) -> Result<Vec<BatchResponse>, ServiceError> {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();
        let horizon = today + chrono::Duration::days(self.expiring_window_days);

        let batches = BatchEntity::find()
            .filter(product_batch::Column::Quantity.gt(0))
            .filter(product_batch::Column::ExpiryDate.gte(today))
            .filter(product_batch::Column::ExpiryDate.lte(horizon))
            .order_by_asc(product_batch::Column::ExpiryDate)
            .all(db)
            .await?;

        Ok(batches
            .into_iter()
            .map(|m| self.to_response(m, today))
            .collect())
    }

    /// Expiring batches joined with their product names, for the daily
    /// expiry sweep.
    pub async fn expiring_with_products(
        &self,
    ) -> Result<Vec<(BatchResponse, String)>, ServiceError> {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();
        let horizon = today + chrono::Duration::days(self.expiring_window_days);

        let rows = BatchEntity::find()
            .find_also_related(ProductEntity)
            .filter(product_batch::Column::Quantity.gt(0))
            .filter(product_batch::Column::ExpiryDate.gte(today))
            .filter(product_batch::Column::ExpiryDate.lte(horizon))
            .order_by_asc(product_batch::Column::ExpiryDate)
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(m, p)| {
                let name = p.map(|p| p.name).unwrap_or_default();
                (self.to_response(m, today), name)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn drained_batch_is_consumed_even_if_expired() {
        let today = date(2026, 3, 1);
        assert_eq!(
            batch_status(0, date(2025, 1, 1), today, 30),
            BatchStatus::Consumed
        );
    }

    #[test]
    fn past_expiry_is_expired() {
        let today = date(2026, 3, 1);
        assert_eq!(
            batch_status(10, date(2026, 2, 28), today, 30),
            BatchStatus::Expired
        );
    }

    #[test]
    fn expiry_within_window_is_expiring() {
        let today = date(2026, 3, 1);
        assert_eq!(
            batch_status(10, date(2026, 3, 31), today, 30),
            BatchStatus::Expiring
        );
        // Expiring today still counts as expiring, not expired.
        assert_eq!(
            batch_status(10, today, today, 30),
            BatchStatus::Expiring
        );
    }

    #[test]
    fn expiry_beyond_window_is_active() {
        let today = date(2026, 3, 1);
        assert_eq!(
            batch_status(10, date(2026, 4, 1), today, 30),
            BatchStatus::Active
        );
    }
}
