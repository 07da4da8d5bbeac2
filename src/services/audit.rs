use crate::{
    db::DbPool,
    entities::audit_log::{self, Entity as AuditLogEntity},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditLogListResponse {
    pub entries: Vec<audit_log::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Append-only record of who did what. Write failures are logged but never
/// fail the operation that triggered them.
#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Records an action. `action` is dotted, e.g. `order.approve`.
    #[instrument(skip(self, detail))]
    pub async fn record(
        &self,
        actor_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        detail: Option<serde_json::Value>,
    ) {
        let db = &*self.db_pool;
        let result = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor_id: Set(actor_id),
            action: Set(action.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(entity_id),
            detail: Set(detail),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await;

        if let Err(e) = result {
            warn!(actor_id = %actor_id, action, error = %e, "failed to write audit entry");
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: AuditLogFilter,
        page: u64,
        per_page: u64,
    ) -> Result<AuditLogListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = AuditLogEntity::find();
        if let Some(actor_id) = filter.actor_id {
            query = query.filter(audit_log::Column::ActorId.eq(actor_id));
        }
        if let Some(action) = &filter.action {
            query = query.filter(audit_log::Column::Action.eq(action.as_str()));
        }
        if let Some(entity_type) = &filter.entity_type {
            query = query.filter(audit_log::Column::EntityType.eq(entity_type.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(audit_log::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(audit_log::Column::CreatedAt.lte(to));
        }

        let total = query.clone().count(db).await?;
        let entries = query
            .order_by_desc(audit_log::Column::CreatedAt)
            .limit(per_page)
            .offset((page - 1) * per_page)
            .all(db)
            .await?;

        Ok(AuditLogListResponse {
            entries,
            total,
            page,
            per_page,
        })
    }
}
