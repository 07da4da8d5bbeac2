use crate::{
    db::DbPool,
    entities::notification::{self, Entity as NotificationEntity},
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
    notifications::NotificationHub,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Order,
    Stock,
    Expiry,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Stock => "stock",
            Self::Expiry => "expiry",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub total: u64,
    pub unread: u64,
    pub page: u64,
    pub per_page: u64,
}

fn model_to_response(model: notification::Model) -> NotificationResponse {
    NotificationResponse {
        id: model.id,
        title: model.title,
        body: model.body,
        kind: model.kind,
        read: model.read,
        created_at: model.created_at,
    }
}

/// Persists notifications and pushes them to live subscribers.
#[derive(Clone)]
pub struct NotificationService {
    db_pool: Arc<DbPool>,
    hub: Arc<NotificationHub>,
}

impl NotificationService {
    pub fn new(db_pool: Arc<DbPool>, hub: Arc<NotificationHub>) -> Self {
        Self { db_pool, hub }
    }

    /// Stores a notification for one user and pushes it to any live stream.
    #[instrument(skip(self, title, body))]
    pub async fn notify_user(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) -> Result<notification::Model, ServiceError> {
        let db = &*self.db_pool;

        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            title: Set(title.to_string()),
            body: Set(body.to_string()),
            kind: Set(kind.as_str().to_string()),
            read: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        let payload = serde_json::to_string(&model_to_response(model.clone()))
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        let delivered = self.hub.publish(user_id, &payload);
        debug!(user_id = %user_id, delivered, "notification stored");

        Ok(model)
    }

    /// Fans a notification out to every active user holding the role.
    /// Returns the number of users notified.
    #[instrument(skip(self, title, body))]
    pub async fn notify_role(
        &self,
        role: &str,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) -> Result<usize, ServiceError> {
        let db = &*self.db_pool;

        let recipients = UserEntity::find()
            .filter(user::Column::Role.eq(role))
            .filter(user::Column::IsActive.eq(true))
            .all(db)
            .await?;

        for recipient in &recipients {
            self.notify_user(recipient.id, kind, title, body).await?;
        }

        Ok(recipients.len())
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: u64,
        per_page: u64,
    ) -> Result<NotificationListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = NotificationEntity::find()
            .filter(notification::Column::UserId.eq(user_id));
        if unread_only {
            query = query.filter(notification::Column::Read.eq(false));
        }

        let total = query.clone().count(db).await?;
        let unread = NotificationEntity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .count(db)
            .await?;

        let notifications = query
            .order_by_desc(notification::Column::CreatedAt)
            .limit(per_page)
            .offset((page - 1) * per_page)
            .all(db)
            .await?
            .into_iter()
            .map(model_to_response)
            .collect();

        Ok(NotificationListResponse {
            notifications,
            total,
            unread,
            page,
            per_page,
        })
    }

    /// Marks one notification read. The notification must belong to the user.
    #[instrument(skip(self))]
    pub async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<NotificationResponse, ServiceError> {
        let db = &*self.db_pool;

        let model = NotificationEntity::find_by_id(notification_id)
            .filter(notification::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Notification {} not found", notification_id))
            })?;

        if model.read {
            return Ok(model_to_response(model));
        }

        let mut active: notification::ActiveModel = model.into();
        active.read = Set(true);
        let updated = active.update(db).await?;
        Ok(model_to_response(updated))
    }

    /// Marks all of the user's notifications read. Returns how many changed.
    #[instrument(skip(self))]
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        use sea_orm::sea_query::Expr;

        let db = &*self.db_pool;
        let result = NotificationEntity::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .exec(db)
            .await?;

        Ok(result.rows_affected)
    }

    /// Deletes one of the user's notifications.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<(), ServiceError> {
        use sea_orm::ModelTrait;

        let db = &*self.db_pool;
        let model = NotificationEntity::find_by_id(notification_id)
            .filter(notification::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Notification {} not found", notification_id))
            })?;

        model.delete(db).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let count = NotificationEntity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .count(db)
            .await?;
        Ok(count)
    }
}
