use crate::{
    auth::{hash_password, rbac, verify_password},
    db::DbPool,
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "Full name is required"))]
    pub full_name: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Full name cannot be empty"))]
    pub full_name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn model_to_response(model: user::Model) -> UserResponse {
    UserResponse {
        id: model.id,
        username: model.username,
        email: model.email,
        full_name: model.full_name,
        role: model.role,
        is_active: model.is_active,
        is_verified: model.is_verified,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// Service for managing staff accounts
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl UserService {
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

    /// Creates a staff account. Usernames and emails are unique; the account
    /// starts unverified until the holder confirms it with a one-time code.
    #[instrument(skip(self, request), fields(username = %request.username, role = %request.role))]
    pub async fn create_user(
        &self,
        request: CreateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        crate::auth::validate_password_strength(&request.password)?;

        if !rbac::is_valid_role(&request.role) {
            return Err(ServiceError::ValidationError(format!(
                "Unknown role: {}",
                request.role
            )));
        }

        let db = &*self.db_pool;

        let existing = UserEntity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(request.username.as_str()))
                    .add(user::Column::Email.eq(request.email.as_str())),
            )
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "Username or email already in use".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username),
            email: Set(request.email),
            password_hash: Set(password_hash),
            full_name: Set(request.full_name),
            role: Set(request.role),
            is_active: Set(true),
            is_verified: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(user_id = %model.id, "user account created");
        self.send_event(Event::UserCreated(model.id)).await;

        Ok(model_to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        let db = &*self.db_pool;
        let model = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        Ok(model_to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        role: Option<String>,
        include_inactive: bool,
        page: u64,
        per_page: u64,
    ) -> Result<UserListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = UserEntity::find();
        if let Some(role) = &role {
            query = query.filter(user::Column::Role.eq(role.as_str()));
        }
        if !include_inactive {
            query = query.filter(user::Column::IsActive.eq(true));
        }

        let total = query.clone().count(db).await?;
        let users = query
            .order_by_asc(user::Column::Username)
            .limit(per_page)
            .offset((page - 1) * per_page)
            .all(db)
            .await?
            .into_iter()
            .map(model_to_response)
            .collect();

        Ok(UserListResponse {
            users,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;

        if let Some(role) = &request.role {
            if !rbac::is_valid_role(role) {
                return Err(ServiceError::ValidationError(format!(
                    "Unknown role: {}",
                    role
                )));
            }
        }

        let db = &*self.db_pool;
        let model = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if let Some(email) = &request.email {
            let taken = UserEntity::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .filter(user::Column::Id.ne(user_id))
                .one(db)
                .await?;
            if taken.is_some() {
                return Err(ServiceError::Conflict("Email already in use".to_string()));
            }
        }

        let mut active: user::ActiveModel = model.into();
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(full_name) = request.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;
        Ok(model_to_response(updated))
    }

    /// Disables an account without deleting it; history stays attributable.
    #[instrument(skip(self))]
    pub async fn deactivate_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        let updated = self.set_active(user_id, false).await?;
        self.send_event(Event::UserDeactivated(user_id)).await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn reactivate_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        self.set_active(user_id, true).await
    }

    async fn set_active(&self, user_id: Uuid, active: bool) -> Result<UserResponse, ServiceError> {
        let db = &*self.db_pool;
        let model = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if model.is_active == active {
            return Ok(model_to_response(model));
        }

        let mut am: user::ActiveModel = model.into();
        am.is_active = Set(active);
        am.updated_at = Set(Some(Utc::now()));
        let updated = am.update(db).await?;

        info!(user_id = %user_id, active, "user active state changed");
        Ok(model_to_response(updated))
    }

    /// Changes the caller's own password after re-checking the current one.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        crate::auth::validate_password_strength(&request.new_password)?;

        let db = &*self.db_pool;
        let model = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let matches = verify_password(&request.current_password, &model.password_hash)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        if !matches {
            return Err(ServiceError::AuthError(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = model.into();
        active.password_hash = Set(hash_password(&request.new_password)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?);
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await?;

        info!(user_id = %user_id, "password changed");
        Ok(())
    }
}
