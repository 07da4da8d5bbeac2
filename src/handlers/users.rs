use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::users::{
    ChangePasswordRequest, CreateUserRequest, UpdateUserRequest, UserListResponse, UserResponse,
};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState, ListQuery};

#[derive(Debug, Deserialize)]
pub struct UserListFilter {
    pub role: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    summary = "List staff accounts",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("role" = Option<String>, Query, description = "Filter by role"),
        ("include_inactive" = Option<bool>, Query, description = "Include deactivated accounts"),
    ),
    responses(
        (status = 200, description = "Users retrieved", body = ApiResponse<UserListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<UserListFilter>,
) -> Result<Json<ApiResponse<UserListResponse>>, ServiceError> {
    let result = state
        .services
        .users
        .list_users(filter.role, filter.include_inactive, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    summary = "Create a staff account",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username or email taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ServiceError> {
    let user = state.services.users.create_user(request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "user.create",
            "user",
            Some(user.id.to_string()),
            None,
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    summary = "Get the authenticated account",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.get_user(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/me/password",
    summary = "Change own password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password incorrect", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .services
        .users
        .change_password(auth_user.user_id, request)
        .await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "user.change_password",
            "user",
            Some(auth_user.user_id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    summary = "Get a staff account",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.get_user(id).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    summary = "Update a staff account",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.update_user(id, request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "user.update",
            "user",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/deactivate",
    summary = "Deactivate a staff account",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deactivated", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    if id == auth_user.user_id {
        return Err(ServiceError::InvalidOperation(
            "Cannot deactivate your own account".to_string(),
        ));
    }
    let user = state.services.users.deactivate_user(id).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "user.deactivate",
            "user",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/reactivate",
    summary = "Reactivate a staff account",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User reactivated", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn reactivate_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state.services.users.reactivate_user(id).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "user.reactivate",
            "user",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(user)))
}
