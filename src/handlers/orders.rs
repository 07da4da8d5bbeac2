use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::services::orders::{
    CreateOrderRequest, OrderFilter, OrderListResponse, OrderResponse, RejectOrderRequest,
};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState, ListQuery};

#[derive(Debug, Deserialize)]
pub struct OrderListFilter {
    pub status: Option<String>,
    pub requester_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    /// Restrict to the caller's own requests.
    #[serde(default)]
    pub mine: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List order requests",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("requester_id" = Option<Uuid>, Query, description = "Filter by requester"),
        ("patient_id" = Option<Uuid>, Query, description = "Filter by patient"),
        ("mine" = Option<bool>, Query, description = "Only the caller's own requests"),
    ),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<OrderListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<OrderListFilter>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let requester_id = if filter.mine {
        Some(auth_user.user_id)
    } else {
        filter.requester_id
    };
    let result = state
        .services
        .orders
        .list_orders(
            OrderFilter {
                status: filter.status,
                requester_id,
                patient_id: filter.patient_id,
            },
            query.page,
            query.limit,
        )
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create an order request",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state
        .services
        .orders
        .create_order(auth_user.user_id, request)
        .await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "order.create",
            "order",
            Some(order.id.to_string()),
            Some(json!({ "items": order.items.len() })),
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get an order request",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/approve",
    summary = "Approve a pending order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order approved", body = ApiResponse<OrderResponse>),
        (status = 409, description = "Order is not pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn approve_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .approve_order(id, auth_user.user_id)
        .await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "order.approve",
            "order",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/reject",
    summary = "Reject a pending order with a reason",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = RejectOrderRequest,
    responses(
        (status = 200, description = "Order rejected", body = ApiResponse<OrderResponse>),
        (status = 409, description = "Order is not pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn reject_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectOrderRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let reason = request.reason.clone();
    let order = state
        .services
        .orders
        .reject_order(id, auth_user.user_id, request)
        .await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "order.reject",
            "order",
            Some(id.to_string()),
            Some(json!({ "reason": reason })),
        )
        .await;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/dispense",
    summary = "Dispense an approved order",
    description = "Deducts stock for every item, earliest expiry first. Fails \
        without changes when any item is short on usable stock.",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order dispensed", body = ApiResponse<OrderResponse>),
        (status = 409, description = "Order is not approved", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn dispense_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .dispense_order(id, auth_user.user_id)
        .await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "order.dispense",
            "order",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel a pending order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderResponse>),
        (status = 403, description = "Not the requester", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is not pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .cancel_order(id, auth_user.user_id, auth_user.is_admin())
        .await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "order.cancel",
            "order",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(order)))
}
