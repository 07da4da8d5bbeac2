use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::services::batches::{
    AdjustBatchRequest, BatchResponse, BatchStatus, ReceiveBatchRequest,
};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    pub status: Option<BatchStatus>,
}

#[utoipa::path(
    post,
    path = "/api/v1/batches",
    summary = "Receive a stock batch",
    request_body = ReceiveBatchRequest,
    responses(
        (status = 201, description = "Batch received", body = ApiResponse<BatchResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate batch number", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn receive_batch(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ReceiveBatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BatchResponse>>), ServiceError> {
    let batch = state.services.batches.receive_batch(request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "batch.receive",
            "batch",
            Some(batch.id.to_string()),
            Some(json!({ "quantity": batch.quantity, "expiry_date": batch.expiry_date })),
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(batch))))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/batches",
    summary = "List batches for a product",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("status" = Option<String>, Query, description = "Filter by derived status"),
    ),
    responses(
        (status = 200, description = "Batches retrieved", body = ApiResponse<Vec<BatchResponse>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_product_batches(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<BatchListQuery>,
) -> Result<Json<ApiResponse<Vec<BatchResponse>>>, ServiceError> {
    let batches = state.services.batches.list_batches(id, query.status).await?;
    Ok(Json(ApiResponse::success(batches)))
}

#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}",
    summary = "Get a batch",
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch found", body = ApiResponse<BatchResponse>),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BatchResponse>>, ServiceError> {
    let batch = state.services.batches.get_batch(id).await?;
    Ok(Json(ApiResponse::success(batch)))
}

#[utoipa::path(
    put,
    path = "/api/v1/batches/{id}",
    summary = "Correct a batch after a count",
    params(("id" = Uuid, Path, description = "Batch ID")),
    request_body = AdjustBatchRequest,
    responses(
        (status = 200, description = "Batch adjusted", body = ApiResponse<BatchResponse>),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn adjust_batch(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AdjustBatchRequest>,
) -> Result<Json<ApiResponse<BatchResponse>>, ServiceError> {
    let reason = request.reason.clone();
    let batch = state.services.batches.adjust_batch(id, request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "batch.adjust",
            "batch",
            Some(id.to_string()),
            Some(json!({
                "quantity": batch.quantity,
                "expiry_date": batch.expiry_date,
                "reason": reason,
            })),
        )
        .await;
    Ok(Json(ApiResponse::success(batch)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/batches/{id}",
    summary = "Delete a batch entered in error",
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch deleted"),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_batch(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.batches.delete_batch(id).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "batch.delete",
            "batch",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    get,
    path = "/api/v1/batches/expiring",
    summary = "List batches inside the expiry warning window",
    responses(
        (status = 200, description = "Expiring batches", body = ApiResponse<Vec<BatchResponse>>),
    ),
    security(("Bearer" = []))
)]
pub async fn expiring_batches(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<BatchResponse>>>, ServiceError> {
    let batches = state.services.batches.expiring_batches().await?;
    Ok(Json(ApiResponse::success(batches)))
}
