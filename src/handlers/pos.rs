use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::services::pos::{
    CheckoutRequest, PaymentRequest, PaymentResponse, TransactionFilter, TransactionListResponse,
    TransactionResponse,
};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState, ListQuery};

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub cashier_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct OrderPaymentBody {
    pub amount: Decimal,
    pub method: String,
    pub tendered: Decimal,
}

#[utoipa::path(
    post,
    path = "/api/v1/pos/checkout",
    summary = "Ring up a walk-in sale",
    description = "Deducts stock earliest expiry first, computes VAT-inclusive \
        totals with senior/PWD discounting, and records the payment.",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Sale recorded", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn checkout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResponse>>), ServiceError> {
    let transaction = state
        .services
        .pos
        .checkout(auth_user.user_id, request)
        .await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "pos.checkout",
            "walk_in_transaction",
            Some(transaction.id.to_string()),
            Some(json!({
                "receipt_number": transaction.receipt_number,
                "total_amount": transaction.total_amount,
                "discount": transaction.discount,
            })),
        )
        .await;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(transaction)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/pos/transactions",
    summary = "List walk-in transactions",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("cashier_id" = Option<Uuid>, Query, description = "Filter by cashier"),
        ("from" = Option<String>, Query, description = "Start of date range (RFC 3339)"),
        ("to" = Option<String>, Query, description = "End of date range (RFC 3339)"),
    ),
    responses(
        (status = 200, description = "Transactions retrieved", body = ApiResponse<TransactionListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<TransactionQuery>,
) -> Result<Json<ApiResponse<TransactionListResponse>>, ServiceError> {
    let result = state
        .services
        .pos
        .list_transactions(
            TransactionFilter {
                cashier_id: filter.cashier_id,
                from: filter.from,
                to: filter.to,
            },
            query.page,
            query.limit,
        )
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    get,
    path = "/api/v1/pos/transactions/{id}",
    summary = "Get a walk-in transaction",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction found", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ServiceError> {
    let transaction = state.services.pos.get_transaction(id).await?;
    Ok(Json(ApiResponse::success(transaction)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payment",
    summary = "Record payment for a completed order",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = OrderPaymentBody,
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<PaymentResponse>),
        (status = 409, description = "Order not completed or already paid", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn record_order_payment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<OrderPaymentBody>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResponse>>), ServiceError> {
    let payment = state
        .services
        .pos
        .record_order_payment(
            id,
            auth_user.user_id,
            body.amount,
            PaymentRequest {
                method: body.method,
                tendered: body.tendered,
            },
        )
        .await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "payment.record",
            "payment",
            Some(payment.id.to_string()),
            Some(json!({ "order_id": id, "amount": payment.amount })),
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(payment))))
}
