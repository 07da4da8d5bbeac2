use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::services::analytics::{
    DailySales, DashboardResponse, ExpiryAlerts, LowStockProduct, OrderStatusCounts,
    SalesMetrics, TopProduct,
};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    #[serde(default = "default_trend_days")]
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct TopProductsQuery {
    #[serde(default = "default_top_days")]
    pub days: u32,
    #[serde(default = "default_top_limit")]
    pub limit: usize,
}

fn default_trend_days() -> u32 {
    7
}
fn default_top_days() -> u32 {
    30
}
fn default_top_limit() -> usize {
    5
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/dashboard",
    summary = "Full dashboard rollup",
    responses(
        (status = 200, description = "Dashboard data", body = ApiResponse<DashboardResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardResponse>>, ServiceError> {
    let dashboard = state.services.analytics.dashboard().await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/sales",
    summary = "Sales metrics for today, this week, and this month",
    responses(
        (status = 200, description = "Sales metrics", body = ApiResponse<SalesMetrics>),
    ),
    security(("Bearer" = []))
)]
pub async fn sales_metrics(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SalesMetrics>>, ServiceError> {
    let metrics = state.services.analytics.sales_metrics().await?;
    Ok(Json(ApiResponse::success(metrics)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/sales/trend",
    summary = "Daily sales for the last N days",
    params(("days" = Option<u32>, Query, description = "Days to cover (default: 7, max: 90)")),
    responses(
        (status = 200, description = "Daily sales", body = ApiResponse<Vec<DailySales>>),
    ),
    security(("Bearer" = []))
)]
pub async fn sales_trend(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<ApiResponse<Vec<DailySales>>>, ServiceError> {
    let trend = state.services.analytics.sales_trend(query.days).await?;
    Ok(Json(ApiResponse::success(trend)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/top-products",
    summary = "Best moving products over a window",
    params(
        ("days" = Option<u32>, Query, description = "Window in days (default: 30)"),
        ("limit" = Option<usize>, Query, description = "Number of products (default: 5)"),
    ),
    responses(
        (status = 200, description = "Top products", body = ApiResponse<Vec<TopProduct>>),
    ),
    security(("Bearer" = []))
)]
pub async fn top_products(
    State(state): State<AppState>,
    Query(query): Query<TopProductsQuery>,
) -> Result<Json<ApiResponse<Vec<TopProduct>>>, ServiceError> {
    let top = state
        .services
        .analytics
        .top_products(query.days, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(top)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/expiry-alerts",
    summary = "Counts of expiring and expired batches",
    responses(
        (status = 200, description = "Expiry alerts", body = ApiResponse<ExpiryAlerts>),
    ),
    security(("Bearer" = []))
)]
pub async fn expiry_alerts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ExpiryAlerts>>, ServiceError> {
    let alerts = state.services.analytics.expiry_alerts().await?;
    Ok(Json(ApiResponse::success(alerts)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/low-stock",
    summary = "Products at or below their reorder level",
    responses(
        (status = 200, description = "Low stock products", body = ApiResponse<Vec<LowStockProduct>>),
    ),
    security(("Bearer" = []))
)]
pub async fn low_stock(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<LowStockProduct>>>, ServiceError> {
    let products = state.services.analytics.low_stock_products().await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/orders",
    summary = "Order request counts by status",
    responses(
        (status = 200, description = "Order status counts", body = ApiResponse<OrderStatusCounts>),
    ),
    security(("Bearer" = []))
)]
pub async fn order_status_counts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OrderStatusCounts>>, ServiceError> {
    let counts = state.services.analytics.order_status_counts().await?;
    Ok(Json(ApiResponse::success(counts)))
}
