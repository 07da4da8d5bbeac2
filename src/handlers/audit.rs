use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::audit::{AuditLogFilter, AuditLogListResponse};
use crate::{errors::ServiceError, ApiResponse, AppState, ListQuery};

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    summary = "List audit log entries",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("actor_id" = Option<Uuid>, Query, description = "Filter by acting user"),
        ("action" = Option<String>, Query, description = "Filter by action, e.g. order.approve"),
        ("entity_type" = Option<String>, Query, description = "Filter by entity type"),
        ("from" = Option<String>, Query, description = "Start of date range (RFC 3339)"),
        ("to" = Option<String>, Query, description = "End of date range (RFC 3339)"),
    ),
    responses(
        (status = 200, description = "Audit entries retrieved", body = ApiResponse<AuditLogListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<AuditQuery>,
) -> Result<Json<ApiResponse<AuditLogListResponse>>, ServiceError> {
    let result = state
        .services
        .audit
        .list(
            AuditLogFilter {
                actor_id: filter.actor_id,
                action: filter.action,
                entity_type: filter.entity_type,
                from: filter.from,
                to: filter.to,
            },
            query.page,
            query.limit,
        )
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
