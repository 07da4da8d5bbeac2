use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::Json,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::services::notifications::{NotificationListResponse, NotificationResponse};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState, ListQuery};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    summary = "List own notifications",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("unread_only" = Option<bool>, Query, description = "Only unread notifications"),
    ),
    responses(
        (status = 200, description = "Notifications retrieved", body = ApiResponse<NotificationListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<NotificationQuery>,
) -> Result<Json<ApiResponse<NotificationListResponse>>, ServiceError> {
    let result = state
        .services
        .notifications
        .list_for_user(auth_user.user_id, filter.unread_only, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    summary = "Mark a notification read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = ApiResponse<NotificationResponse>),
        (status = 404, description = "Notification not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<NotificationResponse>>, ServiceError> {
    let notification = state
        .services
        .notifications
        .mark_read(auth_user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(notification)))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    summary = "Mark all notifications read",
    responses(
        (status = 200, description = "Notifications marked read"),
    ),
    security(("Bearer" = []))
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    let updated = state
        .services
        .notifications
        .mark_all_read(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "updated": updated }))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    summary = "Delete a notification",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 404, description = "Notification not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .services
        .notifications
        .delete(auth_user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    summary = "Count unread notifications",
    responses(
        (status = 200, description = "Unread count"),
    ),
    security(("Bearer" = []))
)]
pub async fn unread_count(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    let count = state
        .services
        .notifications
        .unread_count(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "unread": count }))))
}

/// Live notification stream for the authenticated user. Each event carries
/// the same JSON body the REST listing returns.
#[utoipa::path(
    get,
    path = "/api/v1/notifications/stream",
    summary = "Subscribe to live notifications over SSE",
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
    ),
    security(("Bearer" = []))
)]
pub async fn stream_notifications(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.hub.subscribe(auth_user.user_id);

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(payload) => {
                    let event = SseEvent::default().event("notification").data(payload);
                    return Some((Ok(event), rx));
                }
                // Skip over anything lost to a slow consumer and keep going.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
