//! Handlers for the `/notifications` resource.
//!
//! All endpoints require authentication via [`AuthUser`] and only ever see
//! the caller's own notifications.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use salon_core::notify::Notification;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /notifications`.
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// If `true`, return only unread notifications. Defaults to `false`.
    pub unread_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub marked_read: usize,
}

/// GET /api/v1/notifications
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<NotificationQuery>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let unread_only = params.unread_only.unwrap_or(false);
    let notifications = state
        .notifications
        .list_for_user(&auth.user_id, unread_only)
        .await;
    Ok(Json(DataResponse {
        data: notifications,
    }))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<UnreadCount>>> {
    let count = state.notifications.unread_count(&auth.user_id).await;
    Ok(Json(DataResponse {
        data: UnreadCount { count },
    }))
}

/// POST /api/v1/notifications/{id}/read
///
/// 404 if the notification does not belong to the caller.
pub async fn mark_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let notification = state.notifications.mark_read(&id, &auth.user_id).await?;
    Ok(Json(DataResponse { data: notification }))
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<MarkedRead>>> {
    let marked_read = state.notifications.mark_all_read(&auth.user_id).await;
    Ok(Json(DataResponse {
        data: MarkedRead { marked_read },
    }))
}
