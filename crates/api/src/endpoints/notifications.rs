//! Notification endpoints.

use admissions_common::AppResult;
use admissions_db::entities::notification::{
    Model as NotificationModel, NotificationChannel, NotificationStatus,
};
use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use serde::{Deserialize, Serialize};

use super::{rfc3339, rfc3339_opt};
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// List notifications query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    /// Maximum results (default: 50, max: 100)
    pub limit: Option<u64>,
    /// Only unread notifications
    #[serde(default)]
    pub unread_only: bool,
}

/// Notification response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_to: Option<String>,
    pub status: NotificationStatus,
    pub is_read: bool,
    pub sent_at: Option<String>,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl From<NotificationModel> for NotificationResponse {
    fn from(n: NotificationModel) -> Self {
        Self {
            id: n.id,
            channel: n.channel,
            title: n.title,
            message: n.message,
            related_to: n.related_to,
            status: n.status,
            is_read: n.is_read,
            sent_at: rfc3339_opt(n.sent_at),
            read_at: rfc3339_opt(n.read_at),
            created_at: rfc3339(n.created_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllResponse {
    pub updated: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_notifications))
        .route("/{id}/read", put(mark_as_read))
        .route("/read-all", put(mark_all_as_read))
}

/// Get notifications for the authenticated user, newest first.
async fn get_notifications(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<ApiResponse<Vec<NotificationResponse>>> {
    let notifications = if query.unread_only {
        state.notifications.unread_for_user(&principal.user_id).await?
    } else {
        state
            .notifications
            .list_for_user(&principal.user_id, query.limit)
            .await?
    };

    Ok(ApiResponse::list(
        notifications.into_iter().map(Into::into).collect(),
    ))
}

async fn mark_as_read(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<NotificationResponse>> {
    let notification = state
        .notifications
        .mark_as_read(&principal.user_id, &id)
        .await?;
    Ok(ApiResponse::ok(notification.into()))
}

async fn mark_all_as_read(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<MarkAllResponse>> {
    let updated = state
        .notifications
        .mark_all_as_read(&principal.user_id)
        .await?;
    Ok(ApiResponse::ok(MarkAllResponse { updated }).with_message("All notifications marked as read"))
}
