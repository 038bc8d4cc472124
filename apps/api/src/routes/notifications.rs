//! Admin notification inbox.
//!
//! Any change to a tenant's inbox invalidates its cached unread count.

use std::sync::Arc;

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use bookon_core::notification::{
    kinds, NewNotification, Notification, NotificationChannel, NotificationFilter,
    NotificationPriority, NotificationStatus,
};
use bookon_core::PageRequest;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    pub status: Option<NotificationStatus>,
    pub priority: Option<NotificationPriority>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub channel: Option<NotificationChannel>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    /// Required for super admins; ignored for tenant admins.
    pub business_account_id: Option<String>,
    pub user_id: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread: i64,
}

/// `GET /api/v1/admin/notifications`
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListNotificationsQuery>,
) -> ApiResult<Envelope<Vec<Notification>>> {
    user.require_admin()?;

    let filter = NotificationFilter {
        status: query.status,
        priority: query.priority,
        notification_type: query.notification_type,
        channel: query.channel,
    };
    let page = PageRequest::new(query.page, query.per_page);
    let notifications = state
        .db
        .notifications()
        .list(user.scope()?, &filter, page)
        .await?;

    Ok(Envelope::page(notifications))
}

/// `POST /api/v1/admin/notifications`
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateNotificationRequest>,
) -> ApiResult<Envelope<Notification>> {
    user.require_admin()?;

    let business_account_id = match user.scope()? {
        Some(business) => business.to_string(),
        None => req
            .business_account_id
            .ok_or_else(|| ApiError::validation("businessAccountId is required"))?,
    };

    let input = NewNotification {
        business_account_id,
        user_id: req.user_id,
        notification_type: kinds::MANUAL.to_string(),
        title: req.title,
        message: req.message,
        priority: req.priority,
        channels: req.channels,
    };

    let notification = state.db.notifications().create(input).await?;
    invalidate(&state, &notification.business_account_id).await;

    Ok(Envelope::created(notification))
}

/// `GET /api/v1/admin/notifications/unread-count`
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Envelope<UnreadCount>> {
    user.require_admin()?;
    let scope = user.scope()?;

    if let Some(cache) = &state.cache {
        if let Some(unread) = cache.get(scope).await {
            return Ok(Envelope::ok(UnreadCount { unread }));
        }
    }

    let unread = state.db.notifications().unread_count(scope).await?;
    if let Some(cache) = &state.cache {
        cache.put(scope, unread).await;
    }

    Ok(Envelope::ok(UnreadCount { unread }))
}

/// `GET /api/v1/admin/notifications/{id}`
pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Notification>> {
    user.require_admin()?;
    let notification = state.db.notifications().get_by_id(&id, user.scope()?).await?;
    Ok(Envelope::ok(notification))
}

/// `POST /api/v1/admin/notifications/{id}/read`
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Notification>> {
    user.require_admin()?;
    let notification = state.db.notifications().mark_read(&id, user.scope()?).await?;
    invalidate(&state, &notification.business_account_id).await;
    Ok(Envelope::ok(notification))
}

/// `POST /api/v1/admin/notifications/{id}/unread`
pub async fn mark_unread(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Notification>> {
    user.require_admin()?;
    let notification = state
        .db
        .notifications()
        .mark_unread(&id, user.scope()?)
        .await?;
    invalidate(&state, &notification.business_account_id).await;
    Ok(Envelope::ok(notification))
}

/// `DELETE /api/v1/admin/notifications/{id}`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<serde_json::Value>> {
    user.require_admin()?;
    let scope = user.scope()?;

    // Look up the tenant first so a super admin delete invalidates the right key
    let notification = state.db.notifications().get_by_id(&id, scope).await?;
    state.db.notifications().delete(&id, scope).await?;
    invalidate(&state, &notification.business_account_id).await;

    Ok(Envelope::ok(serde_json::json!({ "deleted": id })))
}

async fn invalidate(state: &AppState, business_account_id: &str) {
    if let Some(cache) = &state.cache {
        cache.invalidate(business_account_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateNotificationRequest = serde_json::from_value(serde_json::json!({
            "title": "Pool closed",
            "message": "The pool is closed on Friday"
        }))
        .unwrap();
        assert_eq!(req.priority, NotificationPriority::default());
        assert!(req.channels.is_empty());
        assert!(req.business_account_id.is_none());
    }

    #[test]
    fn test_list_query_reads_type_param() {
        let query: ListNotificationsQuery = serde_json::from_value(serde_json::json!({
            "type": "tfc.paid",
            "status": "unread"
        }))
        .unwrap();
        assert_eq!(query.notification_type.as_deref(), Some("tfc.paid"));
        assert_eq!(query.status, Some(NotificationStatus::Unread));
    }
}
