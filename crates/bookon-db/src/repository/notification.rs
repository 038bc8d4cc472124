//! # Notification Repository
//!
//! Admin inbox storage. Channels are a `TEXT[]` column, so rows go through
//! [`NotificationRow`] before becoming core [`Notification`]s.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::page_of;
use bookon_core::notification::{
    NewNotification, Notification, NotificationChannel, NotificationFilter, NotificationPriority,
    NotificationStatus,
};
use bookon_core::{Page, PageRequest};

const SELECT_NOTIFICATION: &str = r#"
    SELECT id, business_account_id, user_id, type AS notification_type, title,
           message, priority, channels, status, created_at, read_at
    FROM notifications
"#;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: String,
    business_account_id: String,
    user_id: Option<String>,
    notification_type: String,
    title: String,
    message: String,
    priority: NotificationPriority,
    channels: Vec<String>,
    status: NotificationStatus,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let channels = row
            .channels
            .iter()
            .filter_map(|c| {
                let parsed = NotificationChannel::parse(c);
                if parsed.is_none() {
                    warn!(notification_id = %row.id, channel = %c, "Unknown channel dropped");
                }
                parsed
            })
            .collect();

        Notification {
            id: row.id,
            business_account_id: row.business_account_id,
            user_id: row.user_id,
            notification_type: row.notification_type,
            title: row.title,
            message: row.message,
            priority: row.priority,
            channels,
            status: row.status,
            created_at: row.created_at,
            read_at: row.read_at,
        }
    }
}

fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    business_account_id: Option<&str>,
    filter: &NotificationFilter,
) {
    qb.push(" WHERE TRUE");
    if let Some(business) = business_account_id {
        qb.push(" AND business_account_id = ").push_bind(business.to_string());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }
    if let Some(kind) = &filter.notification_type {
        qb.push(" AND type = ").push_bind(kind.clone());
    }
    if let Some(channel) = filter.channel {
        qb.push(" AND ")
            .push_bind(channel.as_str())
            .push(" = ANY(channels)");
    }
}

/// Repository for notifications.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        NotificationRepository { pool }
    }

    pub async fn create(&self, input: NewNotification) -> DbResult<Notification> {
        let notification = Notification::new(input)?;
        let channels: Vec<&str> = notification.channels.iter().map(|c| c.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, business_account_id, user_id, type, title, message,
                priority, channels, status, created_at, read_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.business_account_id)
        .bind(&notification.user_id)
        .bind(&notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.priority)
        .bind(&channels)
        .bind(notification.status)
        .bind(notification.created_at)
        .bind(notification.read_at)
        .execute(&self.pool)
        .await?;

        debug!(
            notification_id = %notification.id,
            kind = %notification.notification_type,
            "Notification created"
        );
        Ok(notification)
    }

    pub async fn get_by_id(
        &self,
        id: &str,
        business_account_id: Option<&str>,
    ) -> DbResult<Notification> {
        let sql = format!("{} WHERE id = $1", SELECT_NOTIFICATION);
        let row: NotificationRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Notification", id))?;

        if business_account_id.is_some_and(|b| b != row.business_account_id) {
            return Err(DbError::not_found("Notification", id));
        }
        Ok(row.into())
    }

    /// Inbox page, newest first.
    pub async fn list(
        &self,
        business_account_id: Option<&str>,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> DbResult<Page<Notification>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        push_filters(&mut count, business_account_id, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_NOTIFICATION);
        push_filters(&mut select, business_account_id, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select
            .build_query_as::<NotificationRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(page_of(
            rows.into_iter().map(Notification::from).collect(),
            total,
            page,
        ))
    }

    pub async fn unread_count(&self, business_account_id: Option<&str>) -> DbResult<i64> {
        let filter = NotificationFilter {
            status: Some(NotificationStatus::Unread),
            ..Default::default()
        };
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        push_filters(&mut count, business_account_id, &filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    /// Marks read. Already-read notifications keep their first `read_at`.
    pub async fn mark_read(
        &self,
        id: &str,
        business_account_id: Option<&str>,
    ) -> DbResult<Notification> {
        let mut notification = self.get_by_id(id, business_account_id).await?;
        notification.mark_read(Utc::now());
        self.save_status(&notification).await?;
        Ok(notification)
    }

    pub async fn mark_unread(
        &self,
        id: &str,
        business_account_id: Option<&str>,
    ) -> DbResult<Notification> {
        let mut notification = self.get_by_id(id, business_account_id).await?;
        notification.mark_unread();
        self.save_status(&notification).await?;
        Ok(notification)
    }

    pub async fn delete(&self, id: &str, business_account_id: Option<&str>) -> DbResult<()> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE id = $1 AND ($2::TEXT IS NULL OR business_account_id = $2)",
        )
        .bind(id)
        .bind(business_account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }
        debug!(notification_id = %id, "Notification deleted");
        Ok(())
    }

    async fn save_status(&self, notification: &Notification) -> DbResult<()> {
        sqlx::query("UPDATE notifications SET status = $2, read_at = $3 WHERE id = $1")
            .bind(&notification.id)
            .bind(notification.status)
            .bind(notification.read_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(channels: &[&str]) -> NotificationRow {
        NotificationRow {
            id: "n-1".to_string(),
            business_account_id: "biz-1".to_string(),
            user_id: None,
            notification_type: "tfc.paid".to_string(),
            title: "Paid".to_string(),
            message: "TFC-0000002A paid".to_string(),
            priority: NotificationPriority::Normal,
            channels: channels.iter().map(|c| c.to_string()).collect(),
            status: NotificationStatus::Unread,
            created_at: Utc::now(),
            read_at: None,
        }
    }

    #[test]
    fn test_row_channels_are_parsed() {
        let notification = Notification::from(row(&["in_app", "email"]));
        assert_eq!(
            notification.channels,
            vec![NotificationChannel::InApp, NotificationChannel::Email]
        );
    }

    #[test]
    fn test_unknown_channels_are_dropped() {
        let notification = Notification::from(row(&["in_app", "pager"]));
        assert_eq!(notification.channels, vec![NotificationChannel::InApp]);
    }

    #[test]
    fn test_channel_filter_sql() {
        let filter = NotificationFilter {
            channel: Some(NotificationChannel::Sms),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        push_filters(&mut qb, Some("biz-1"), &filter);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM notifications WHERE TRUE AND business_account_id = $1 AND $2 = ANY(channels)"
        );
    }
}
