//! # Notifications
//!
//! Notification records for the admin inbox. System events create them
//! fire-and-forget; admins can also send one by hand.
//!
//! Delivery over email/SMS is outside this system: `channels` records where
//! a notification is meant to go, the in-app inbox is the only consumer here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::validation::{validate_text, MAX_MESSAGE_LEN, MAX_TITLE_LEN};

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for NotificationPriority {
    fn default() -> Self {
        NotificationPriority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Sms,
}

impl NotificationChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationChannel::InApp => "in_app",
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_app" => Some(NotificationChannel::InApp),
            "email" => Some(NotificationChannel::Email),
            "sms" => Some(NotificationChannel::Sms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Unread,
    Read,
}

// =============================================================================
// Event Types
// =============================================================================

/// Notification `type` values raised by the system.
pub mod kinds {
    pub const BOOKING_CONFIRMED: &str = "booking.confirmed";
    pub const BOOKING_CANCELLED: &str = "booking.cancelled";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const PAYMENT_REFUNDED: &str = "payment.refunded";
    pub const TFC_PAID: &str = "tfc.paid";
    pub const TFC_PART_PAID: &str = "tfc.part_paid";
    pub const TFC_CANCELLED: &str = "tfc.cancelled";
    pub const TFC_CONVERTED: &str = "tfc.converted_to_credit";
    pub const WEBHOOK_FAILED: &str = "webhook.failed";
    pub const MANUAL: &str = "manual";
}

// =============================================================================
// Notification
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub business_account_id: String,
    /// Recipient; `None` means every admin of the business.
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub channels: Vec<NotificationChannel>,
    pub status: NotificationStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Builds an unread notification from validated input.
    pub fn new(input: NewNotification) -> CoreResult<Self> {
        let input = input.validated()?;
        Ok(Notification {
            id: Uuid::new_v4().to_string(),
            business_account_id: input.business_account_id,
            user_id: input.user_id,
            notification_type: input.notification_type,
            title: input.title,
            message: input.message,
            priority: input.priority,
            channels: input.channels,
            status: NotificationStatus::Unread,
            created_at: Utc::now(),
            read_at: None,
        })
    }

    /// Marks as read. Repeating keeps the first `read_at`.
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        if self.status == NotificationStatus::Unread {
            self.status = NotificationStatus::Read;
            self.read_at = Some(at);
        }
    }

    pub fn mark_unread(&mut self) {
        self.status = NotificationStatus::Unread;
        self.read_at = None;
    }
}

/// Input for a new notification.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub business_account_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
}

impl NewNotification {
    /// A system-raised in-app notification.
    pub fn system(
        business_account_id: impl Into<String>,
        notification_type: &str,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: NotificationPriority,
    ) -> Self {
        NewNotification {
            business_account_id: business_account_id.into(),
            user_id: None,
            notification_type: notification_type.to_string(),
            title: title.into(),
            message: message.into(),
            priority,
            channels: vec![NotificationChannel::InApp],
        }
    }

    /// Trims and length-checks text, defaults channels to in-app and
    /// removes duplicate channels.
    pub fn validated(mut self) -> CoreResult<Self> {
        self.notification_type = validate_text("type", &self.notification_type, 100)?;
        self.title = validate_text("title", &self.title, MAX_TITLE_LEN)?;
        self.message = validate_text("message", &self.message, MAX_MESSAGE_LEN)?;

        if self.channels.is_empty() {
            self.channels.push(NotificationChannel::InApp);
        }
        let mut seen = Vec::with_capacity(self.channels.len());
        self.channels.retain(|c| {
            if seen.contains(c) {
                false
            } else {
                seen.push(*c);
                true
            }
        });

        Ok(self)
    }
}

// =============================================================================
// Inbox Filter
// =============================================================================

/// Admin inbox filter. All fields are optional and combined with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    pub status: Option<NotificationStatus>,
    pub priority: Option<NotificationPriority>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub channel: Option<NotificationChannel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewNotification {
        NewNotification::system(
            "biz-1",
            kinds::BOOKING_CONFIRMED,
            "  Booking confirmed ",
            "Booking for Ava on 2 Nov is confirmed",
            NotificationPriority::Normal,
        )
    }

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(input()).unwrap();
        assert_eq!(n.status, NotificationStatus::Unread);
        assert_eq!(n.title, "Booking confirmed");
        assert_eq!(n.channels, vec![NotificationChannel::InApp]);
        assert!(n.read_at.is_none());
    }

    #[test]
    fn test_mark_read_and_unread() {
        let mut n = Notification::new(input()).unwrap();
        let first = Utc::now();
        n.mark_read(first);
        n.mark_read(first + chrono::Duration::minutes(5));
        assert_eq!(n.read_at, Some(first));

        n.mark_unread();
        assert_eq!(n.status, NotificationStatus::Unread);
        assert!(n.read_at.is_none());
    }

    #[test]
    fn test_validation() {
        let mut bad = input();
        bad.title = "   ".to_string();
        assert!(bad.validated().is_err());

        let mut long = input();
        long.message = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(long.validated().is_err());

        let mut dupes = input();
        dupes.channels = vec![
            NotificationChannel::Email,
            NotificationChannel::InApp,
            NotificationChannel::Email,
        ];
        assert_eq!(
            dupes.validated().unwrap().channels,
            vec![NotificationChannel::Email, NotificationChannel::InApp]
        );
    }

    #[test]
    fn test_channel_round_trip() {
        for c in [
            NotificationChannel::InApp,
            NotificationChannel::Email,
            NotificationChannel::Sms,
        ] {
            assert_eq!(NotificationChannel::parse(c.as_str()), Some(c));
        }
        assert_eq!(NotificationChannel::parse("fax"), None);
    }

    #[test]
    fn test_manual_send_json() {
        let json = r#"{
            "businessAccountId": "biz-1",
            "type": "manual",
            "title": "Half term",
            "message": "Closed on Friday",
            "priority": "high",
            "channels": ["in_app", "email"]
        }"#;
        let input: NewNotification = serde_json::from_str(json).unwrap();
        assert_eq!(input.priority, NotificationPriority::High);
        assert_eq!(input.channels.len(), 2);
    }
}
