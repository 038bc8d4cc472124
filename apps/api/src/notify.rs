//! Fire-and-forget system notifications.
//!
//! Handlers call [`dispatch`] after their transaction commits. The insert
//! runs on a spawned task: a failure is logged and never reaches the
//! request that raised the event.

use std::sync::Arc;

use tracing::{debug, warn};

use bookon_core::booking::Booking;
use bookon_core::notification::{kinds, NewNotification, NotificationPriority};
use bookon_core::tfc::TfcOutcome;
use bookon_db::TfcApplied;

use crate::state::AppState;

/// Stores `notification` in the background and invalidates the tenant's
/// cached unread count.
pub fn dispatch(state: &Arc<AppState>, notification: NewNotification) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        let business = notification.business_account_id.clone();
        let kind = notification.notification_type.clone();

        match state.db.notifications().create(notification).await {
            Ok(created) => {
                debug!(notification_id = %created.id, kind = %kind, "Notification dispatched");
                if let Some(cache) = &state.cache {
                    cache.invalidate(&business).await;
                }
            }
            Err(e) => {
                warn!(error = %e, kind = %kind, business_account_id = %business, "Notification dispatch failed");
            }
        }
    });
}

pub fn booking_confirmed(booking: &Booking) -> NewNotification {
    NewNotification::system(
        &booking.business_account_id,
        kinds::BOOKING_CONFIRMED,
        "Booking confirmed",
        format!("Booking {} for {} is confirmed", booking.id, booking.date),
        NotificationPriority::Low,
    )
}

pub fn booking_cancelled(booking: &Booking) -> NewNotification {
    let reason = booking
        .cancellation_reason
        .as_deref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default();
    NewNotification::system(
        &booking.business_account_id,
        kinds::BOOKING_CANCELLED,
        "Booking cancelled",
        format!("Booking {} for {} was cancelled{}", booking.id, booking.date, reason),
        NotificationPriority::Normal,
    )
}

pub fn payment_failed(booking: &Booking) -> NewNotification {
    NewNotification::system(
        &booking.business_account_id,
        kinds::PAYMENT_FAILED,
        "Card payment failed",
        format!("Payment for booking {} failed; the booking is still pending", booking.id),
        NotificationPriority::High,
    )
}

pub fn payment_refunded(booking: &Booking) -> NewNotification {
    NewNotification::system(
        &booking.business_account_id,
        kinds::PAYMENT_REFUNDED,
        "Payment refunded",
        format!("Booking {} was refunded ({})", booking.id, booking.amount()),
        NotificationPriority::Normal,
    )
}

pub fn tfc_applied(applied: &TfcApplied) -> NewNotification {
    let reference = &applied.tfc.payment_reference;
    let (kind, title, message) = match applied.outcome {
        TfcOutcome::Paid => (
            kinds::TFC_PAID,
            "TFC payment received",
            format!("{} paid in full", reference),
        ),
        TfcOutcome::PartPaid { received } => (
            kinds::TFC_PART_PAID,
            "TFC part payment",
            format!(
                "{} part paid: {} of {}",
                reference,
                received,
                applied.tfc.amount()
            ),
        ),
        TfcOutcome::Cancelled => (
            kinds::TFC_CANCELLED,
            "TFC booking cancelled",
            format!("{} cancelled", reference),
        ),
        TfcOutcome::ConvertedToCredit { credit } => (
            kinds::TFC_CONVERTED,
            "TFC payment converted to credit",
            format!("{} converted to {} credit", reference, credit),
        ),
    };

    NewNotification::system(
        &applied.tfc.business_account_id,
        kind,
        title,
        message,
        NotificationPriority::Normal,
    )
}

pub fn webhook_failed(business_account_id: &str, event_type: &str, error: &str) -> NewNotification {
    NewNotification::system(
        business_account_id,
        kinds::WEBHOOK_FAILED,
        "Webhook processing failed",
        format!("{} could not be processed: {}", event_type, error),
        NotificationPriority::Urgent,
    )
}
