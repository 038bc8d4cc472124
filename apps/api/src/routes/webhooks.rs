//! # Payment Webhooks
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /webhooks/stripe                                                  │
//! │                                                                         │
//! │  raw body ──► verify stripe-signature ──► parse ──► store (inbox)       │
//! │                     │ bad: 400                        │                 │
//! │                                                       ▼                 │
//! │                                   already processed? ── yes ──► 200     │
//! │                                                       │ no              │
//! │                                                       ▼                 │
//! │  payment_intent.succeeded       ──► confirm_paid                        │
//! │  payment_intent.payment_failed  ──► mark_payment_failed                 │
//! │  charge.refunded                ──► mark_refunded (original payment)    │
//! │                                                       │                 │
//! │                         ok ──► processed, 200         │ err ──► failed, │
//! │                                                       │  notify, 5xx    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed event stays in the inbox. Stripe redelivers it, or an admin
//! retries it from `POST /admin/webhooks/{id}/retry`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bookon_core::PageRequest;
use bookon_db::{RefundTarget, WebhookEvent, WebhookProvider, WebhookStatus};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::notify;
use crate::response::Envelope;
use crate::state::AppState;
use crate::stripe::{verify_signature, StripeEvent};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Actor recorded in the audit log for provider-driven changes.
const STRIPE_ACTOR: &str = "stripe";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub received: bool,
    /// `true` when this delivery had already been processed.
    pub duplicate: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenericEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWebhooksQuery {
    pub status: Option<WebhookStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `POST /api/v1/webhooks/stripe`
pub async fn stripe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Envelope<Ack>> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Stripe webhooks are not configured"))?;

    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::invalid_signature("Missing stripe-signature header"))?;

    verify_signature(&body, signature, secret, Utc::now().timestamp()).map_err(|e| {
        warn!(error = %e, "Rejected Stripe webhook");
        ApiError::invalid_signature(e.to_string())
    })?;

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid webhook payload: {}", e)))?;
    let event: StripeEvent = serde_json::from_value(payload.clone())
        .map_err(|e| ApiError::validation(format!("Invalid Stripe event: {}", e)))?;

    let stored = state
        .db
        .webhooks()
        .receive(WebhookProvider::Stripe, &event.id, &event.event_type, &payload)
        .await?;

    if !stored.is_pending() {
        info!(event_id = %event.id, "Duplicate Stripe event, skipping");
        return Ok(Envelope::ok(Ack {
            received: true,
            duplicate: true,
        }));
    }

    settle(&state, &stored, &event).await?;
    Ok(Envelope::ok(Ack {
        received: true,
        duplicate: false,
    }))
}

/// `POST /api/v1/webhooks/generic`
///
/// Stores the event for later inspection; there is no generic processing.
pub async fn generic(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Envelope<Ack>> {
    let secret = state
        .config
        .webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Generic webhooks are not configured"))?;

    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !secrets_match(provided, secret) {
        return Err(ApiError::invalid_signature("Invalid webhook secret"));
    }

    let event: GenericEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid webhook payload: {}", e)))?;

    let repo = state.db.webhooks();
    let stored = repo
        .receive(WebhookProvider::Generic, &event.id, &event.event_type, &event.data)
        .await?;

    let duplicate = !stored.is_pending();
    if !duplicate {
        repo.mark_processed(&stored.id).await?;
    }

    Ok(Envelope::ok(Ack {
        received: true,
        duplicate,
    }))
}

/// `GET /api/v1/admin/webhooks`
///
/// The inbox spans every tenant, so only super admins can read it.
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListWebhooksQuery>,
) -> ApiResult<Envelope<Vec<WebhookEvent>>> {
    require_platform_admin(&user)?;

    let page = PageRequest::new(query.page, query.per_page);
    let events = state.db.webhooks().list(query.status, page).await?;
    Ok(Envelope::page(events))
}

/// `POST /api/v1/admin/webhooks/{id}/retry`
pub async fn retry(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<WebhookEvent>> {
    require_platform_admin(&user)?;

    let repo = state.db.webhooks();
    let stored = repo.get(&id).await?;
    if !stored.is_pending() {
        return Err(ApiError::conflict(format!(
            "Webhook event {} is already processed",
            id
        )));
    }

    match stored.provider {
        WebhookProvider::Stripe => {
            let event: StripeEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| ApiError::validation(format!("Stored event is unreadable: {}", e)))?;
            settle(&state, &stored, &event).await?;
        }
        WebhookProvider::Generic => repo.mark_processed(&stored.id).await?,
    }

    info!(webhook_id = %id, actor = %user.user_id, "Webhook retried");
    Ok(Envelope::ok(repo.get(&id).await?))
}

// =============================================================================
// Processing
// =============================================================================

/// Processes a stored Stripe event and records the outcome on the inbox row.
async fn settle(state: &Arc<AppState>, stored: &WebhookEvent, event: &StripeEvent) -> ApiResult<()> {
    let repo = state.db.webhooks();

    match process_stripe_event(state, event).await {
        Ok(()) => {
            repo.mark_processed(&stored.id).await?;
            Ok(())
        }
        Err(e) => {
            let message = e.to_string();
            repo.mark_failed(&stored.id, &message).await?;

            if let Some(business) = business_of(state, event).await {
                notify::dispatch(
                    state,
                    notify::webhook_failed(&business, &event.event_type, &message),
                );
            }
            Err(e)
        }
    }
}

async fn process_stripe_event(state: &Arc<AppState>, event: &StripeEvent) -> ApiResult<()> {
    let Some(booking_id) = event.booking_id() else {
        debug!(event_id = %event.id, event_type = %event.event_type, "Stripe event without booking metadata");
        return Ok(());
    };
    let bookings = state.db.bookings();

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let booking = bookings.confirm_paid(booking_id, STRIPE_ACTOR).await?;
            notify::dispatch(state, notify::booking_confirmed(&booking));
        }
        "payment_intent.payment_failed" => {
            let booking = bookings.mark_payment_failed(booking_id, STRIPE_ACTOR).await?;
            notify::dispatch(state, notify::payment_failed(&booking));
        }
        "charge.refunded" => {
            let (booking, _) = bookings
                .mark_refunded(booking_id, STRIPE_ACTOR, RefundTarget::OriginalPayment)
                .await?;
            notify::dispatch(state, notify::payment_refunded(&booking));
        }
        other => {
            debug!(event_type = %other, "Unhandled Stripe event type");
        }
    }

    Ok(())
}

/// Tenant of the booking an event refers to, if it can be found.
async fn business_of(state: &AppState, event: &StripeEvent) -> Option<String> {
    let booking_id = event.booking_id()?;
    match state.db.bookings().get_by_id(booking_id).await {
        Ok(booking) => booking.map(|b| b.business_account_id),
        Err(e) => {
            warn!(error = %e, booking_id = %booking_id, "Could not resolve webhook tenant");
            None
        }
    }
}

fn require_platform_admin(user: &AuthUser) -> ApiResult<()> {
    user.require_admin()?;
    if user.scope()?.is_some() {
        return Err(ApiError::forbidden("Super admin role required"));
    }
    Ok(())
}

/// Constant-time string comparison.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cre7"));
        assert!(!secrets_match("", "s3cret"));
    }

    #[test]
    fn test_generic_event_data_optional() {
        let event: GenericEvent =
            serde_json::from_str(r#"{"id":"evt-1","type":"ping"}"#).unwrap();
        assert_eq!(event.event_type, "ping");
        assert!(event.data.is_null());
    }
}
