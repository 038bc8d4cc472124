//! Booking checkout, lookup and cancellation.
//!
//! ## Access
//! - Parents book for themselves and only ever see their own bookings
//! - Admins book on behalf of a parent inside their own business
//! - Parents cancel their own bookings; otherwise cancelling is admin-only
//! - Refunding a cancellation to credit is admin-only

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookon_core::booking::{Booking, BookingStatus, NewBooking};
use bookon_core::credit::{Credit, RedemptionStep};
use bookon_core::tfc::TfcBooking;
use bookon_core::{Money, PageRequest, PaymentMethod};
use bookon_db::{BookingFilter, CheckoutResult};

use crate::auth::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::notify;
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub business_account_id: String,
    pub activity_id: String,
    pub child_id: String,
    /// Required when an admin books on a parent's behalf.
    pub parent_id: Option<String>,
    pub date: NaiveDate,
    /// Pence.
    pub amount: Money,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfc: Option<TfcBooking>,
    pub redemptions: Vec<RedemptionStep>,
}

impl From<CheckoutResult> for CheckoutView {
    fn from(result: CheckoutResult) -> Self {
        CheckoutView {
            booking: result.booking,
            tfc: result.tfc,
            redemptions: result.redemptions,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub activity_id: Option<String>,
    pub parent_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: Option<String>,
    #[serde(default)]
    pub refund_to_credit: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelView {
    pub booking: Booking,
    /// Credit issued by the cancellation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<Credit>,
}

/// `POST /api/v1/bookings`
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> ApiResult<Envelope<CheckoutView>> {
    let parent_id = match user.role {
        Role::Parent => {
            if req.parent_id.as_deref().is_some_and(|p| p != user.user_id) {
                return Err(ApiError::forbidden("Parents can only book for themselves"));
            }
            user.user_id.clone()
        }
        _ => {
            user.require_manages(&req.business_account_id)?;
            req.parent_id
                .ok_or_else(|| ApiError::validation("parentId is required"))?
        }
    };

    let input = NewBooking {
        business_account_id: req.business_account_id,
        activity_id: req.activity_id,
        child_id: req.child_id,
        parent_id,
        date: req.date,
        amount: req.amount,
        payment_method: req.payment_method,
    };

    let result = state.db.bookings().create(input, &user.user_id).await?;
    if result.booking.status == BookingStatus::Confirmed {
        notify::dispatch(&state, notify::booking_confirmed(&result.booking));
    }

    Ok(Envelope::created(result.into()))
}

/// `GET /api/v1/bookings`
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListBookingsQuery>,
) -> ApiResult<Envelope<Vec<Booking>>> {
    let mut filter = BookingFilter {
        business_account_id: None,
        parent_id: query.parent_id,
        activity_id: query.activity_id,
        status: query.status,
        date_from: query.date_from,
        date_to: query.date_to,
    };

    if user.role == Role::Parent {
        filter.parent_id = Some(user.user_id.clone());
    } else {
        filter.business_account_id = user.scope()?.map(str::to_string);
    }

    let page = PageRequest::new(query.page, query.per_page);
    let bookings = state.db.bookings().list(&filter, page).await?;
    Ok(Envelope::page(bookings))
}

/// `GET /api/v1/bookings/{id}`
pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Booking>> {
    let booking = state
        .db
        .bookings()
        .get_by_id(&id)
        .await?
        .filter(|b| can_view(&user, b))
        .ok_or_else(|| ApiError::not_found(format!("Booking not found: {}", id)))?;

    Ok(Envelope::ok(booking))
}

/// `POST /api/v1/bookings/{id}/cancel`
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Envelope<CancelView>> {
    // The body is optional
    let req: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("Invalid cancel body: {}", e)))?
    };

    let scope = if user.role == Role::Parent {
        if req.refund_to_credit {
            return Err(ApiError::forbidden("Only admins can refund to credit"));
        }
        let owned = state
            .db
            .bookings()
            .get_by_id(&id)
            .await?
            .filter(|b| b.parent_id == user.user_id)
            .ok_or_else(|| ApiError::not_found(format!("Booking not found: {}", id)))?;
        Some(owned.business_account_id)
    } else {
        user.require_admin()?;
        user.scope()?.map(str::to_string)
    };

    let (booking, credit) = state
        .db
        .bookings()
        .cancel(
            &id,
            &user.user_id,
            req.reason,
            req.refund_to_credit,
            scope.as_deref(),
        )
        .await?;

    notify::dispatch(&state, notify::booking_cancelled(&booking));
    if credit.is_some() && req.refund_to_credit {
        notify::dispatch(&state, notify::payment_refunded(&booking));
    }

    Ok(Envelope::ok(CancelView { booking, credit }))
}

fn can_view(user: &AuthUser, booking: &Booking) -> bool {
    match user.role {
        Role::Parent => booking.parent_id == user.user_id,
        _ => user.manages(&booking.business_account_id),
    }
}
