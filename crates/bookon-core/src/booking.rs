//! # Booking Status State Machine
//!
//! A booking places one child into one activity session.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Booking Lifecycle                                 │
//! │                                                                         │
//! │                 payment confirmed                                       │
//! │   ┌─────────┐  (or free activity)   ┌───────────┐                       │
//! │   │ pending │ ────────────────────► │ confirmed │                       │
//! │   └────┬────┘                       └─────┬─────┘                       │
//! │        │ cancel                           │ cancel / refund             │
//! │        ▼                                  ▼                             │
//! │   ┌──────────────────────────────────────────────┐                      │
//! │   │                  cancelled                   │  (terminal, soft)    │
//! │   └──────────────────────────────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bookings are never deleted; cancellation keeps the row for the audit log.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentMethod, PaymentStatus};
use crate::validation::{validate_id, validate_non_negative_amount};

// =============================================================================
// Booking Status
// =============================================================================

/// Where a booking is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created at checkout, waiting for payment.
    Pending,
    /// Paid (or free) and holding a place.
    Confirmed,
    /// Soft-cancelled. Terminal.
    Cancelled,
}

impl BookingStatus {
    /// Whether the state machine has an edge `self → next`.
    ///
    /// Same-state moves are not edges.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self == BookingStatus::Cancelled
    }
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Pending
    }
}

// =============================================================================
// Booking
// =============================================================================

/// A child's place on one activity session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    /// Tenant (venue operator) that runs the activity.
    pub business_account_id: String,
    pub activity_id: String,
    pub child_id: String,
    pub parent_id: String,
    /// Session date.
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    /// Price in pence.
    pub amount_pence: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl Booking {
    /// Creates a pending booking from validated checkout input.
    pub fn new(input: NewBooking) -> CoreResult<Self> {
        input.validate()?;
        let now = Utc::now();

        Ok(Booking {
            id: Uuid::new_v4().to_string(),
            business_account_id: input.business_account_id,
            activity_id: input.activity_id,
            child_id: input.child_id,
            parent_id: input.parent_id,
            date: input.date,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: input.payment_method,
            amount_pence: input.amount.pence(),
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            cancellation_reason: None,
        })
    }

    /// Returns the price as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_pence(self.amount_pence)
    }

    fn transition(&mut self, next: BookingStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::invalid_transition(
                "Booking",
                &self.id,
                self.status,
                next,
            ));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records that the full amount has been received.
    ///
    /// Allowed while the booking is not cancelled and the payment is not
    /// already settled or refunded.
    pub fn record_payment(&mut self) -> CoreResult<()> {
        if self.status.is_terminal()
            || matches!(
                self.payment_status,
                PaymentStatus::Paid | PaymentStatus::Refunded
            )
        {
            return Err(CoreError::invalid_transition(
                "Booking payment",
                &self.id,
                self.payment_status,
                PaymentStatus::Paid,
            ));
        }
        self.payment_status = PaymentStatus::Paid;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records a partial payment (TFC part-paid).
    pub fn record_part_payment(&mut self) -> CoreResult<()> {
        if self.status != BookingStatus::Pending || self.payment_status != PaymentStatus::Pending {
            return Err(CoreError::invalid_transition(
                "Booking payment",
                &self.id,
                self.payment_status,
                PaymentStatus::PartPaid,
            ));
        }
        self.payment_status = PaymentStatus::PartPaid;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records a failed card payment. The booking stays pending so the
    /// parent can retry.
    pub fn record_payment_failure(&mut self) -> CoreResult<()> {
        if self.status != BookingStatus::Pending || self.payment_status == PaymentStatus::Paid {
            return Err(CoreError::invalid_transition(
                "Booking payment",
                &self.id,
                self.payment_status,
                PaymentStatus::Failed,
            ));
        }
        self.payment_status = PaymentStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `pending → confirmed`, gated on payment.
    ///
    /// ## Rules
    /// - Free bookings confirm without payment
    /// - Everything else needs `payment_status == paid`
    pub fn confirm(&mut self) -> CoreResult<()> {
        let paid = self.payment_status == PaymentStatus::Paid
            || self.payment_method == PaymentMethod::Free;
        if self.status == BookingStatus::Pending && !paid {
            return Err(CoreError::PaymentNotConfirmed {
                booking_id: self.id.clone(),
                payment_status: crate::error::wire_name(&self.payment_status),
            });
        }
        self.transition(BookingStatus::Confirmed)
    }

    /// Soft-cancels the booking.
    pub fn cancel(&mut self, reason: Option<String>) -> CoreResult<()> {
        self.transition(BookingStatus::Cancelled)?;
        self.cancelled_at = Some(self.updated_at);
        self.cancellation_reason = reason;
        Ok(())
    }

    /// Refunds a paid booking and cancels it.
    ///
    /// Returns the refunded amount.
    pub fn refund(&mut self) -> CoreResult<Money> {
        if self.payment_status != PaymentStatus::Paid {
            return Err(CoreError::invalid_transition(
                "Booking payment",
                &self.id,
                self.payment_status,
                PaymentStatus::Refunded,
            ));
        }
        if !self.status.is_terminal() {
            self.cancel(Some("refunded".to_string()))?;
        }
        self.payment_status = PaymentStatus::Refunded;
        self.updated_at = Utc::now();
        Ok(self.amount())
    }
}

// =============================================================================
// Checkout Input
// =============================================================================

/// Checkout input for a new booking.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub business_account_id: String,
    pub activity_id: String,
    pub child_id: String,
    pub parent_id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub amount: Money,
    pub payment_method: PaymentMethod,
}

impl NewBooking {
    /// Validates ids and the amount/method combination.
    ///
    /// ## Rules
    /// - All ids present and well-formed
    /// - Amount not negative
    /// - `free` only for zero amounts, every other method needs a positive amount
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("businessAccountId", &self.business_account_id)?;
        validate_id("activityId", &self.activity_id)?;
        validate_id("childId", &self.child_id)?;
        validate_id("parentId", &self.parent_id)?;
        validate_non_negative_amount("amount", self.amount)?;

        match (self.payment_method, self.amount.is_zero()) {
            (PaymentMethod::Free, false) => Err(CoreError::invalid_amount(
                "free bookings must have a zero amount",
            )),
            (PaymentMethod::Free, true) => Ok(()),
            (_, true) => Err(CoreError::invalid_amount(
                "paid bookings must have a positive amount",
            )),
            (_, false) => Ok(()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
