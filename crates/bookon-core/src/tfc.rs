//! # Tax-Free Childcare Reconciliation
//!
//! A parent who pays through TFC gets a payment reference and a deadline.
//! The money arrives out of band, so an admin reconciles each record by hand
//! (or in bulk) against the TFC statement.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         TFC Payment States                              │
//! │                                                                         │
//! │                      MarkPartPaid(amount)                               │
//! │   ┌─────────────────┐ ─────────────────► ┌───────────┐                  │
//! │   │ pending_payment │                    │ part_paid │                  │
//! │   └───┬─────────┬───┘                    └──┬─────┬──┘                  │
//! │       │         │ MarkPaid          MarkPaid│     │ ConvertToCredit     │
//! │       │         ▼                           ▼     │                     │
//! │       │      ┌──────────────────────────────────┐ │                     │
//! │       │      │               paid               │ │                     │
//! │       │      └──────────────────────────────────┘ │                     │
//! │       │ Cancel / ConvertToCredit                  │                     │
//! │       ▼                                           ▼                     │
//! │   ┌─────────────────────────────────────────────────────┐               │
//! │   │                      cancelled                      │               │
//! │   └─────────────────────────────────────────────────────┘               │
//! │                                                                         │
//! │   paid and cancelled are terminal.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Deadlines
//! `deadline = created_at + hold period`. A record is overdue when it is
//! still open and `now > deadline`. Overdue records are only flagged and
//! filtered; nothing cancels them automatically.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::booking::Booking;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::PaymentMethod;

// =============================================================================
// TFC Status
// =============================================================================

/// Reconciliation state of a TFC payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TfcStatus {
    PendingPayment,
    PartPaid,
    Paid,
    Cancelled,
}

impl TfcStatus {
    /// Whether the state machine has an edge `self → next`.
    pub fn can_transition_to(self, next: TfcStatus) -> bool {
        use TfcStatus::*;
        matches!(
            (self, next),
            (PendingPayment, PartPaid)
                | (PendingPayment, Paid)
                | (PendingPayment, Cancelled)
                | (PartPaid, Paid)
                | (PartPaid, Cancelled)
        )
    }

    /// Still waiting for (some of) the money.
    pub fn is_open(self) -> bool {
        matches!(self, TfcStatus::PendingPayment | TfcStatus::PartPaid)
    }

    /// Snake-case name as stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            TfcStatus::PendingPayment => "pending_payment",
            TfcStatus::PartPaid => "part_paid",
            TfcStatus::Paid => "paid",
            TfcStatus::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// TFC Booking
// =============================================================================

/// A booking held pending a Tax-Free Childcare payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TfcBooking {
    pub id: String,
    pub booking_id: String,
    pub business_account_id: String,
    /// Unique reference the parent quotes on the TFC transfer.
    pub payment_reference: String,
    #[ts(as = "String")]
    pub deadline: DateTime<Utc>,
    pub amount_pence: i64,
    pub amount_received_pence: i64,
    pub status: TfcStatus,
    /// Credit issued when the record was converted to credit.
    pub credit_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// What an applied action means for the other entities.
///
/// The database layer turns each outcome into the matching booking, credit
/// and ledger writes inside the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfcOutcome {
    /// Fully paid: confirm the booking and write the ledger row.
    Paid,
    /// Partially paid: flag the booking payment as part paid.
    PartPaid { received: Money },
    /// Cancelled without money: cancel the booking.
    Cancelled,
    /// Cancelled with the received money moved to the parent's wallet.
    ConvertedToCredit { credit: Money },
}

impl TfcBooking {
    /// Opens a TFC record for a pending TFC booking.
    ///
    /// ## Rules
    /// - Booking must use the `tfc` payment method
    /// - Booking must be pending
    /// - Hold period must be positive
    pub fn for_booking(
        booking: &Booking,
        payment_reference: String,
        hold_period_hours: i64,
    ) -> CoreResult<Self> {
        if booking.payment_method != PaymentMethod::Tfc {
            return Err(CoreError::invalid_amount(format!(
                "booking {} is not a TFC booking",
                booking.id
            )));
        }
        if booking.status != crate::booking::BookingStatus::Pending {
            return Err(CoreError::invalid_transition(
                "Booking",
                &booking.id,
                booking.status,
                TfcStatus::PendingPayment,
            ));
        }
        if hold_period_hours <= 0 {
            return Err(crate::error::ValidationError::MustBePositive {
                field: "holdPeriodHours".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        Ok(TfcBooking {
            id: Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            business_account_id: booking.business_account_id.clone(),
            payment_reference,
            deadline: deadline_for(now, hold_period_hours),
            amount_pence: booking.amount_pence,
            amount_received_pence: 0,
            status: TfcStatus::PendingPayment,
            credit_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_pence(self.amount_pence)
    }

    #[inline]
    pub fn amount_received(&self) -> Money {
        Money::from_pence(self.amount_received_pence)
    }

    /// Amount still outstanding.
    pub fn outstanding(&self) -> Money {
        self.amount() - self.amount_received()
    }

    /// Open and past its deadline.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && now > self.deadline
    }

    fn transition(&mut self, next: TfcStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::invalid_transition(
                "TFC booking",
                &self.id,
                self.status,
                next,
            ));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Applies an admin action.
    ///
    /// ## Rules
    /// - `MarkPaid`: from pending or part paid; received becomes the full amount
    /// - `MarkPartPaid`: from pending only, `0 < amount < total`
    /// - `Cancel`: from pending only (part-paid money must go to credit)
    /// - `ConvertToCredit`: from pending or part paid; the credit is the
    ///   received amount, which the admin supplies for pending records;
    ///   a part-paid record only converts what it actually received
    pub fn apply(&mut self, action: &TfcAction) -> CoreResult<TfcOutcome> {
        match action {
            TfcAction::MarkPaid => {
                self.transition(TfcStatus::Paid)?;
                self.amount_received_pence = self.amount_pence;
                Ok(TfcOutcome::Paid)
            }
            TfcAction::MarkPartPaid { amount } => {
                if self.status != TfcStatus::PendingPayment {
                    return Err(CoreError::invalid_transition(
                        "TFC booking",
                        &self.id,
                        self.status,
                        TfcStatus::PartPaid,
                    ));
                }
                let amount = Money::from_pence(*amount);
                if !amount.is_positive() || amount >= self.amount() {
                    return Err(CoreError::invalid_amount(format!(
                        "part payment must be more than £0.00 and less than {}",
                        self.amount()
                    )));
                }
                self.transition(TfcStatus::PartPaid)?;
                self.amount_received_pence = amount.pence();
                Ok(TfcOutcome::PartPaid { received: amount })
            }
            TfcAction::Cancel => {
                if self.status == TfcStatus::PartPaid {
                    return Err(CoreError::invalid_transition(
                        "TFC booking",
                        &self.id,
                        self.status,
                        TfcStatus::Cancelled,
                    ));
                }
                self.transition(TfcStatus::Cancelled)?;
                Ok(TfcOutcome::Cancelled)
            }
            TfcAction::ConvertToCredit { amount } => {
                let received = match (self.status, amount) {
                    (TfcStatus::PartPaid, None) => self.amount_received(),
                    (TfcStatus::PartPaid, Some(amount)) => {
                        if *amount != self.amount_received_pence {
                            return Err(CoreError::invalid_amount(format!(
                                "credit for a part-paid booking must equal the {} received",
                                self.amount_received()
                            )));
                        }
                        self.amount_received()
                    }
                    (_, Some(amount)) => Money::from_pence(*amount),
                    (_, None) => Money::zero(),
                };
                if !received.is_positive() || received > self.amount() {
                    return Err(CoreError::invalid_amount(format!(
                        "credit amount must be more than £0.00 and at most {}",
                        self.amount()
                    )));
                }
                self.transition(TfcStatus::Cancelled)?;
                self.amount_received_pence = received.pence();
                Ok(TfcOutcome::ConvertedToCredit { credit: received })
            }
        }
    }
}

// =============================================================================
// Actions
// =============================================================================

/// An admin reconciliation action.
///
/// Amounts are in pence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TfcAction {
    MarkPaid,
    MarkPartPaid { amount: i64 },
    Cancel,
    ConvertToCredit {
        #[serde(default)]
        amount: Option<i64>,
    },
}

impl TfcAction {
    /// Audit log action name.
    pub fn name(&self) -> &'static str {
        match self {
            TfcAction::MarkPaid => "tfc.mark_paid",
            TfcAction::MarkPartPaid { .. } => "tfc.mark_part_paid",
            TfcAction::Cancel => "tfc.cancel",
            TfcAction::ConvertToCredit { .. } => "tfc.convert_to_credit",
        }
    }
}

// =============================================================================
// References and Deadlines
// =============================================================================

/// Generates a payment reference: `{prefix}-{8 uppercase hex}`.
///
/// Uniqueness is enforced by the database; callers retry on collision.
///
/// ## Example
/// ```rust
/// use bookon_core::tfc::generate_reference;
///
/// let reference = generate_reference("TFC");
/// assert!(reference.starts_with("TFC-"));
/// assert_eq!(reference.len(), 12);
/// ```
pub fn generate_reference(prefix: &str) -> String {
    let bits = Uuid::new_v4().as_u128() as u32;
    format!("{}-{:08X}", prefix, bits)
}

/// Deadline for a record created at `created_at`.
pub fn deadline_for(created_at: DateTime<Utc>, hold_period_hours: i64) -> DateTime<Utc> {
    created_at + Duration::hours(hold_period_hours)
}

// =============================================================================
// List Filter
// =============================================================================

/// Admin TFC inbox filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TfcFilter {
    pub status: Option<TfcStatus>,
    /// `true` = only overdue, `false` = only not overdue.
    pub overdue: Option<bool>,
    /// Case-insensitive payment reference fragment.
    pub search: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::NewBooking;
    use crate::validation::validate_payment_reference;
    use chrono::NaiveDate;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn tfc_booking(amount: i64) -> TfcBooking {
        let booking = Booking::new(NewBooking {
            business_account_id: ID.to_string(),
            activity_id: ID.to_string(),
            child_id: ID.to_string(),
            parent_id: ID.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            amount: Money::from_pence(amount),
            payment_method: PaymentMethod::Tfc,
        })
        .unwrap();
        TfcBooking::for_booking(&booking, generate_reference("TFC"), 120).unwrap()
    }

    #[test]
    fn test_allowed_edges() {
        use TfcStatus::*;
        assert!(PendingPayment.can_transition_to(PartPaid));
        assert!(PendingPayment.can_transition_to(Paid));
        assert!(PendingPayment.can_transition_to(Cancelled));
        assert!(PartPaid.can_transition_to(Paid));
        assert!(PartPaid.can_transition_to(Cancelled));

        assert!(!Paid.can_transition_to(PendingPayment));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!PartPaid.can_transition_to(PendingPayment));
        assert!(!PartPaid.can_transition_to(PartPaid));
    }

    #[test]
    fn test_mark_paid() {
        let mut tfc = tfc_booking(5000);
        assert_eq!(tfc.apply(&TfcAction::MarkPaid).unwrap(), TfcOutcome::Paid);
        assert_eq!(tfc.status, TfcStatus::Paid);
        assert_eq!(tfc.amount_received().pence(), 5000);

        // Terminal
        let err = tfc.apply(&TfcAction::Cancel).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_part_paid_then_paid() {
        let mut tfc = tfc_booking(5000);
        let outcome = tfc.apply(&TfcAction::MarkPartPaid { amount: 2000 }).unwrap();
        assert_eq!(
            outcome,
            TfcOutcome::PartPaid {
                received: Money::from_pence(2000)
            }
        );
        assert_eq!(tfc.outstanding().pence(), 3000);

        // Cannot part-pay twice or cancel with money received
        assert!(tfc.apply(&TfcAction::MarkPartPaid { amount: 1000 }).is_err());
        assert!(tfc.apply(&TfcAction::Cancel).is_err());

        tfc.apply(&TfcAction::MarkPaid).unwrap();
        assert_eq!(tfc.amount_received().pence(), 5000);
    }

    #[test]
    fn test_part_paid_amount_bounds() {
        let mut tfc = tfc_booking(5000);
        assert!(tfc.apply(&TfcAction::MarkPartPaid { amount: 0 }).is_err());
        assert!(tfc.apply(&TfcAction::MarkPartPaid { amount: 5000 }).is_err());
        assert!(tfc.apply(&TfcAction::MarkPartPaid { amount: -10 }).is_err());
        assert_eq!(tfc.status, TfcStatus::PendingPayment);
    }

    #[test]
    fn test_convert_part_paid_to_credit() {
        let mut tfc = tfc_booking(5000);
        tfc.apply(&TfcAction::MarkPartPaid { amount: 1500 }).unwrap();

        let outcome = tfc
            .apply(&TfcAction::ConvertToCredit { amount: None })
            .unwrap();
        assert_eq!(
            outcome,
            TfcOutcome::ConvertedToCredit {
                credit: Money::from_pence(1500)
            }
        );
        assert_eq!(tfc.status, TfcStatus::Cancelled);
    }

    #[test]
    fn test_convert_part_paid_rejects_other_amount() {
        let mut tfc = tfc_booking(5000);
        tfc.apply(&TfcAction::MarkPartPaid { amount: 1500 }).unwrap();

        let err = tfc
            .apply(&TfcAction::ConvertToCredit { amount: Some(5000) })
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
        assert_eq!(tfc.status, TfcStatus::PartPaid);
        assert_eq!(tfc.amount_received().pence(), 1500);

        let outcome = tfc
            .apply(&TfcAction::ConvertToCredit { amount: Some(1500) })
            .unwrap();
        assert_eq!(
            outcome,
            TfcOutcome::ConvertedToCredit {
                credit: Money::from_pence(1500)
            }
        );
    }

    #[test]
    fn test_part_paid_only_cancels_through_credit() {
        let mut tfc = tfc_booking(5000);
        tfc.apply(&TfcAction::MarkPartPaid { amount: 1000 }).unwrap();

        assert!(matches!(
            tfc.apply(&TfcAction::Cancel),
            Err(CoreError::InvalidTransition { .. })
        ));
        tfc.apply(&TfcAction::ConvertToCredit { amount: None })
            .unwrap();
        assert_eq!(tfc.status, TfcStatus::Cancelled);
    }

    #[test]
    fn test_convert_pending_requires_amount() {
        let mut tfc = tfc_booking(5000);
        assert!(tfc
            .apply(&TfcAction::ConvertToCredit { amount: None })
            .is_err());
        assert!(tfc
            .apply(&TfcAction::ConvertToCredit { amount: Some(6000) })
            .is_err());

        let outcome = tfc
            .apply(&TfcAction::ConvertToCredit { amount: Some(5000) })
            .unwrap();
        assert_eq!(
            outcome,
            TfcOutcome::ConvertedToCredit {
                credit: Money::from_pence(5000)
            }
        );
    }

    #[test]
    fn test_overdue() {
        let tfc = tfc_booking(5000);
        assert_eq!(tfc.deadline, tfc.created_at + Duration::hours(120));
        assert!(!tfc.is_overdue(tfc.created_at));
        assert!(tfc.is_overdue(tfc.deadline + Duration::seconds(1)));

        let mut paid = tfc.clone();
        paid.apply(&TfcAction::MarkPaid).unwrap();
        assert!(!paid.is_overdue(paid.deadline + Duration::days(30)));
    }

    #[test]
    fn test_reference_format() {
        for _ in 0..50 {
            assert!(validate_payment_reference(&generate_reference("TFC")).is_ok());
        }
    }

    #[test]
    fn test_for_booking_rejects_card_booking() {
        let booking = Booking::new(NewBooking {
            business_account_id: ID.to_string(),
            activity_id: ID.to_string(),
            child_id: ID.to_string(),
            parent_id: ID.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            amount: Money::from_pence(100),
            payment_method: PaymentMethod::Card,
        })
        .unwrap();
        assert!(TfcBooking::for_booking(&booking, generate_reference("TFC"), 120).is_err());
    }

    #[test]
    fn test_action_deserialization() {
        let action: TfcAction =
            serde_json::from_str(r#"{"action":"mark_part_paid","amount":1200}"#).unwrap();
        assert_eq!(action, TfcAction::MarkPartPaid { amount: 1200 });

        let action: TfcAction = serde_json::from_str(r#"{"action":"convert_to_credit"}"#).unwrap();
        assert_eq!(action, TfcAction::ConvertToCredit { amount: None });
    }
}
