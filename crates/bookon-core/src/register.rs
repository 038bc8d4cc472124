//! # Attendance Registers
//!
//! One register per activity session (activity + date), with one attendance
//! line per confirmed booking.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    NotMarked,
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    pub id: String,
    pub business_account_id: String,
    pub activity_id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Register {
    pub fn new(
        business_account_id: impl Into<String>,
        activity_id: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Register {
            id: Uuid::new_v4().to_string(),
            business_account_id: business_account_id.into(),
            activity_id: activity_id.into(),
            date,
            created_at: Utc::now(),
        }
    }

    /// Whether a booking belongs on this register.
    pub fn accepts(&self, booking: &Booking) -> bool {
        booking.status == BookingStatus::Confirmed
            && booking.activity_id == self.activity_id
            && booking.date == self.date
            && booking.business_account_id == self.business_account_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub register_id: String,
    pub booking_id: String,
    pub child_id: String,
    pub status: AttendanceStatus,
    #[ts(as = "Option<String>")]
    pub marked_at: Option<DateTime<Utc>>,
    pub marked_by: Option<String>,
}

impl Attendance {
    /// Unmarked line for a confirmed booking on `register`.
    pub fn for_booking(register: &Register, booking: &Booking) -> CoreResult<Self> {
        if !register.accepts(booking) {
            return Err(CoreError::InvalidTransition {
                entity: "Booking",
                id: booking.id.clone(),
                from: format!("{:?}", booking.status),
                to: "register".to_string(),
            });
        }
        Ok(Attendance {
            register_id: register.id.clone(),
            booking_id: booking.id.clone(),
            child_id: booking.child_id.clone(),
            status: AttendanceStatus::NotMarked,
            marked_at: None,
            marked_by: None,
        })
    }

    /// Records present/absent. Re-marking overwrites the previous mark.
    pub fn mark(
        &mut self,
        status: AttendanceStatus,
        marked_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        if status == AttendanceStatus::NotMarked {
            return Err(crate::error::ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: "must be present or absent".to_string(),
            }
            .into());
        }
        self.status = status;
        self.marked_by = Some(marked_by.into());
        self.marked_at = Some(at);
        Ok(())
    }
}

/// A register with its attendance lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSheet {
    #[serde(flatten)]
    pub register: Register,
    pub attendance: Vec<Attendance>,
}

impl RegisterSheet {
    /// Present / absent / not marked counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.attendance
            .iter()
            .fold((0, 0, 0), |(p, a, n), line| match line.status {
                AttendanceStatus::Present => (p + 1, a, n),
                AttendanceStatus::Absent => (p, a + 1, n),
                AttendanceStatus::NotMarked => (p, a, n + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::NewBooking;
    use crate::money::Money;
    use crate::types::PaymentMethod;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
    }

    fn free_booking() -> Booking {
        Booking::new(NewBooking {
            business_account_id: ID.to_string(),
            activity_id: ID.to_string(),
            child_id: ID.to_string(),
            parent_id: ID.to_string(),
            date: date(),
            amount: Money::zero(),
            payment_method: PaymentMethod::Free,
        })
        .unwrap()
    }

    #[test]
    fn test_only_confirmed_bookings_join() {
        let register = Register::new(ID, ID, date());
        let mut booking = free_booking();
        assert!(Attendance::for_booking(&register, &booking).is_err());

        booking.confirm().unwrap();
        let line = Attendance::for_booking(&register, &booking).unwrap();
        assert_eq!(line.status, AttendanceStatus::NotMarked);
    }

    #[test]
    fn test_other_session_rejected() {
        let register = Register::new(ID, ID, date().succ_opt().unwrap());
        let mut booking = free_booking();
        booking.confirm().unwrap();
        assert!(!register.accepts(&booking));
    }

    #[test]
    fn test_mark_and_counts() {
        let register = Register::new(ID, ID, date());
        let mut booking = free_booking();
        booking.confirm().unwrap();
        let mut line = Attendance::for_booking(&register, &booking).unwrap();

        assert!(line.mark(AttendanceStatus::NotMarked, "staff-1", Utc::now()).is_err());
        line.mark(AttendanceStatus::Present, "staff-1", Utc::now()).unwrap();
        assert_eq!(line.marked_by.as_deref(), Some("staff-1"));

        let sheet = RegisterSheet {
            register,
            attendance: vec![line],
        };
        assert_eq!(sheet.counts(), (1, 0, 0));
    }
}
