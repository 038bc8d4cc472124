//! # Register Repository
//!
//! Attendance registers, one per activity session.
//!
//! `create` is idempotent on `(activity_id, date)`: calling it again returns
//! the existing register and adds lines for bookings confirmed since.

use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use crate::repository::booking::lock_booking;
use bookon_core::booking::{Booking, BookingStatus};
use bookon_core::register::{Attendance, AttendanceStatus, Register, RegisterSheet};
use bookon_core::CoreError;

const SELECT_REGISTER: &str =
    "SELECT id, business_account_id, activity_id, date, created_at FROM registers";

const SELECT_ATTENDANCE: &str = r#"
    SELECT register_id, booking_id, child_id, status, marked_at, marked_by
    FROM attendance
"#;

async fn load_sheet(conn: &mut PgConnection, register: Register) -> DbResult<RegisterSheet> {
    let sql = format!("{} WHERE register_id = $1 ORDER BY child_id", SELECT_ATTENDANCE);
    let attendance = sqlx::query_as::<_, Attendance>(&sql)
        .bind(&register.id)
        .fetch_all(conn)
        .await?;
    Ok(RegisterSheet {
        register,
        attendance,
    })
}

/// Repository for registers.
#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: PgPool,
}

impl RegisterRepository {
    pub fn new(pool: PgPool) -> Self {
        RegisterRepository { pool }
    }

    /// Builds (or tops up) the register for an activity session.
    pub async fn create(
        &self,
        business_account_id: &str,
        activity_id: &str,
        date: NaiveDate,
        actor_id: &str,
    ) -> DbResult<RegisterSheet> {
        let candidate = Register::new(business_account_id, activity_id, date);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO registers (id, business_account_id, activity_id, date, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (activity_id, date) DO NOTHING
            "#,
        )
        .bind(&candidate.id)
        .bind(&candidate.business_account_id)
        .bind(&candidate.activity_id)
        .bind(candidate.date)
        .bind(candidate.created_at)
        .execute(&mut *tx)
        .await?;

        let sql = format!("{} WHERE activity_id = $1 AND date = $2", SELECT_REGISTER);
        let register = sqlx::query_as::<_, Register>(&sql)
            .bind(activity_id)
            .bind(date)
            .fetch_one(&mut *tx)
            .await?;

        if register.business_account_id != business_account_id {
            return Err(DbError::not_found("Register", format!("{}/{}", activity_id, date)));
        }

        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, business_account_id, activity_id, child_id, parent_id, date,
                   status, payment_status, payment_method, amount_pence,
                   created_at, updated_at, cancelled_at, cancellation_reason
            FROM bookings
            WHERE business_account_id = $1 AND activity_id = $2 AND date = $3 AND status = $4
            "#,
        )
        .bind(business_account_id)
        .bind(activity_id)
        .bind(date)
        .bind(BookingStatus::Confirmed)
        .fetch_all(&mut *tx)
        .await?;

        let mut added = 0u64;
        for booking in &bookings {
            let line = Attendance::for_booking(&register, booking)?;
            added += sqlx::query(
                r#"
                INSERT INTO attendance (register_id, booking_id, child_id, status, marked_at, marked_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (register_id, booking_id) DO NOTHING
                "#,
            )
            .bind(&line.register_id)
            .bind(&line.booking_id)
            .bind(&line.child_id)
            .bind(line.status)
            .bind(line.marked_at)
            .bind(&line.marked_by)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        if register.id == candidate.id {
            let entry = AuditEntry::new(actor_id, "register.created", "register", &register.id)
                .business(business_account_id)
                .details(serde_json::json!({
                    "activityId": activity_id,
                    "date": date,
                    "lines": added,
                }));
            audit::record(&mut tx, &entry).await?;
        }

        let sheet = load_sheet(&mut tx, register).await?;
        tx.commit().await?;

        info!(
            register_id = %sheet.register.id,
            lines = sheet.attendance.len(),
            added,
            "Register ready"
        );
        Ok(sheet)
    }

    pub async fn get(&self, id: &str, business_account_id: Option<&str>) -> DbResult<RegisterSheet> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!("{} WHERE id = $1", SELECT_REGISTER);
        let register = sqlx::query_as::<_, Register>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Register", id))?;

        if business_account_id.is_some_and(|b| b != register.business_account_id) {
            return Err(DbError::not_found("Register", id));
        }

        load_sheet(&mut conn, register).await
    }

    /// Marks one child present or absent.
    ///
    /// ## Errors
    /// - `NotFound` when the booking is not on the register
    /// - `Core(InvalidTransition)` when the booking was cancelled after the
    ///   register was built
    pub async fn mark_attendance(
        &self,
        register_id: &str,
        booking_id: &str,
        status: AttendanceStatus,
        actor_id: &str,
        business_account_id: Option<&str>,
    ) -> DbResult<Attendance> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{} WHERE register_id = $1 AND booking_id = $2 FOR UPDATE",
            SELECT_ATTENDANCE
        );
        let mut line = sqlx::query_as::<_, Attendance>(&sql)
            .bind(register_id)
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Attendance", format!("{}/{}", register_id, booking_id)))?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        if business_account_id.is_some_and(|b| b != booking.business_account_id) {
            return Err(DbError::not_found("Register", register_id));
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(CoreError::InvalidTransition {
                entity: "Booking",
                id: booking.id.clone(),
                from: format!("{:?}", booking.status),
                to: "attendance".to_string(),
            }
            .into());
        }

        line.mark(status, actor_id, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE attendance SET status = $3, marked_at = $4, marked_by = $5
            WHERE register_id = $1 AND booking_id = $2
            "#,
        )
        .bind(&line.register_id)
        .bind(&line.booking_id)
        .bind(line.status)
        .bind(line.marked_at)
        .bind(&line.marked_by)
        .execute(&mut *tx)
        .await?;

        let entry = AuditEntry::new(actor_id, "register.attendance_marked", "register", register_id)
            .business(&booking.business_account_id)
            .details(serde_json::json!({ "bookingId": booking_id, "status": line.status }));
        audit::record(&mut tx, &entry).await?;

        tx.commit().await?;

        debug!(register_id = %register_id, booking_id = %booking_id, status = ?line.status, "Attendance marked");
        Ok(line)
    }
}
