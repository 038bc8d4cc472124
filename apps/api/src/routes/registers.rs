//! Session registers and attendance. Staff and admins only.

use std::sync::Arc;

use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bookon_core::register::{Attendance, AttendanceStatus, RegisterSheet};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegisterRequest {
    /// Required for super admins; tenant users use their own business.
    pub business_account_id: Option<String>,
    pub activity_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub booking_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterView {
    #[serde(flatten)]
    pub sheet: RegisterSheet,
    pub present: usize,
    pub absent: usize,
    pub not_marked: usize,
}

impl From<RegisterSheet> for RegisterView {
    fn from(sheet: RegisterSheet) -> Self {
        let (present, absent, not_marked) = sheet.counts();
        RegisterView {
            sheet,
            present,
            absent,
            not_marked,
        }
    }
}

/// `POST /api/v1/registers`
///
/// Idempotent per activity session: repeating the call returns the same
/// register with any newly confirmed bookings added.
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateRegisterRequest>,
) -> ApiResult<Envelope<RegisterView>> {
    user.require_staff()?;

    let business_account_id = match user.scope()? {
        Some(business) => business.to_string(),
        None => req
            .business_account_id
            .ok_or_else(|| ApiError::validation("businessAccountId is required"))?,
    };

    let sheet = state
        .db
        .registers()
        .create(&business_account_id, &req.activity_id, req.date, &user.user_id)
        .await?;

    Ok(Envelope::created(sheet.into()))
}

/// `GET /api/v1/registers/{id}`
pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<RegisterView>> {
    user.require_staff()?;
    let sheet = state.db.registers().get(&id, user.scope()?).await?;
    Ok(Envelope::ok(sheet.into()))
}

/// `POST /api/v1/registers/{id}/attendance`
pub async fn mark_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AttendanceRequest>,
) -> ApiResult<Envelope<Attendance>> {
    user.require_staff()?;

    let line = state
        .db
        .registers()
        .mark_attendance(&id, &req.booking_id, req.status, &user.user_id, user.scope()?)
        .await?;

    Ok(Envelope::ok(line))
}
